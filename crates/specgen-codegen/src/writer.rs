//! Indenting text writer used by the backends.

use std::fmt;

/// A `fmt::Write` sink that prefixes every non-empty line with the current
/// indentation.
#[derive(Debug)]
pub struct CodeWriter {
    out: String,
    unit: &'static str,
    level: usize,
    at_line_start: bool,
}

impl CodeWriter {
    pub fn new(unit: &'static str) -> Self {
        Self {
            out: String::new(),
            unit,
            level: 0,
            at_line_start: true,
        }
    }

    pub fn tabs() -> Self {
        Self::new("\t")
    }

    pub fn spaces(width: usize) -> Self {
        match width {
            2 => Self::new("  "),
            _ => Self::new("    "),
        }
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl fmt::Write for CodeWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for piece in s.split_inclusive('\n') {
            if self.at_line_start && piece != "\n" {
                for _ in 0..self.level {
                    self.out.push_str(self.unit);
                }
            }
            self.out.push_str(piece);
            self.at_line_start = piece.ends_with('\n');
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_indentation() {
        let mut w = CodeWriter::spaces(2);
        writeln!(w, "fn main() {{").unwrap();
        w.indent();
        writeln!(w, "let a = 1;\n\nlet b = {};", 2).unwrap();
        w.dedent();
        writeln!(w, "}}").unwrap();
        assert_eq!(w.finish(), "fn main() {\n  let a = 1;\n\n  let b = 2;\n}\n");
    }
}
