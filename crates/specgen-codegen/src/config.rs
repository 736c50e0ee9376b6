//! Generator configuration.
//!
//! Every option is a closed enumeration parsed once, so an unknown target,
//! json mode or server flavor is a [`ConfigError`] at build time rather than
//! a surprise halfway through emission.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Supported target languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Go,
    Rust,
    TypeScript,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Go, Target::Rust, Target::TypeScript];

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Go => "go",
            Target::Rust => "rust",
            Target::TypeScript => "typescript",
        }
    }

    /// Router flavor used when none is requested.
    pub fn default_server(self) -> ServerFlavor {
        match self {
            Target::Go => ServerFlavor::Chi,
            Target::Rust => ServerFlavor::Axum,
            Target::TypeScript => ServerFlavor::Express,
        }
    }

    pub fn supports(self, server: ServerFlavor) -> bool {
        match self {
            Target::Go => matches!(
                server,
                ServerFlavor::Chi | ServerFlavor::HttpRouter | ServerFlavor::Vestigo
            ),
            Target::Rust => server == ServerFlavor::Axum,
            Target::TypeScript => server == ServerFlavor::Express,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "go" | "golang" => Ok(Target::Go),
            "rust" | "rs" => Ok(Target::Rust),
            "typescript" | "ts" => Ok(Target::TypeScript),
            _ => Err(ConfigError::UnknownTarget(s.to_string())),
        }
    }
}

/// How strictly generated serialization code follows the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonMode {
    /// Required fields are checked on encode and decode.
    #[default]
    Strict,
    /// Shape-only serialization; enum and union checks remain.
    NonStrict,
}

impl JsonMode {
    pub fn checks_required(self) -> bool {
        self == JsonMode::Strict
    }
}

impl FromStr for JsonMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(JsonMode::Strict),
            "nonstrict" | "non-strict" => Ok(JsonMode::NonStrict),
            _ => Err(ConfigError::UnknownJsonMode(s.to_string())),
        }
    }
}

/// Router library used by generated service code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    Chi,
    HttpRouter,
    Vestigo,
    Axum,
    Express,
}

impl ServerFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerFlavor::Chi => "chi",
            ServerFlavor::HttpRouter => "httprouter",
            ServerFlavor::Vestigo => "vestigo",
            ServerFlavor::Axum => "axum",
            ServerFlavor::Express => "express",
        }
    }
}

impl fmt::Display for ServerFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerFlavor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chi" => Ok(ServerFlavor::Chi),
            "httprouter" => Ok(ServerFlavor::HttpRouter),
            "vestigo" => Ok(ServerFlavor::Vestigo),
            "axum" => Ok(ServerFlavor::Axum),
            "express" => Ok(ServerFlavor::Express),
            _ => Err(ConfigError::UnknownServer(s.to_string())),
        }
    }
}

/// Artifact families to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputSet {
    pub models: bool,
    pub client: bool,
    pub service: bool,
    pub scaffold: bool,
}

impl Default for OutputSet {
    fn default() -> Self {
        Self::all()
    }
}

impl OutputSet {
    pub fn all() -> Self {
        Self {
            models: true,
            client: true,
            service: true,
            scaffold: true,
        }
    }

    pub fn none() -> Self {
        Self {
            models: false,
            client: false,
            service: false,
            scaffold: false,
        }
    }

    /// Models are emitted whenever anything that depends on them is.
    pub fn needs_models(&self) -> bool {
        self.models || self.client || self.service || self.scaffold
    }

    /// Scaffolds implement the service contract, so they bring it along.
    pub fn needs_service(&self) -> bool {
        self.service || self.scaffold
    }

    /// Per-operation response types and the shared error types.
    pub fn needs_responses(&self) -> bool {
        self.client || self.needs_service()
    }
}

impl FromStr for OutputSet {
    type Err = ConfigError;

    /// Parse a comma separated list such as `models,client`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut outputs = OutputSet::none();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "models" => outputs.models = true,
                "client" => outputs.client = true,
                "service" => outputs.service = true,
                "scaffold" => outputs.scaffold = true,
                "all" => outputs = OutputSet::all(),
                other => return Err(ConfigError::UnknownOutput(other.to_string())),
            }
        }
        Ok(outputs)
    }
}

/// Immutable configuration of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    target: Target,
    root_module: String,
    json_mode: JsonMode,
    server: ServerFlavor,
    outputs: OutputSet,
}

impl GeneratorConfig {
    pub fn builder(target: Target, root_module: impl Into<String>) -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            target,
            root_module: root_module.into(),
            json_mode: JsonMode::default(),
            server: None,
            outputs: OutputSet::default(),
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn root_module(&self) -> &str {
        &self.root_module
    }

    pub fn json_mode(&self) -> JsonMode {
        self.json_mode
    }

    pub fn server(&self) -> ServerFlavor {
        self.server
    }

    pub fn outputs(&self) -> OutputSet {
        self.outputs
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfigBuilder {
    target: Target,
    root_module: String,
    json_mode: JsonMode,
    server: Option<ServerFlavor>,
    outputs: OutputSet,
}

impl GeneratorConfigBuilder {
    pub fn json_mode(mut self, json_mode: JsonMode) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn server(mut self, server: ServerFlavor) -> Self {
        self.server = Some(server);
        self
    }

    pub fn outputs(mut self, outputs: OutputSet) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn build(self) -> Result<GeneratorConfig, ConfigError> {
        if !is_valid_root_module(&self.root_module) {
            return Err(ConfigError::InvalidRootModule(self.root_module));
        }
        let server = self.server.unwrap_or_else(|| self.target.default_server());
        if !self.target.supports(server) {
            return Err(ConfigError::UnsupportedServer {
                target: self.target.to_string(),
                server: server.to_string(),
            });
        }
        Ok(GeneratorConfig {
            target: self.target,
            root_module: self.root_module,
            json_mode: self.json_mode,
            server,
            outputs: self.outputs,
        })
    }
}

/// Path-like identifier: segments of `[A-Za-z0-9_-]` joined by `/`, `.` or `::`.
fn is_valid_root_module(root: &str) -> bool {
    if root.is_empty() {
        return false;
    }
    root.split("::")
        .flat_map(|part| part.split(|c: char| c == '/' || c == '.'))
        .all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        assert_eq!("go".parse::<Target>(), Ok(Target::Go));
        assert_eq!("TS".parse::<Target>(), Ok(Target::TypeScript));
        assert_eq!(
            "cobol".parse::<Target>(),
            Err(ConfigError::UnknownTarget("cobol".to_string()))
        );
    }

    #[test]
    fn test_default_server_per_target() {
        for target in Target::ALL {
            let config = GeneratorConfig::builder(target, "acme").build().unwrap();
            assert_eq!(config.server(), target.default_server());
            assert_eq!(config.json_mode(), JsonMode::Strict);
        }
    }

    #[test]
    fn test_unsupported_server_is_an_error() {
        let err = GeneratorConfig::builder(Target::Rust, "crate")
            .server(ServerFlavor::Chi)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedServer {
                target: "rust".to_string(),
                server: "chi".to_string()
            }
        );
        assert!(GeneratorConfig::builder(Target::Go, "acme")
            .server(ServerFlavor::Vestigo)
            .build()
            .is_ok());
    }

    #[test]
    fn test_root_module_validation() {
        for ok in ["github.com/acme/pets", "crate::api", "petstore", "acme/pets-client"] {
            assert!(GeneratorConfig::builder(Target::Go, ok).build().is_ok(), "{}", ok);
        }
        for bad in ["", "a//b", "has space", "trailing/"] {
            assert_eq!(
                GeneratorConfig::builder(Target::Go, bad).build(),
                Err(ConfigError::InvalidRootModule(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_json_mode_and_outputs_parsing() {
        assert_eq!("nonstrict".parse::<JsonMode>(), Ok(JsonMode::NonStrict));
        assert!("lenient".parse::<JsonMode>().is_err());
        assert!(!JsonMode::NonStrict.checks_required());

        let outputs: OutputSet = "models, client".parse().unwrap();
        assert!(outputs.models && outputs.client);
        assert!(!outputs.service && !outputs.scaffold);
        assert_eq!(
            "models,docs".parse::<OutputSet>(),
            Err(ConfigError::UnknownOutput("docs".to_string()))
        );
    }

    #[test]
    fn test_server_parsing() {
        assert_eq!("httprouter".parse::<ServerFlavor>(), Ok(ServerFlavor::HttpRouter));
        assert_eq!(
            "gin".parse::<ServerFlavor>(),
            Err(ConfigError::UnknownServer("gin".to_string()))
        );
    }
}
