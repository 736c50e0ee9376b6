use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use specgen::output::write_artifacts;
use specgen::validate::run_check;
use specgen_codegen::{generate, GeneratorConfig, JsonMode, OutputSet, ServerFlavor, Target};

#[derive(Parser)]
#[command(name = "specgen")]
#[command(about = "Generate models, clients and services from an API specification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate code for one target language
    Generate {
        /// Specification document (JSON format)
        #[arg(short, long)]
        input: PathBuf,

        /// Target language (go, rust, typescript)
        #[arg(short, long)]
        target: Target,

        /// Root module: Go module path, Rust module path or TypeScript package name
        #[arg(short, long)]
        root_module: String,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// JSON mode (strict, nonstrict)
        #[arg(long, default_value = "strict")]
        json_mode: JsonMode,

        /// Router flavor; defaults to the target's usual router
        #[arg(long)]
        server: Option<ServerFlavor>,

        /// Comma separated artifact families (models, client, service, scaffold)
        #[arg(long, default_value = "all")]
        outputs: OutputSet,
    },

    /// Validate a specification without generating anything
    Check {
        /// Specification document (JSON format)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(cli.debug)
        .init();

    match cli.command {
        Commands::Generate {
            input,
            target,
            root_module,
            out,
            json_mode,
            server,
            outputs,
        } => {
            let mut builder = GeneratorConfig::builder(target, root_module)
                .json_mode(json_mode)
                .outputs(outputs);
            if let Some(server) = server {
                builder = builder.server(server);
            }
            let config = builder.build().context("Invalid generator configuration")?;
            handle_generate(input, out, &config)
        }
        Commands::Check { input } => run_check(&input).map(|_| ()),
    }
}

fn handle_generate(input: PathBuf, out: PathBuf, config: &GeneratorConfig) -> Result<()> {
    info!("Generating {} code from {:?}", config.target(), input);
    let spec = specgen::load_spec(&input)?;
    let artifacts = generate(&spec, config)
        .with_context(|| format!("Failed to generate {} code", config.target()))?;
    write_artifacts(&artifacts, &out)?;
    info!("Generated code written to {:?}", out);
    Ok(())
}
