//! Code generation from a validated specification to Go, Rust and
//! TypeScript source artifacts.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod emitter;
pub mod error;
pub mod import_tracker;
pub mod resolver;
pub mod writer;

pub use artifact::{Artifact, ArtifactKind, GENERATED_HEADER};
pub use backend::{backend_for, Backend};
pub use config::{GeneratorConfig, JsonMode, OutputSet, ServerFlavor, Target};
pub use emitter::generate;
pub use error::{CodegenError, ConfigError};
pub use resolver::{TargetTable, TypeResolver};
