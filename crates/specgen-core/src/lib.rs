//! Specification IR, validation, module layout and serialization contracts for specgen

pub mod contract;
pub mod error;
pub mod import_calculator;
pub mod module_registry;
pub mod naming;
pub mod spec;
pub mod types;

pub use contract::{synthesize, ContractSet, SerializationContract};
pub use error::{EntityPath, SpecError, SpecErrorReason};
pub use import_calculator::{aggregate_imports, ImportDirective, ImportTarget};
pub use module_registry::{Module, ModuleRegistry, Role};
pub use naming::Name;
pub use spec::{Spec, SpecBuilder};
pub use types::{Primitive, TypeDef, TypeFolder};
