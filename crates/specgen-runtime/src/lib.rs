//! Specgen Runtime Library
//!
//! Reference interpretation of serialization contracts over
//! `serde_json::Value`. Generated marshal/unmarshal code in every target
//! language enforces the same rules this crate checks directly:
//!
//! - **Objects**: required fields present and non-null
//! - **Enums**: only declared literals decode
//! - **Unions**: exactly one case set; discriminated unions inject and read their tag
//!
//! # Example
//!
//! ```rust,ignore
//! use specgen_core::ContractSet;
//! use specgen_runtime::ContractChecker;
//!
//! let contracts = ContractSet::from_spec(&spec);
//! let checker = ContractChecker::new(&contracts);
//! let wire = checker.encode_model(&scope, "Person", &json!({"name": "Ann"}))?;
//! ```

mod checker;
mod errors;

pub use checker::ContractChecker;
pub use errors::{ContractError, ContractViolation};
