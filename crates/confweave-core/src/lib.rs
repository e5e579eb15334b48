//! confweave-core: composing YAML preprocessor
//!
//! Loads a YAML 1.1 document and resolves four compositional features on
//! top of the base syntax:
//!
//! - `${...}` variable substitution with defaults and mandatory markers,
//!   fed by top-level `variables:` sections and per-include overrides
//! - `!include` references to other files, resolved relative to the
//!   including file, with cycle and depth protection
//! - `!secret` references against a sibling `secrets.yaml`
//! - deep merging of top-level `packages:` fragments into the document
//!
//! The result is a plain [`Value`] tree ready for domain validation.
//! Boolean scalars are deliberately strict: only `true`/`false` (any
//! case) are booleans, while `yes`/`no`/`on`/`off` stay strings.
//!
//! # Example
//!
//! ```no_run
//! use confweave_core::load;
//!
//! let config = load("config/main.yaml").unwrap();
//! if let Some(host) = config.get_nested(&["database", "host"]) {
//!     println!("database host: {}", host);
//! }
//! ```

pub mod error;
pub mod include;
pub mod interpolation;
pub mod scalar;
pub mod value;

mod constructor;
mod merge;
mod preprocessor;
mod secrets;

pub use constructor::{ConstructorRegistry, ScalarConstruct};
pub use error::{Error, ErrorKind, Result};
pub use interpolation::VarEnv;
pub use preprocessor::{load, Loader};
pub use value::{IncludeRef, SecretRef, Value};
