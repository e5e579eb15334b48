//! Preprocessor driver
//!
//! The public entry point [`load`] plus the low-level [`Loader`] seam. A
//! load call constructs its own variable environment, secret store, and
//! include stack, so independent loads on separate threads never share
//! state.

use std::collections::HashSet;
use std::path::Path;

use yaml_rust2::parser::Parser;

use crate::constructor::{ConstructorRegistry, NodeBuilder};
use crate::error::{Error, Result};
use crate::include;
use crate::interpolation::VarEnv;
use crate::secrets::SecretStore;
use crate::value::Value;

/// Load and fully preprocess the YAML file at `path`.
///
/// The returned tree contains no `!include` or `!secret` references and,
/// when the root is a mapping, no `variables` or `packages` keys.
///
/// # Example
///
/// ```no_run
/// use confweave_core::load;
///
/// let config = load("config/main.yaml").unwrap();
/// let host = config.get_nested(&["database", "host"]);
/// ```
///
/// # Errors
///
/// Fails on I/O or parse errors in the root file, circular inclusion,
/// include depth over [`include::MAX_INCLUDE_DEPTH`], variable nesting
/// over [`crate::interpolation::MAX_VAR_NESTING_DEPTH`] rescans, and
/// substituted scalars whose tag has no registered constructor.
pub fn load(path: impl AsRef<Path>) -> Result<Value> {
    let mut secrets = SecretStore::new();
    include::load_file(
        path.as_ref(),
        &VarEnv::new(),
        &mut secrets,
        &HashSet::new(),
    )
}

/// A YAML loader bound to a variable environment.
///
/// This is the low-level seam under the include engine: it parses a single
/// document with the preprocessor's construction semantics (implicit tags,
/// interpolation, `!include`/`!secret` markers) but performs no file
/// traversal, so include and secret references come back unresolved.
pub struct Loader {
    env: VarEnv,
    registry: ConstructorRegistry,
}

impl Loader {
    /// Create a loader bound to the given variable environment.
    pub fn new(env: VarEnv) -> Self {
        Self {
            env,
            registry: ConstructorRegistry::with_builtins(),
        }
    }

    /// Create a loader with a custom constructor registry.
    pub(crate) fn with_registry(env: VarEnv, registry: ConstructorRegistry) -> Self {
        Self { env, registry }
    }

    /// Parse a single YAML document. An empty document yields
    /// [`Value::Null`].
    pub fn load_str(&self, content: &str) -> Result<Value> {
        let mut parser = Parser::new_from_str(content);
        let mut builder = NodeBuilder::new(&self.env, &self.registry);
        parser
            .load(&mut builder, false)
            .map_err(|e| Error::parse(e.to_string()))?;
        builder.into_value()
    }
}
