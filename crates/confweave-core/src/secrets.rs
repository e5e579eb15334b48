//! Secret resolution
//!
//! `!secret name` references resolve against a flat `secrets.yaml` located
//! next to the file containing the reference. Secrets files are themselves
//! run through the full preprocessor (they may use variables and
//! `!include`), starting from an empty variable environment and a fresh
//! include stack. Each secrets file is read at most once per load; the
//! resulting name to value map is cached by canonical path.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ErrorKind, Result};
use crate::include;
use crate::interpolation::VarEnv;
use crate::value::Value;

const SECRETS_FILE: &str = "secrets.yaml";

/// Lazy, path-keyed cache of secrets files.
///
/// One store is created per top-level load and threaded through all
/// recursive calls, so concurrent loads never share state.
pub(crate) struct SecretStore {
    cache: HashMap<std::path::PathBuf, HashMap<String, String>>,
}

impl SecretStore {
    pub(crate) fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Resolve a secret name for a reference inside `current_file`.
    ///
    /// A missing secrets file or a missing entry warns and yields the
    /// empty string; hard errors from preprocessing the secrets file
    /// propagate.
    pub(crate) fn resolve(&mut self, name: &str, current_file: &Path) -> Result<String> {
        let secrets_path = current_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SECRETS_FILE);

        let canonical = match std::fs::canonicalize(&secrets_path) {
            Ok(path) => path,
            Err(_) => {
                debug!("no secrets file at {}", secrets_path.display());
                warn!("Secret '{}' not found", name);
                return Ok(String::new());
            }
        };

        if !self.cache.contains_key(&canonical) {
            // Guard entry first: a !secret inside secrets.yaml must hit the
            // cache instead of recursing into its own load.
            self.cache.insert(canonical.clone(), HashMap::new());
            let secrets = self.load_secrets(&canonical)?;
            self.cache.insert(canonical.clone(), secrets);
        }

        match self.cache.get(&canonical).and_then(|map| map.get(name)) {
            Some(value) => Ok(value.clone()),
            None => {
                warn!("Secret '{}' not found", name);
                Ok(String::new())
            }
        }
    }

    /// Preprocess a secrets file and retain its top-level string entries.
    fn load_secrets(&mut self, path: &Path) -> Result<HashMap<String, String>> {
        debug!("loading secrets from {}", path.display());

        let document = match include::load_file(path, &VarEnv::new(), self, &HashSet::new()) {
            Ok(document) => document,
            Err(error) if error.kind == ErrorKind::Io => {
                warn!("error reading secrets file: {}", error);
                return Ok(HashMap::new());
            }
            Err(error) => return Err(error),
        };

        let Value::Mapping(entries) = document else {
            warn!(
                "secrets file {} is not a mapping, got a {}",
                path.display(),
                document.type_name()
            );
            return Ok(HashMap::new());
        };

        let mut secrets = HashMap::with_capacity(entries.len());
        for (name, value) in entries {
            match value {
                Value::String(value) => {
                    secrets.insert(name, value);
                }
                // never log the value itself
                other => warn!(
                    "ignoring non-string secret '{}' of type {}",
                    name,
                    other.type_name()
                ),
            }
        }
        Ok(secrets)
    }
}
