//! Include engine
//!
//! Loads one file through the full preprocessing pipeline:
//!
//! 1. canonicalize the path, check the include stack for cycles and depth
//! 2. first parse: extract the top-level `variables` section and merge it
//!    under the inherited environment (put-if-absent, callers win)
//! 3. inject the predefined `__FILE__` family, which always reflects the
//!    current file
//! 4. second parse with the combined environment, so interpolation sees
//!    both inherited and in-file variables
//! 5. strip `variables`, then walk the tree replacing `!include` and
//!    `!secret` references
//! 6. extract `packages` and fold them into the main mapping
//!
//! The include stack is branch-local: every recursion works on a copy
//! extended with its own path, so sibling includes never observe each
//! other and a legitimate diamond include graph is not a cycle.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::interpolation::VarEnv;
use crate::merge;
use crate::preprocessor::Loader;
use crate::secrets::SecretStore;
use crate::value::Value;

/// Hard limit on nested includes.
pub const MAX_INCLUDE_DEPTH: usize = 100;

const VARIABLES_KEY: &str = "variables";
const PACKAGES_KEY: &str = "packages";

/// Load and fully preprocess one file.
///
/// `stack` holds the canonical paths of every file currently being loaded
/// on this branch of the include graph.
pub(crate) fn load_file(
    path: &Path,
    inherited: &VarEnv,
    secrets: &mut SecretStore,
    stack: &HashSet<PathBuf>,
) -> Result<Value> {
    let path = std::fs::canonicalize(path).map_err(|e| Error::io(path, e.to_string()))?;

    let mut branch = stack.clone();
    if !branch.insert(path.clone()) {
        let chain: Vec<PathBuf> = stack.iter().cloned().collect();
        return Err(Error::circular_inclusion(&chain, path));
    }
    if branch.len() > MAX_INCLUDE_DEPTH {
        return Err(Error::max_depth_exceeded(path, MAX_INCLUDE_DEPTH));
    }

    debug!(
        "loading file ({}): {} with {} inherited vars",
        stack.len(),
        path.display(),
        inherited.len()
    );

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e.to_string()))?;

    // First pass: parse to extract the in-file variables. Everything else
    // from this pass is discarded.
    let first = Loader::new(inherited.clone())
        .load_str(&content)
        .map_err(|e| e.with_file(&path))?;

    let Value::Mapping(first_map) = first else {
        // Arrays and scalars may legitimately be included; they are
        // grafted at the reference site without the variables/packages
        // treatment, but any references they carry still resolve.
        return resolve_refs(first, &path, secrets, &branch);
    };

    let mut vars = inherited.clone();
    extract_variables(&path, &first_map, &mut vars);
    add_predefined_variables(&mut vars, &path);
    trace!("combined vars for {}: {:?}", path.display(), vars);

    // Second pass: now interpolation resolves against the combined
    // environment.
    let second = Loader::new(vars)
        .load_str(&content)
        .map_err(|e| e.with_file(&path))?;

    let Value::Mapping(mut map) = second else {
        return Ok(second);
    };
    map.shift_remove(VARIABLES_KEY);

    let resolved = resolve_refs(Value::Mapping(map), &path, secrets, &branch)?;
    let Value::Mapping(mut map) = resolved else {
        return Ok(resolved);
    };

    let packages = map.shift_remove(PACKAGES_KEY);
    Ok(Value::Mapping(merge::merge_packages(map, packages)))
}

/// Merge the top-level `variables` section into `vars` with put-if-absent
/// semantics, so definitions inherited from the caller win over this
/// file's own.
fn extract_variables(path: &Path, map: &IndexMap<String, Value>, vars: &mut VarEnv) {
    match map.get(VARIABLES_KEY) {
        None => {}
        Some(Value::Mapping(section)) => {
            for (name, value) in section {
                match value {
                    Value::Mapping(_) => {
                        warn!("value for variable '{}' cannot be a mapping", name);
                    }
                    Value::Sequence(_) => {
                        warn!("value for variable '{}' cannot be a sequence", name);
                    }
                    other => {
                        if let Some(text) = other.scalar_string() {
                            vars.entry(name.clone()).or_insert(text);
                        }
                    }
                }
            }
        }
        Some(other) => {
            warn!(
                "{}: '{}' is not a mapping, got a {}",
                path.display(),
                VARIABLES_KEY,
                other.type_name()
            );
        }
    }
}

/// Predefined variables always reflect the current file; user definitions
/// cannot shadow them.
fn add_predefined_variables(vars: &mut VarEnv, path: &Path) {
    vars.insert("__FILE__".into(), path.display().to_string());

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = match file_name.rfind('.') {
        Some(index) if index > 0 => (
            file_name[..index].to_string(),
            file_name[index + 1..].to_string(),
        ),
        _ => (file_name, String::new()),
    };
    vars.insert("__FILE_NAME__".into(), stem);
    vars.insert("__FILE_EXT__".into(), extension);

    let parent = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    vars.insert("__PATH__".into(), parent);
}

/// Walk the tree, replacing include and secret references. Mapping order
/// and sequence order are preserved.
fn resolve_refs(
    value: Value,
    file: &Path,
    secrets: &mut SecretStore,
    stack: &HashSet<PathBuf>,
) -> Result<Value> {
    match value {
        Value::IncludeRef(include) => {
            let target = file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&include.file_name);
            match load_file(&target, &include.vars, secrets, stack) {
                Ok(loaded) => Ok(loaded),
                Err(error) if error.kind == ErrorKind::Io => {
                    // a missing include degrades to an empty mapping
                    warn!("error loading include file: {}", error);
                    Ok(Value::Mapping(IndexMap::new()))
                }
                Err(error) => Err(error),
            }
        }
        Value::SecretRef(secret) => Ok(Value::String(secrets.resolve(&secret.name, file)?)),
        Value::Mapping(map) => {
            let mut resolved = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key, resolve_refs(value, file, secrets, stack)?);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Sequence(seq) => {
            let mut resolved = Vec::with_capacity(seq.len());
            for value in seq {
                resolved.push(resolve_refs(value, file, secrets, stack)?);
            }
            Ok(Value::Sequence(resolved))
        }
        other => Ok(other),
    }
}
