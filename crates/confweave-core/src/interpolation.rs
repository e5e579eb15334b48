//! Variable interpolation
//!
//! Substitutes `${...}` constructs inside scalars against the active
//! variable environment. The recognized forms are a subset of shell
//! parameter expansion:
//!
//! - `${var}` - value, or empty string when unset
//! - `${var-default}` - default only when unset
//! - `${var:-default}` - default when unset or empty
//! - `${var?message}` - warn with message when unset
//! - `${var:?message}` - warn with message when unset or empty
//!
//! The pattern is non-nesting; nested defaults such as
//! `${outer-${inner}}` resolve through iterative re-scanning of the
//! substituted text. More than [`MAX_VAR_NESTING_DEPTH`] rescans of a
//! single scalar is a hard error.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::warn;

use crate::error::{Error, Result};

/// The active variable environment during a load.
///
/// Case-sensitive; merge points use put-if-absent so the first definition
/// along the include chain wins.
pub type VarEnv = IndexMap<String, String>;

/// Maximum number of substitution rescans for a single scalar.
pub const MAX_VAR_NESTING_DEPTH: usize = 10;

// Names are strictly ASCII word characters. Whitespace around the name is
// allowed and trimmed. The default/message capture is greedy, so on one
// scalar it runs to the last closing brace; inner ${...} text left behind
// this way is picked up by the rescan loop.
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*(?P<name>[A-Za-z0-9_]+)\s*(?:(?P<sep>:?[-?])(?P<rest>.*))?\}").unwrap()
});

/// Check whether a scalar contains any substitution site.
pub fn contains_variable(scalar: &str) -> bool {
    VAR_PATTERN.is_match(scalar)
}

/// Interpolate a scalar against the environment.
///
/// Returns `None` when the scalar contains no substitution site (the
/// identity case), otherwise the fully substituted text.
pub fn interpolate(scalar: &str, env: &VarEnv) -> Result<Option<String>> {
    if !VAR_PATTERN.is_match(scalar) {
        return Ok(None);
    }

    let mut current = scalar.to_string();
    let mut rounds = 0;

    loop {
        current = VAR_PATTERN
            .replace_all(&current, |caps: &Captures<'_>| {
                resolve_var(
                    env,
                    &caps["name"],
                    caps.name("sep").map(|m| m.as_str()),
                    caps.name("rest").map(|m| m.as_str()),
                )
            })
            .into_owned();
        rounds += 1;

        if !VAR_PATTERN.is_match(&current) {
            return Ok(Some(current));
        }
        if rounds > MAX_VAR_NESTING_DEPTH {
            return Err(Error::variable_nesting_too_deep(scalar));
        }
    }
}

/// Resolve a single substitution site.
///
/// `sep` is one of `-`, `:-`, `?`, `:?` when present; `rest` is the default
/// value or the mandatory-variable message.
fn resolve_var(env: &VarEnv, name: &str, sep: Option<&str>, rest: Option<&str>) -> String {
    let value = env.get(name);
    if let Some(v) = value {
        if !v.is_empty() {
            return v.clone();
        }
    }

    // The variable is unset or empty from here on.
    let Some(sep) = sep else {
        return String::new();
    };

    let triggered = if sep.starts_with(':') {
        true // unset and empty both trigger
    } else {
        value.is_none() // only unset triggers
    };
    if !triggered {
        return String::new();
    }

    if sep.ends_with('?') {
        let state = if value.is_none() { "Missing" } else { "Empty" };
        warn!(
            "{} mandatory variable {}: {}",
            state,
            name,
            rest.unwrap_or_default()
        );
        return String::new();
    }

    rest.unwrap_or_default().to_string()
}
