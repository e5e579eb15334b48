//! Error types for the preprocessor
//!
//! Hard failures are structured errors carrying the offending file, an
//! underlying cause, and an actionable help message. Soft conditions
//! (missing secrets, malformed reserved sections, mandatory-variable
//! misses) are not errors: they are logged and the load degrades, see the
//! module documentation of the crate root.

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type alias for preprocessor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for preprocessor operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// File being processed when the error occurred, if known
    pub file: Option<PathBuf>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
}

/// Categories of hard errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// File open/read failure
    Io,
    /// Underlying YAML syntax error
    Parse,
    /// A file re-entered the active include stack
    CircularInclusion,
    /// Include depth exceeded the hard limit
    MaxDepthExceeded,
    /// A scalar required more substitution rescans than the hard limit
    VariableNestingTooDeep,
    /// No constructor registered for a resolved tag
    ConstructorNotFound,
    /// A node had a shape the preprocessor cannot accept
    Structure,
}

impl Error {
    /// Create an I/O error for the given file
    pub fn io(file: impl Into<PathBuf>, cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io,
            file: Some(file.into()),
            cause: Some(cause.into()),
            help: None,
        }
    }

    /// Create a parse error
    pub fn parse(cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            file: None,
            cause: Some(cause.into()),
            help: None,
        }
    }

    /// Create a circular inclusion error from the active stack and the
    /// re-entered path
    pub fn circular_inclusion(stack: &[PathBuf], file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let mut chain: Vec<String> = stack.iter().map(|p| p.display().to_string()).collect();
        chain.sort();
        chain.push(file.display().to_string());
        Self {
            kind: ErrorKind::CircularInclusion,
            file: Some(file),
            cause: Some(format!("Chain: {}", chain.join(" -> "))),
            help: Some("Break the cycle by removing one of the !include references".into()),
        }
    }

    /// Create a max include depth error
    pub fn max_depth_exceeded(file: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            kind: ErrorKind::MaxDepthExceeded,
            file: Some(file.into()),
            cause: Some(format!("Limit: {} nested includes", limit)),
            help: Some("Flatten the include graph or remove an unintended self-include".into()),
        }
    }

    /// Create a variable nesting error for the scalar that kept producing
    /// new substitution sites
    pub fn variable_nesting_too_deep(scalar: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::VariableNestingTooDeep,
            file: None,
            cause: Some(format!("Scalar: {}", scalar.into())),
            help: Some("Check the variable defaults for a self-referential ${...} chain".into()),
        }
    }

    /// Create an error for a tag with no registered constructor
    pub fn constructor_not_found(tag: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ConstructorNotFound,
            file: None,
            cause: Some(format!("Tag: {}", tag.into())),
            help: None,
        }
    }

    /// Create an error for a substituted scalar whose new tag has no
    /// registered constructor
    pub fn constructor_not_found_for_substitution(
        original: &str,
        substituted: &str,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::ConstructorNotFound,
            file: None,
            cause: Some(format!(
                "No constructor for substituted value '{}' => '{}' with tag {}",
                original,
                substituted,
                tag.into()
            )),
            help: None,
        }
    }

    /// Create a structural error
    pub fn structure(cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Structure,
            file: None,
            cause: Some(cause.into()),
            help: None,
        }
    }

    /// Attach the file being processed, keeping an already-recorded file
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.as_ref().to_path_buf());
        }
        self
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::CircularInclusion => write!(f, "Circular inclusion detected")?,
            ErrorKind::MaxDepthExceeded => write!(f, "Maximum include depth exceeded")?,
            ErrorKind::VariableNestingTooDeep => write!(f, "Variable nesting is too deep")?,
            ErrorKind::ConstructorNotFound => write!(f, "No constructor found")?,
            ErrorKind::Structure => write!(f, "Invalid document structure")?,
        }

        if let Some(file) = &self.file {
            write!(f, "\n  File: {}", file.display())?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
