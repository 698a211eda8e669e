//! Structured error types shared across the block-model crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SbmError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (vertex ids, block ids, sizes).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the block-model engine.
///
/// `IllegalMove` and `Unsupported` are recoverable at the call site (a driver
/// may try another proposal). `Invariant` signals broken bookkeeping and is
/// only produced by the explicit verification routines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SbmError {
    /// A move crossing a hard label constraint.
    #[error("illegal move: {0}")]
    IllegalMove(ErrorInfo),
    /// A combination of options with no implemented semantics.
    #[error("unsupported configuration: {0}")]
    Unsupported(ErrorInfo),
    /// Aggregate bookkeeping disagrees with a recomputation.
    #[error("invariant violation: {0}")]
    Invariant(ErrorInfo),
    /// Graph construction and lookup errors.
    #[error("graph error: {0}")]
    Graph(ErrorInfo),
    /// Invalid construction arguments or configuration payloads.
    #[error("config error: {0}")]
    Config(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SbmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SbmError::IllegalMove(info)
            | SbmError::Unsupported(info)
            | SbmError::Invariant(info)
            | SbmError::Graph(info)
            | SbmError::Config(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Builds an [`SbmError::IllegalMove`].
    pub fn illegal_move(code: &str, message: &str) -> Self {
        SbmError::IllegalMove(ErrorInfo::new(code, message))
    }

    /// Builds an [`SbmError::Unsupported`].
    pub fn unsupported(code: &str, message: &str) -> Self {
        SbmError::Unsupported(ErrorInfo::new(code, message))
    }

    /// Builds an [`SbmError::Invariant`].
    pub fn invariant(code: &str, message: &str) -> Self {
        SbmError::Invariant(ErrorInfo::new(code, message))
    }

    /// Builds an [`SbmError::Graph`].
    pub fn graph(code: &str, message: &str) -> Self {
        SbmError::Graph(ErrorInfo::new(code, message))
    }

    /// Builds an [`SbmError::Config`].
    pub fn config(code: &str, message: &str) -> Self {
        SbmError::Config(ErrorInfo::new(code, message))
    }

    /// Adds a context entry to the payload, keeping the family.
    pub fn with_context(self, key: &str, value: impl ToString) -> Self {
        self.map_info(|info| info.with_context(key, value))
    }

    /// Sets the remediation hint, keeping the family.
    pub fn with_hint(self, hint: &str) -> Self {
        self.map_info(|info| info.with_hint(hint))
    }

    fn map_info(self, f: impl FnOnce(ErrorInfo) -> ErrorInfo) -> Self {
        match self {
            SbmError::IllegalMove(info) => SbmError::IllegalMove(f(info)),
            SbmError::Unsupported(info) => SbmError::Unsupported(f(info)),
            SbmError::Invariant(info) => SbmError::Invariant(f(info)),
            SbmError::Graph(info) => SbmError::Graph(f(info)),
            SbmError::Config(info) => SbmError::Config(f(info)),
        }
    }
}
