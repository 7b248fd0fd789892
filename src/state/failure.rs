//! Failure classification for fetch and parse units
use crate::FetchError;
use crate::storage::ReviewId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Why a single unit of work did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Network failure or timeout, after all retry attempts were used
    Transport { message: String },

    /// Non-2xx response from the remote site
    Http { status: u16 },

    /// The page was fetched but could not be parsed
    Parse {
        message: String,
        /// Cached copy of the page, kept for later inspection
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<PathBuf>,
    },

    /// The run was interrupted before this unit started
    Cancelled,

    /// The unit panicked; this is a bug, not a property of the page
    Internal { message: String },
}

impl FailureKind {
    /// Returns true if repeating the unit cannot change its outcome
    ///
    /// Client errors and parse errors are permanent. Transport errors,
    /// server errors and cancelled units are worth another run.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Http { status } => *status < 500,
            Self::Parse { .. } => true,
            Self::Transport { .. } | Self::Cancelled | Self::Internal { .. } => false,
        }
    }

    /// Short label used when grouping failures in summaries
    pub fn label(&self) -> String {
        match self {
            Self::Transport { .. } => "TransportError".to_string(),
            Self::Http { status } => format!("HttpError{{{}}}", status),
            Self::Parse { .. } => "ParseError".to_string(),
            Self::Cancelled => "Cancelled".to_string(),
            Self::Internal { .. } => "InternalError".to_string(),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { message } => write!(f, "transport error: {}", message),
            Self::Http { status } => write!(f, "HTTP status {}", status),
            Self::Parse {
                message,
                raw: Some(raw),
            } => write!(f, "parse error: {} (raw page: {})", message, raw.display()),
            Self::Parse { message, raw: None } => write!(f, "parse error: {}", message),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl From<FetchError> for FailureKind {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport { message } => Self::Transport { message },
            FetchError::Http { status } => Self::Http { status },
        }
    }
}

/// A failed unit together with the ISBNs it was fetched for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Every ISBN the failed review is indexed under; empty if unknown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub isbns: Vec<String>,

    #[serde(flatten)]
    pub kind: FailureKind,
}

/// Review ID → failure, in review ID order
pub type FailureReport = BTreeMap<ReviewId, Failure>;
