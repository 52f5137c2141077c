//! Error taxonomy for dapploader.
//!
//! Every failure on the resolution path is one of these kinds. Each variant
//! carries the offending address, range or name so the caller of a launch can
//! render a useful message without parsing strings.
//!
//! `LoaderError` is `Clone`: a single in-flight load is shared by every caller
//! that asked for the same address, and each of them receives the same error.

use thiserror::Error;

/// Result alias used across the workspace.
pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// No content exists for the address (unset name, empty or zero hash).
    #[error("no content found for {address}")]
    NotFound { address: String },

    /// The fetched bytes are not a valid descriptor document.
    #[error("could not parse descriptor of {address}: {reason}")]
    ParseError { address: String, reason: String },

    /// The descriptor has no `dapp` section.
    #[error("descriptor of {address} has no dapp section")]
    MissingEntrypoint { address: String },

    /// No published version satisfies the requested range.
    #[error("version not found: {range} for dapp {name}")]
    VersionNotFound { name: String, range: String },

    /// Dependency nesting exceeded the configured depth.
    #[error("recursive dependency detected at {name} (depth {depth})")]
    RecursiveDependency { name: String, depth: usize },

    /// Entrypoint extension is neither a script nor a document.
    #[error("invalid entry point defined for {address}: {entrypoint}")]
    InvalidEntrypoint { address: String, entrypoint: String },

    /// The descriptor has a `dapp` section without an entrypoint.
    #[error("no entry point defined for {address}")]
    NoEntrypoint { address: String },

    /// Network-level failure for a specific address.
    #[error("failed to load {address}: {reason}")]
    LoadFailure { address: String, reason: String },

    /// A version or range string could not be parsed.
    #[error("invalid version {value:?}: {reason}")]
    InvalidVersion { value: String, reason: String },

    /// Persistent cache failure. Always recoverable by live resolution.
    #[error("descriptor cache error: {0}")]
    Cache(String),

    /// Malformed configuration or module request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl LoaderError {
    pub fn not_found(address: impl Into<String>) -> Self {
        Self::NotFound {
            address: address.into(),
        }
    }

    pub fn parse(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::ParseError {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn load_failure(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::LoadFailure {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn cache(msg: impl ToString) -> Self {
        Self::Cache(msg.to_string())
    }

    /// Stable short code, used for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ParseError { .. } => "parse_error",
            Self::MissingEntrypoint { .. } => "missing_entrypoint",
            Self::VersionNotFound { .. } => "version_not_found",
            Self::RecursiveDependency { .. } => "recursive_dependency",
            Self::InvalidEntrypoint { .. } => "invalid_entrypoint",
            Self::NoEntrypoint { .. } => "no_entrypoint",
            Self::LoadFailure { .. } => "load_failure",
            Self::InvalidVersion { .. } => "invalid_version",
            Self::Cache(_) => "cache",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}
