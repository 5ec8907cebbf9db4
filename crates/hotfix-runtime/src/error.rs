//! Runtime error taxonomy.

use hotfix_engine::{DomainError, ParseError};
use thiserror::Error;

use crate::artifact::ArtifactKind;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::fetcher::FetchError;
use crate::host::LoadState;

/// How an error is handled by the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the dependent initialization path
    Fatal,
    /// Logged and surfaced
    Reported,
    /// Logged and swallowed, state left intact
    Recoverable,
}

/// Why the domain handle was unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAccess {
    /// Host has not started loading yet
    NotRunning,
    /// Host is live but no load succeeded (skipped, failed, or disposed)
    LiveButUnloaded,
}

impl std::fmt::Display for DomainAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainAccess::NotRunning => {
                write!(f, "Hot-fix host is not running; call begin_load first")
            }
            DomainAccess::LiveButUnloaded => {
                write!(f, "Hot-fix domain is not loaded; the load was skipped or failed")
            }
        }
    }
}

/// Errors from the hot-fix runtime
#[derive(Debug, Error)]
pub enum HotfixError {
    /// No configurator was registered
    #[error("No configurator registered")]
    ConfiguratorMissing,

    /// More than one configurator was registered
    #[error("A configurator is already registered")]
    ConfiguratorAlreadyRegistered,

    /// `begin_load` called while a load is running or done
    #[error("Hot-fix load already attempted (state: {state:?}); dispose and reset before loading again")]
    DoubleLoadAttempted {
        /// State observed by the rejected call
        state: LoadState,
    },

    /// `reset` called while a load is running
    #[error("Cannot reset while a load is in flight")]
    LoadInFlight,

    /// `dispose` arrived while the load was running; nothing was published
    #[error("Load abandoned: host disposed while loading")]
    LoadAbandoned,

    /// Module or symbols could not be parsed
    #[error("Failed to parse hot-fix module: {0}")]
    ModuleParseFailure(#[from] ParseError),

    /// The behaviour marker type is absent from the module
    #[error("Behaviour marker type '{0}' not found in loaded module")]
    MissingBehaviourMarker(String),

    /// Domain handle read before a successful load
    #[error("{0}")]
    DomainAccessedBeforeLoad(DomainAccess),

    /// Artifact failed to decode
    #[error("Failed to decode {kind} artifact: {source}")]
    CodecDecodeFailure {
        /// Which artifact
        kind: ArtifactKind,
        /// Codec error
        #[source]
        source: CodecError,
    },

    /// Codec could not be constructed
    #[error("Codec setup failed: {0}")]
    Codec(CodecError),

    /// Artifact fetch failed
    #[error("Failed to fetch {kind} artifact: {source}")]
    Fetch {
        /// Which artifact
        kind: ArtifactKind,
        /// Fetch error
        #[source]
        source: FetchError,
    },

    /// Artifact fetch exceeded `loader.fetch_timeout_ms`
    #[error("Fetching {kind} artifact timed out after {timeout_ms}ms")]
    FetchTimeout {
        /// Which artifact
        kind: ArtifactKind,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Native bindings could not be linked
    #[error("Failed to register native bindings: {0}")]
    BindingFailure(DomainError),

    /// Entry point invocation failed
    #[error("Entry invocation failed: {0}")]
    EntryInvocation(DomainError),

    /// Other domain failure
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Debug bridge could not start
    #[error("Debug bridge failed: {0}")]
    DebugBridge(String),

    /// Catalog update check failed
    #[error("Catalog update check failed: {0}")]
    Catalog(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HotfixError {
    /// Handling policy for this error
    pub fn severity(&self) -> Severity {
        match self {
            HotfixError::ConfiguratorMissing
            | HotfixError::ConfiguratorAlreadyRegistered
            | HotfixError::MissingBehaviourMarker(_)
            | HotfixError::Codec(_)
            | HotfixError::Config(_) => Severity::Fatal,

            HotfixError::DoubleLoadAttempted { .. }
            | HotfixError::LoadInFlight
            | HotfixError::LoadAbandoned => Severity::Recoverable,

            HotfixError::ModuleParseFailure(_)
            | HotfixError::DomainAccessedBeforeLoad(_)
            | HotfixError::CodecDecodeFailure { .. }
            | HotfixError::Fetch { .. }
            | HotfixError::FetchTimeout { .. }
            | HotfixError::BindingFailure(_)
            | HotfixError::EntryInvocation(_)
            | HotfixError::Domain(_)
            | HotfixError::DebugBridge(_)
            | HotfixError::Catalog(_)
            | HotfixError::Io(_) => Severity::Reported,
        }
    }

    /// Whether this error aborts the dependent initialization path
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result alias for runtime operations
pub type HotfixResult<T> = Result<T, HotfixError>;
