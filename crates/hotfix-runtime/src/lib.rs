//! Hotfix Runtime
//!
//! Drives the hot-fix module lifecycle on top of `hotfix-engine`:
//! - **Codec**: authenticated encoding of build artifacts (`codec` module)
//! - **Loader**: the load state machine and published domain (`host` module)
//! - **Discovery**: behaviour registry and entry invocation (`behaviours`, `entry`)
//! - **Debugging**: TCP debug bridge and exception sinks (`debug_bridge`, `sink`)
//! - **Tooling**: packager and module summaries (`pack`, `inspect`)
//!
//! # Example
//!
//! ```rust,ignore
//! use hotfix_runtime::{bootstrap, HotfixConfig, HotfixHost, NoCatalog, StaticConfigurator};
//! use std::sync::Arc;
//!
//! let host = HotfixHost::builder(HotfixConfig::default())
//!     .configurator(Arc::new(StaticConfigurator::new("scene/Main")))
//!     .natives(natives)
//!     .build()?;
//! bootstrap::start(&host, &NoCatalog).await?;
//! println!("{:?}", host.behaviours().list());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod artifact;
pub mod behaviours;
pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod configurator;
pub mod debug_bridge;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod host;
pub mod inspect;
pub mod pack;
pub mod sink;

pub use artifact::{ArtifactKind, ArtifactLayout};
pub use behaviours::{BehaviourRegistry, BEHAVIOUR_MARKER};
pub use bootstrap::BootstrapOutcome;
pub use codec::{CodecError, HotfixCodec};
pub use config::{ConfigError, FetchMode, HotfixConfig, Profile};
pub use configurator::{
    CatalogChecker, Configurator, NoCatalog, StaticConfigurator, UpdateDecision, UpdateInfo,
};
pub use debug_bridge::DebugBridge;
pub use entry::{EntryDescriptor, EntryInvoker, ENTRY};
pub use error::{DomainAccess, HotfixError, HotfixResult, Severity};
pub use fetcher::{ArtifactFetcher, FetchError, FileFetcher, MemoryFetcher};
pub use host::{HotfixHost, HotfixHostBuilder, LoadState};
pub use inspect::{ModuleSummary, TypeSummary};
pub use pack::{pack_artifacts, PackError, PackReport, PackedArtifact};
pub use sink::{ExceptionSink, MemorySink, TracingSink};
