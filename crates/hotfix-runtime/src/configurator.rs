//! Host strategy hooks and the catalog update check

use async_trait::async_trait;

use crate::error::HotfixResult;
use crate::host::HotfixHost;

/// Result of a catalog update check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    /// Catalogs with pending changes
    pub catalogs: Vec<String>,
    /// Bytes to download
    pub download_bytes: u64,
}

/// Configurator's answer to an available update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Download, then start loading
    Proceed,
    /// Stop the startup sequence
    Abort,
}

/// The single host-supplied strategy object.
///
/// Only `entry_argument` is required. `start_loading` defaults to beginning
/// the hot-fix load on the host it is given.
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Called before the catalog update check
    fn before_check_update(&self) {}

    /// Called when the catalog reports an update
    fn on_update_available(&self, _info: &UpdateInfo) -> UpdateDecision {
        UpdateDecision::Proceed
    }

    /// Called after an update was accepted
    fn after_check_update(&self) {}

    /// Start the hot-fix load
    async fn start_loading(&self, host: &HotfixHost) -> HotfixResult<()> {
        host.begin_load().await
    }

    /// Argument passed to the entry point, e.g. a scene path
    fn entry_argument(&self) -> String;
}

/// Asset catalog update check, provided by the host's content system
#[async_trait]
pub trait CatalogChecker: Send + Sync {
    /// Returns update details when newer content is available
    async fn check_catalog_update(&self) -> HotfixResult<Option<UpdateInfo>>;
}

/// Catalog that never has updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

#[async_trait]
impl CatalogChecker for NoCatalog {
    async fn check_catalog_update(&self) -> HotfixResult<Option<UpdateInfo>> {
        Ok(None)
    }
}

/// Configurator with a fixed entry argument and default hooks
#[derive(Debug, Clone)]
pub struct StaticConfigurator {
    entry_argument: String,
}

impl StaticConfigurator {
    /// Configurator passing `entry_argument` to the entry point
    pub fn new(entry_argument: impl Into<String>) -> Self {
        Self {
            entry_argument: entry_argument.into(),
        }
    }
}

#[async_trait]
impl Configurator for StaticConfigurator {
    fn entry_argument(&self) -> String {
        self.entry_argument.clone()
    }
}
