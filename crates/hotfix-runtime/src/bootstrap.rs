//! Startup sequence
//!
//! Runs the configurator hooks around the catalog update check, then starts
//! loading. Recoverable load errors are logged and swallowed; everything else
//! propagates.

use tracing::{info, warn};

use crate::configurator::{CatalogChecker, UpdateDecision};
use crate::error::{HotfixResult, Severity};
use crate::host::HotfixHost;

/// How the startup sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Loading was started
    Started,
    /// The configurator declined an available update
    UpdateAborted,
}

/// Run the startup sequence on `host`
pub async fn start(
    host: &HotfixHost,
    catalog: &dyn CatalogChecker,
) -> HotfixResult<BootstrapOutcome> {
    host.set_live(true);
    let configurator = host.configurator().clone();
    configurator.before_check_update();

    let update = match catalog.check_catalog_update().await {
        Ok(update) => update,
        Err(err) => {
            warn!(error = %err, "catalog update check failed, loading local artifacts");
            None
        }
    };

    if let Some(info) = update {
        info!(
            catalogs = info.catalogs.len(),
            download_bytes = info.download_bytes,
            "catalog update available"
        );
        match configurator.on_update_available(&info) {
            UpdateDecision::Proceed => configurator.after_check_update(),
            UpdateDecision::Abort => {
                info!("update declined, startup stopped");
                return Ok(BootstrapOutcome::UpdateAborted);
            }
        }
    }

    match configurator.start_loading(host).await {
        Ok(()) => Ok(BootstrapOutcome::Started),
        Err(err) if err.severity() == Severity::Recoverable => {
            warn!(error = %err, "recoverable load error ignored");
            Ok(BootstrapOutcome::Started)
        }
        Err(err) => Err(err),
    }
}
