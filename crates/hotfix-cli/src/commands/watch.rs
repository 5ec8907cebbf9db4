//! `hotfix watch`: re-pack whenever a plain build output is written.
//!
//! Uses the `notify` crate (v7). Bursts of events for the same write are
//! coalesced before packing.

use hotfix_runtime::{pack_artifacts, ArtifactLayout, HotfixCodec, HotfixConfig};
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use termcolor::ColorChoice;
use tracing::{debug, error, warn};

use super::pack::print_report;
use crate::output::StyledOutput;

const SETTLE: Duration = Duration::from_millis(250);

/// Whether `event` is a create or modify of one of the plain artifacts
fn touches_plain_artifact(event: &Event, layout: &ArtifactLayout) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| layout.plain_kind(name))
            .is_some()
    })
}

pub fn execute(
    build_dir: &Path,
    config: &HotfixConfig,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let layout = ArtifactLayout::new(&config.artifacts);
    let codec = HotfixCodec::from_build_secret()?;
    let mut out = StyledOutput::new(color);

    let (tx, rx) = mpsc::channel();
    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;
    watcher.watch(build_dir, RecursiveMode::NonRecursive)?;

    out.bold("Watching ");
    out.info(&build_dir.display().to_string());
    out.dim("  (Ctrl-C to stop)");
    out.newline();
    out.flush();

    // Anything already present is packed immediately.
    pack_and_report(build_dir, &layout, &codec, &mut out);

    loop {
        let event = match rx.recv() {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                warn!(error = %e, "watch error");
                continue;
            }
            Err(_) => break,
        };
        if !touches_plain_artifact(&event, &layout) {
            continue;
        }
        debug!(paths = ?event.paths, "plain artifact changed");

        // Let the writer finish before reading.
        while rx.recv_timeout(SETTLE).is_ok() {}
        pack_and_report(build_dir, &layout, &codec, &mut out);
    }
    Ok(())
}

fn pack_and_report(
    build_dir: &Path,
    layout: &ArtifactLayout,
    codec: &HotfixCodec,
    out: &mut StyledOutput,
) {
    match pack_artifacts(build_dir, layout, codec) {
        Ok(report) if report.is_empty() => {}
        Ok(report) => print_report(out, &report, build_dir),
        Err(e) => {
            error!(error = %e, "packing failed");
            out.error("error");
            out.plain(&format!(": {}", e));
            out.newline();
            out.flush();
        }
    }
}
