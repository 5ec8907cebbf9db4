//! `hotfix pack`: encode plain build outputs once.

use hotfix_runtime::{pack_artifacts, ArtifactLayout, HotfixCodec, HotfixConfig, PackReport};
use std::path::Path;
use termcolor::ColorChoice;

use crate::output::{format_bytes, StyledOutput};

pub fn execute(
    build_dir: &Path,
    config: &HotfixConfig,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let layout = ArtifactLayout::new(&config.artifacts);
    let codec = HotfixCodec::from_build_secret()?;
    let mut out = StyledOutput::new(color);

    let report = pack_artifacts(build_dir, &layout, &codec)?;
    print_report(&mut out, &report, build_dir);
    Ok(())
}

/// Print one packaging run. Shared with `watch`.
pub fn print_report(out: &mut StyledOutput, report: &PackReport, build_dir: &Path) {
    if report.is_empty() {
        out.warning_line(&format!(
            "no plain artifacts found in {}",
            build_dir.display()
        ));
        out.flush();
        return;
    }

    for packed in &report.packed {
        out.success("  Packed ");
        out.plain(&format!("{:<8}", packed.kind.to_string()));
        out.info(&packed.output.display().to_string());
        out.dim(&format!(
            "  ({} -> {})",
            format_bytes(packed.plain_bytes),
            format_bytes(packed.encoded_bytes)
        ));
        out.newline();
    }
    for kind in &report.skipped {
        out.dim(&format!("  Skipped {} (no plain file)", kind));
        out.newline();
    }

    if let Some(summary) = &report.summary {
        let behaviours = summary
            .behaviours
            .as_ref()
            .map(|names| names.len().to_string())
            .unwrap_or_else(|| "marker missing".to_string());
        out.field("module", &summary.name);
        out.field("types", &summary.types.len().to_string());
        out.field("behaviours", &behaviours);
    }
    for warning in &report.warnings {
        out.warning_line(warning);
    }
    out.flush();
}
