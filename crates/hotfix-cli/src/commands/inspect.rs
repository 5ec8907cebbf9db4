//! `hotfix inspect`: summarize a module file.

use anyhow::Context;
use hotfix_engine::HotFixBundle;
use hotfix_runtime::codec::CODEC_MAGIC;
use hotfix_runtime::{HotfixCodec, ModuleSummary};
use std::path::Path;
use termcolor::ColorChoice;

use crate::output::StyledOutput;

/// Read `path`, unwrapping it when it carries the codec header
fn read_artifact(path: &Path, codec: &HotfixCodec) -> anyhow::Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.starts_with(&CODEC_MAGIC) {
        return codec
            .decode(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()));
    }
    Ok(bytes)
}

pub fn execute(
    module: &Path,
    symbols: Option<&Path>,
    json: bool,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let codec = HotfixCodec::from_build_secret()?;
    let mut bundle = HotFixBundle::new(read_artifact(module, &codec)?);
    if let Some(symbols) = symbols {
        bundle = bundle.with_symbols(read_artifact(symbols, &codec)?);
    }
    let summary = ModuleSummary::analyze(bundle)
        .with_context(|| format!("{} is not a valid module", module.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut out = StyledOutput::new(color);
    print_summary(&mut out, &summary);
    Ok(())
}

fn print_summary(out: &mut StyledOutput, summary: &ModuleSummary) {
    out.bold(&summary.name);
    out.newline();
    out.field("checksum", &summary.checksum);
    out.field("symbols", if summary.has_symbols { "yes" } else { "no" });
    out.field("entry", if summary.has_entry { "yes" } else { "missing" });
    out.field(
        "natives",
        &if summary.natives.is_empty() {
            "(none)".to_string()
        } else {
            summary.natives.join(", ")
        },
    );

    out.newline();
    out.bold("Types");
    out.newline();
    for ty in &summary.types {
        out.plain("  ");
        out.info(&ty.name);
        out.dim(&format!(" {}", ty.kind));
        if let Some(parent) = &ty.parent {
            out.dim(&format!(" : {}", parent));
        }
        out.newline();
        for method in &ty.methods {
            out.dim(&format!("      {}", method));
            out.newline();
        }
    }

    out.newline();
    match &summary.behaviours {
        Some(names) => {
            out.bold(&format!("Behaviours ({})", names.len()));
            out.newline();
            for name in names {
                out.success("  ");
                out.plain(name);
                out.newline();
            }
        }
        None => out.warning_line("behaviour marker type not found"),
    }
    if !summary.has_entry {
        out.warning_line("entry point not found");
    }
    out.flush();
}
