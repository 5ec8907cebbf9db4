//! Build-time packager
//!
//! Encodes the plain build outputs found in a build directory, writes them
//! under `<root>/<folder>/<name>.<extension>`, and deletes the plain files.

use hotfix_engine::HotFixBundle;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{ArtifactKind, ArtifactLayout};
use crate::codec::{CodecError, HotfixCodec};
use crate::inspect::ModuleSummary;

/// Packaging errors
#[derive(Debug, Error)]
pub enum PackError {
    /// Reading, writing, or deleting a file failed
    #[error("{action} {}: {source}", .path.display())]
    Io {
        /// What was being done
        action: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Encoding failed
    #[error("Failed to encode {kind} artifact: {source}")]
    Codec {
        /// Which artifact
        kind: ArtifactKind,
        /// Codec error
        #[source]
        source: CodecError,
    },
}

/// One encoded artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArtifact {
    /// Which artifact
    pub kind: ArtifactKind,
    /// Plain input (deleted after packing)
    pub source: PathBuf,
    /// Encoded output
    pub output: PathBuf,
    /// Plain size
    pub plain_bytes: usize,
    /// Encoded size
    pub encoded_bytes: usize,
}

/// Result of one packaging run
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    /// Artifacts written
    pub packed: Vec<PackedArtifact>,
    /// Kinds with no plain file in the build directory
    pub skipped: Vec<ArtifactKind>,
    /// Summary of the packed module, when it parsed
    pub summary: Option<ModuleSummary>,
    /// Problems that did not stop packaging
    pub warnings: Vec<String>,
}

impl PackReport {
    /// Whether nothing was packed
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }
}

/// Encode and move every plain artifact present in `build_dir`
pub fn pack_artifacts(
    build_dir: &Path,
    layout: &ArtifactLayout,
    codec: &HotfixCodec,
) -> Result<PackReport, PackError> {
    let mut report = PackReport::default();
    let mut plain_module = None;
    let mut plain_symbols = None;

    for kind in ArtifactKind::ALL {
        let source = build_dir.join(layout.plain_name(kind));
        if !source.is_file() {
            report.skipped.push(kind);
            continue;
        }

        let plain = std::fs::read(&source).map_err(|e| PackError::Io {
            action: "read",
            path: source.clone(),
            source: e,
        })?;
        let encoded = codec
            .encode(&plain)
            .map_err(|source| PackError::Codec { kind, source })?;

        let output = layout.output_path(kind);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&output, &encoded).map_err(|e| PackError::Io {
            action: "write",
            path: output.clone(),
            source: e,
        })?;
        std::fs::remove_file(&source).map_err(|e| PackError::Io {
            action: "delete",
            path: source.clone(),
            source: e,
        })?;

        info!(%kind, output = %output.display(), bytes = encoded.len(), "artifact packed");
        report.packed.push(PackedArtifact {
            kind,
            source,
            output,
            plain_bytes: plain.len(),
            encoded_bytes: encoded.len(),
        });
        match kind {
            ArtifactKind::Module => plain_module = Some(plain),
            ArtifactKind::Symbols => plain_symbols = Some(plain),
        }
    }

    if let Some(module) = plain_module {
        let mut bundle = HotFixBundle::new(module);
        if let Some(symbols) = plain_symbols {
            bundle = bundle.with_symbols(symbols);
        }
        match ModuleSummary::analyze(bundle) {
            Ok(summary) => {
                if summary.behaviours.is_none() {
                    report
                        .warnings
                        .push("module has no behaviour marker type".to_string());
                }
                if !summary.has_entry {
                    report.warnings.push("module has no entry point".to_string());
                }
                report.summary = Some(summary);
            }
            Err(e) => report
                .warnings
                .push(format!("packed module does not parse: {}", e)),
        }
    }

    for warning in &report.warnings {
        warn!("{}", warning);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactsConfig;

    fn layout(root: &Path) -> ArtifactLayout {
        ArtifactLayout::new(&ArtifactsConfig {
            root: root.to_string_lossy().into_owned(),
            ..ArtifactsConfig::default()
        })
    }

    #[test]
    fn test_empty_build_dir_skips_everything() {
        let build = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let codec = HotfixCodec::new(b"k").unwrap();

        let report = pack_artifacts(build.path(), &layout(out.path()), &codec).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.skipped, vec![ArtifactKind::Module, ArtifactKind::Symbols]);
        assert!(report.summary.is_none());
    }

    #[test]
    fn test_unparseable_module_still_packed_with_warning() {
        let build = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(build.path().join("hotfix.module"), b"not a module").unwrap();
        let codec = HotfixCodec::new(b"k").unwrap();

        let report = pack_artifacts(build.path(), &layout(out.path()), &codec).unwrap();
        assert_eq!(report.packed.len(), 1);
        assert!(report.summary.is_none());
        assert!(report.warnings[0].contains("does not parse"));
        assert!(!build.path().join("hotfix.module").exists());
    }
}
