//! Artifact naming shared by the packager and the loader

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ArtifactsConfig;

/// The two artifacts a hot-fix build produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Module image
    Module,
    /// Paired symbol image
    Symbols,
}

impl ArtifactKind {
    /// Both kinds, module first
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Module, ArtifactKind::Symbols];
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Module => write!(f, "module"),
            ArtifactKind::Symbols => write!(f, "symbols"),
        }
    }
}

/// Resolved artifact names for one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    folder: String,
    module: String,
    symbols: String,
    extension: String,
}

impl ArtifactLayout {
    /// Layout from the `[artifacts]` section
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            folder: config.folder.clone(),
            module: config.module.clone(),
            symbols: config.symbols.clone(),
            extension: config.extension.clone(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of the plain build output, e.g. `hotfix.module`
    pub fn plain_name(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Module => &self.module,
            ArtifactKind::Symbols => &self.symbols,
        }
    }

    /// File name of the encoded artifact, e.g. `hotfix.module.bytes`
    pub fn wrapped_name(&self, kind: ArtifactKind) -> String {
        format!("{}.{}", self.plain_name(kind), self.extension)
    }

    /// Path the fetcher resolves, relative to the root: `HotFix/hotfix.module.bytes`
    pub fn logical_path(&self, kind: ArtifactKind) -> String {
        format!("{}/{}", self.folder, self.wrapped_name(kind))
    }

    /// Where the packager writes the encoded artifact
    pub fn output_path(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(&self.folder).join(self.wrapped_name(kind))
    }

    /// Whether `file_name` is one of the plain build outputs
    pub fn plain_kind(&self, file_name: &str) -> Option<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .find(|&kind| self.plain_name(kind) == file_name)
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(&ArtifactsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let layout = ArtifactLayout::default();
        assert_eq!(layout.logical_path(ArtifactKind::Module), "HotFix/hotfix.module.bytes");
        assert_eq!(layout.logical_path(ArtifactKind::Symbols), "HotFix/hotfix.symbols.bytes");
        assert_eq!(
            layout.output_path(ArtifactKind::Module),
            Path::new("assets").join("HotFix").join("hotfix.module.bytes")
        );
    }

    #[test]
    fn test_plain_kind() {
        let layout = ArtifactLayout::default();
        assert_eq!(layout.plain_kind("hotfix.symbols"), Some(ArtifactKind::Symbols));
        assert_eq!(layout.plain_kind("hotfix.module.bytes"), None);
    }
}
