//! Paired symbol image
//!
//! Source locations for the types and methods of one module image. A symbol
//! image records the SHA-256 of the module payload it was produced for and is
//! only accepted alongside that exact module.

use super::encoder::{DecodeError, ImageReader, ImageWriter};
use super::module::ModuleImage;
use thiserror::Error;

/// Magic number for symbol images: "HFXS"
pub const SYMBOLS_MAGIC: [u8; 4] = *b"HFXS";

/// Current symbol image version
pub const SYMBOLS_VERSION: u32 = 1;

/// Symbol image errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected HFXS, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported symbol version: {0} (current: {SYMBOLS_VERSION})")]
    UnsupportedVersion(u32),

    /// A type refers to a source file that is not in the table
    #[error("Type '{type_name}' refers to source file #{index}, table has {count}")]
    SourceFileOutOfRange {
        /// Type name
        type_name: String,
        /// Offending index
        index: u32,
        /// Source file table length
        count: usize,
    },

    /// Bytes left over after the last table
    #[error("{0} trailing bytes after symbol payload")]
    TrailingBytes(usize),
}

/// A resolved source location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    /// Source file path
    pub file: &'a str,
    /// Line number (1-indexed)
    pub line: u32,
}

/// Symbols for one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSymbols {
    /// Method name
    pub name: String,
    /// Declaration line
    pub line: u32,
}

/// Symbols for one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSymbols {
    /// Fully-qualified type name
    pub type_name: String,
    /// Index into `source_files`
    pub source_file: u32,
    /// Declaration line
    pub line: u32,
    /// Method locations
    pub methods: Vec<MethodSymbols>,
}

/// Symbol image for one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolImage {
    /// SHA-256 of the module payload these symbols describe
    pub module_checksum: [u8; 32],
    /// Source file paths
    pub source_files: Vec<String>,
    /// Per-type symbols
    pub types: Vec<TypeSymbols>,
}

impl SymbolImage {
    /// Create empty symbols for a module checksum
    pub fn new(module_checksum: [u8; 32]) -> Self {
        Self {
            module_checksum,
            source_files: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Add or get the index of a source file
    pub fn add_source_file(&mut self, path: &str) -> u32 {
        if let Some(idx) = self.source_files.iter().position(|p| p == path) {
            idx as u32
        } else {
            self.source_files.push(path.to_string());
            (self.source_files.len() - 1) as u32
        }
    }

    /// Whether these symbols were produced for `module`
    pub fn matches(&self, module: &ModuleImage) -> bool {
        self.module_checksum == module.checksum
    }

    /// Look up the location of a method, falling back to the type declaration
    pub fn location(&self, type_name: &str, method: Option<&str>) -> Option<SourceLocation<'_>> {
        let ty = self.types.iter().find(|t| t.type_name == type_name)?;
        let file = self.source_files.get(ty.source_file as usize)?;
        let line = method
            .and_then(|name| ty.methods.iter().find(|m| m.name == name))
            .map(|m| m.line)
            .unwrap_or(ty.line);
        Some(SourceLocation { file, line })
    }

    /// Encode to binary
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ImageWriter::new();
        writer.emit_bytes(&SYMBOLS_MAGIC);
        writer.emit_u32(SYMBOLS_VERSION);
        writer.emit_bytes(&self.module_checksum);

        writer.emit_u32(self.source_files.len() as u32);
        for path in &self.source_files {
            writer.emit_string(path);
        }

        writer.emit_u32(self.types.len() as u32);
        for ty in &self.types {
            writer.emit_string(&ty.type_name);
            writer.emit_u32(ty.source_file);
            writer.emit_u32(ty.line);
            writer.emit_u32(ty.methods.len() as u32);
            for method in &ty.methods {
                writer.emit_string(&method.name);
                writer.emit_u32(method.line);
            }
        }

        writer.into_bytes()
    }

    /// Decode from binary
    pub fn decode(data: &[u8]) -> Result<Self, SymbolError> {
        let mut reader = ImageReader::new(data);

        let magic: [u8; 4] = reader.read_array()?;
        if magic != SYMBOLS_MAGIC {
            return Err(SymbolError::InvalidMagic(magic));
        }
        let version = reader.read_u32()?;
        if version != SYMBOLS_VERSION {
            return Err(SymbolError::UnsupportedVersion(version));
        }
        let module_checksum: [u8; 32] = reader.read_array()?;

        let file_count = reader.read_len()?;
        let mut source_files = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            source_files.push(reader.read_string()?);
        }

        let type_count = reader.read_len()?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let type_name = reader.read_string()?;
            let source_file = reader.read_u32()?;
            if source_file as usize >= source_files.len() {
                return Err(SymbolError::SourceFileOutOfRange {
                    type_name,
                    index: source_file,
                    count: source_files.len(),
                });
            }
            let line = reader.read_u32()?;
            let method_count = reader.read_len()?;
            let mut methods = Vec::with_capacity(method_count);
            for _ in 0..method_count {
                let name = reader.read_string()?;
                let line = reader.read_u32()?;
                methods.push(MethodSymbols { name, line });
            }
            types.push(TypeSymbols {
                type_name,
                source_file,
                line,
                methods,
            });
        }

        if reader.remaining() > 0 {
            return Err(SymbolError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            module_checksum,
            source_files,
            types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SymbolImage {
        let mut symbols = SymbolImage::new([7u8; 32]);
        let file = symbols.add_source_file("src/game/player.hfx");
        symbols.types.push(TypeSymbols {
            type_name: "Game.Player".to_string(),
            source_file: file,
            line: 10,
            methods: vec![MethodSymbols {
                name: "Update".to_string(),
                line: 14,
            }],
        });
        symbols
    }

    #[test]
    fn test_decode_restores_tables() {
        let symbols = sample();
        let decoded = SymbolImage::decode(&symbols.encode()).unwrap();
        assert_eq!(decoded, symbols);
    }

    #[test]
    fn test_location_lookup() {
        let symbols = sample();
        let loc = symbols.location("Game.Player", Some("Update")).unwrap();
        assert_eq!(loc.file, "src/game/player.hfx");
        assert_eq!(loc.line, 14);

        // Unknown method falls back to the type declaration
        let loc = symbols.location("Game.Player", Some("Missing")).unwrap();
        assert_eq!(loc.line, 10);

        assert!(symbols.location("Game.Enemy", None).is_none());
    }

    #[test]
    fn test_matches_module_checksum() {
        let symbols = sample();
        let mut module = ModuleImage::new("m");
        assert!(!symbols.matches(&module));
        module.checksum = [7u8; 32];
        assert!(symbols.matches(&module));
    }

    #[test]
    fn test_rejects_module_image() {
        let module = ModuleImage::new("m").encode();
        assert!(matches!(
            SymbolImage::decode(&module),
            Err(SymbolError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_source_file_out_of_range() {
        let mut symbols = sample();
        symbols.types[0].source_file = 4;
        assert!(matches!(
            SymbolImage::decode(&symbols.encode()),
            Err(SymbolError::SourceFileOutOfRange { index: 4, .. })
        ));
    }
}
