//! Hot-fix module image format
//!
//! Layout:
//! - Header: magic (4 bytes) + version (u32) + flags (u32) + crc32 (u32) + SHA-256 (32 bytes)
//! - Module name
//! - Type table
//! - Native binding table (present when `HAS_NATIVE_BINDINGS` is set)
//!
//! Both checksums cover everything after the 48-byte header.

use super::encoder::{DecodeError, ImageReader, ImageWriter};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Magic number for hot-fix module images: "HFXM"
pub const MAGIC: [u8; 4] = *b"HFXM";

/// Current image version
pub const VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 48;

/// Module encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected HFXM, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// CRC32 mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Stored checksum value
        expected: u32,
        /// Computed checksum value
        actual: u32,
    },

    /// SHA-256 mismatch (CRC collided but content differs)
    #[error("Content digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Stored digest, hex encoded
        expected: String,
        /// Computed digest, hex encoded
        actual: String,
    },

    /// Bytes left over after the last table
    #[error("{0} trailing bytes after module payload")]
    TrailingBytes(usize),
}

/// Module flags
pub mod flags {
    /// Module carries a native binding table
    pub const HAS_NATIVE_BINDINGS: u32 = 1 << 0;
}

/// Type kind flags
pub mod type_flags {
    /// Reference type that can be instantiated or derived from
    pub const CLASS: u8 = 1 << 0;
    /// Cannot be instantiated directly
    pub const ABSTRACT: u8 = 1 << 1;
    /// Interface declaration
    pub const INTERFACE: u8 = 1 << 2;
    /// Value type
    pub const VALUE_TYPE: u8 = 1 << 3;
}

/// Method flags
pub mod method_flags {
    /// Static method (no receiver)
    pub const STATIC: u8 = 1 << 0;
}

/// Type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Fully-qualified name
    pub name: String,
    /// Kind flags (see [`type_flags`])
    pub flags: u8,
    /// Direct parent type ID (None for root types)
    pub parent_id: Option<u32>,
    /// Method definitions
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// Concrete class
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: type_flags::CLASS,
            parent_id: None,
            methods: Vec::new(),
        }
    }

    /// Abstract class
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self {
            flags: type_flags::CLASS | type_flags::ABSTRACT,
            ..Self::class(name)
        }
    }

    /// Interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            flags: type_flags::INTERFACE | type_flags::ABSTRACT,
            ..Self::class(name)
        }
    }

    /// Value type
    pub fn value_type(name: impl Into<String>) -> Self {
        Self {
            flags: type_flags::VALUE_TYPE,
            ..Self::class(name)
        }
    }

    /// Set the direct parent
    pub fn extends(mut self, parent_id: u32) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Append a method
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Whether the class flag is set
    pub fn is_class(&self) -> bool {
        (self.flags & type_flags::CLASS) != 0
    }

    /// Whether the abstract flag is set
    pub fn is_abstract(&self) -> bool {
        (self.flags & type_flags::ABSTRACT) != 0
    }

    fn encode(&self, writer: &mut ImageWriter) {
        writer.emit_string(&self.name);
        writer.emit_u8(self.flags);
        writer.emit_index(self.parent_id);

        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(writer);
        }
    }

    fn decode(reader: &mut ImageReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let flags = reader.read_u8()?;
        let parent_id = reader.read_index()?;

        let method_count = reader.read_len()?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(MethodDef::decode(reader)?);
        }

        Ok(Self {
            name,
            flags,
            parent_id,
            methods,
        })
    }
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Number of parameters (receiver excluded)
    pub param_count: u32,
    /// Method flags (see [`method_flags`])
    pub flags: u8,
    /// Index into the module's native binding table
    pub native_id: Option<u32>,
}

impl MethodDef {
    /// Instance method without a bound body
    pub fn new(name: impl Into<String>, param_count: u32) -> Self {
        Self {
            name: name.into(),
            param_count,
            flags: 0,
            native_id: None,
        }
    }

    /// Static method without a bound body
    pub fn new_static(name: impl Into<String>, param_count: u32) -> Self {
        Self {
            flags: method_flags::STATIC,
            ..Self::new(name, param_count)
        }
    }

    /// Bind the body to a native binding slot
    pub fn bound_to(mut self, native_id: u32) -> Self {
        self.native_id = Some(native_id);
        self
    }

    /// Whether this is a static method
    pub fn is_static(&self) -> bool {
        (self.flags & method_flags::STATIC) != 0
    }

    fn encode(&self, writer: &mut ImageWriter) {
        writer.emit_string(&self.name);
        writer.emit_u32(self.param_count);
        writer.emit_u8(self.flags);
        writer.emit_index(self.native_id);
    }

    fn decode(reader: &mut ImageReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let param_count = reader.read_u32()?;
        let flags = reader.read_u8()?;
        let native_id = reader.read_index()?;
        Ok(Self {
            name,
            param_count,
            flags,
            native_id,
        })
    }
}

/// A hot-fix module image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImage {
    /// Module name
    pub name: String,
    /// Module flags
    pub flags: u32,
    /// Type table, indexed by type ID
    pub types: Vec<TypeDef>,
    /// Native binding names, indexed by `MethodDef::native_id`
    pub native_bindings: Vec<String>,
    /// SHA-256 of the payload (filled in by `decode`)
    pub checksum: [u8; 32],
}

impl ModuleImage {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: 0,
            types: Vec::new(),
            native_bindings: Vec::new(),
            checksum: [0; 32],
        }
    }

    /// Append a type and return its ID
    pub fn add_type(&mut self, def: TypeDef) -> u32 {
        self.types.push(def);
        (self.types.len() - 1) as u32
    }

    /// Intern a native binding name and return its slot
    pub fn add_native(&mut self, name: &str) -> u32 {
        self.flags |= flags::HAS_NATIVE_BINDINGS;
        if let Some(idx) = self.native_bindings.iter().position(|n| n == name) {
            return idx as u32;
        }
        self.native_bindings.push(name.to_string());
        (self.native_bindings.len() - 1) as u32
    }

    /// Look up a type ID by fully-qualified name
    pub fn find_type(&self, name: &str) -> Option<u32> {
        self.types.iter().position(|t| t.name == name).map(|i| i as u32)
    }

    /// Checksum as lowercase hex
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }

    /// Encode the module to binary
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ImageWriter::new();

        writer.emit_bytes(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(self.flags);
        let crc32_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for CRC32
        let sha256_offset = writer.offset();
        writer.emit_bytes(&[0u8; 32]); // Placeholder for SHA-256

        writer.emit_string(&self.name);

        writer.emit_u32(self.types.len() as u32);
        for def in &self.types {
            def.encode(&mut writer);
        }

        if (self.flags & flags::HAS_NATIVE_BINDINGS) != 0 {
            writer.emit_u32(self.native_bindings.len() as u32);
            for name in &self.native_bindings {
                writer.emit_string(name);
            }
        }

        let payload = &writer.buffer[HEADER_SIZE..];
        let crc32 = crc32fast::hash(payload);
        let digest: [u8; 32] = Sha256::digest(payload).into();

        writer.patch_u32(crc32_offset, crc32);
        writer.buffer[sha256_offset..sha256_offset + 32].copy_from_slice(&digest);

        writer.into_bytes()
    }

    /// Decode a module from binary
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = ImageReader::new(data);

        let magic: [u8; 4] = reader.read_array()?;
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let flags = reader.read_u32()?;
        let stored_crc32 = reader.read_u32()?;
        let checksum: [u8; 32] = reader.read_array()?;

        let payload = &data[HEADER_SIZE..];

        let calculated_crc32 = crc32fast::hash(payload);
        if stored_crc32 != calculated_crc32 {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_crc32,
                actual: calculated_crc32,
            });
        }

        let calculated: [u8; 32] = Sha256::digest(payload).into();
        if checksum != calculated {
            return Err(ModuleError::DigestMismatch {
                expected: hex::encode(checksum),
                actual: hex::encode(calculated),
            });
        }

        let name = reader.read_string()?;

        let type_count = reader.read_len()?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(TypeDef::decode(&mut reader)?);
        }

        let native_bindings = if (flags & flags::HAS_NATIVE_BINDINGS) != 0 {
            let count = reader.read_len()?;
            let mut names = Vec::with_capacity(count);
            for _ in 0..count {
                names.push(reader.read_string()?);
            }
            names
        } else {
            Vec::new()
        };

        if reader.remaining() > 0 {
            return Err(ModuleError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            name,
            flags,
            types,
            native_bindings,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> ModuleImage {
        let mut module = ModuleImage::new("gameplay");
        let log = module.add_native("host.log");
        let base = module.add_type(TypeDef::abstract_class("Hotfix.Core.Behaviour"));
        module.add_type(
            TypeDef::class("Game.Player")
                .extends(base)
                .with_method(MethodDef::new("Update", 0).bound_to(log)),
        );
        module
    }

    #[test]
    fn test_encode_decode_preserves_tables() {
        let module = sample_module();
        let bytes = module.encode();
        assert_eq!(&bytes[0..4], b"HFXM");

        let decoded = ModuleImage::decode(&bytes).unwrap();
        assert_eq!(decoded.name, "gameplay");
        assert_eq!(decoded.types, module.types);
        assert_eq!(decoded.native_bindings, vec!["host.log".to_string()]);
        assert_eq!(decoded.find_type("Game.Player"), Some(1));
        assert_ne!(decoded.checksum, [0u8; 32]);
    }

    #[test]
    fn test_add_native_interns_names() {
        let mut module = ModuleImage::new("m");
        assert_eq!(module.add_native("a"), 0);
        assert_eq!(module.add_native("b"), 1);
        assert_eq!(module.add_native("a"), 0);
        assert_eq!(module.native_bindings.len(), 2);
    }

    #[test]
    fn test_module_without_natives_omits_table() {
        let mut module = ModuleImage::new("plain");
        module.add_type(TypeDef::class("A"));
        let decoded = ModuleImage::decode(&module.encode()).unwrap();
        assert_eq!(decoded.flags & flags::HAS_NATIVE_BINDINGS, 0);
        assert!(decoded.native_bindings.is_empty());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample_module().encode();
        bytes[0] = b'X';
        assert!(matches!(
            ModuleImage::decode(&bytes),
            Err(ModuleError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = sample_module().encode();
        bytes[4] = 9;
        assert_eq!(
            ModuleImage::decode(&bytes),
            Err(ModuleError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut bytes = sample_module().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        assert!(matches!(
            ModuleImage::decode(&bytes),
            Err(ModuleError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample_module().encode();
        assert!(matches!(
            ModuleImage::decode(&bytes[..10]),
            Err(ModuleError::DecodeError(_))
        ));
    }
}
