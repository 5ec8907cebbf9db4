//! Little-endian binary writer/reader shared by the module and symbol formats.

use thiserror::Error;

/// Errors produced while reading an image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Ran past the end of the input
    #[error("Unexpected end of input at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Read position when the error occurred
        offset: usize,
        /// Bytes requested
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A string field was not valid UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// A length prefix is larger than the remaining input
    #[error("Length prefix {len} at offset {offset} exceeds remaining input")]
    LengthOverflow {
        /// Offset of the length prefix
        offset: usize,
        /// Declared length
        len: usize,
    },
}

/// Append-only image writer
#[derive(Debug, Default)]
pub struct ImageWriter {
    /// Encoded bytes
    pub buffer: Vec<u8>,
}

impl ImageWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Current write offset
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Write a single byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write a little-endian u32
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write raw bytes without a length prefix
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Write an optional index, using `u32::MAX` for `None`
    pub fn emit_index(&mut self, value: Option<u32>) {
        self.emit_u32(value.unwrap_or(NO_INDEX));
    }

    /// Overwrite a previously emitted u32
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Finish writing
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Sentinel for an absent index
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

/// Cursor over an encoded image
#[derive(Debug)]
pub struct ImageReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ImageReader<'a> {
    /// Start reading at offset zero
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        Ok(self.take(len)?.to_vec())
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let start = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Read an optional index written by [`ImageWriter::emit_index`]
    pub fn read_index(&mut self) -> Result<Option<u32>, DecodeError> {
        let raw = self.read_u32()?;
        Ok(if raw == NO_INDEX { None } else { Some(raw) })
    }

    /// Read a u32 count/length and check it against the remaining input.
    ///
    /// Every counted element occupies at least one byte, so a count larger
    /// than the remaining input is always corrupt.
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let len = self.read_u32()? as usize;
        if len > self.remaining() {
            return Err(DecodeError::LengthOverflow { offset, len });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_index_fields() {
        let mut writer = ImageWriter::new();
        writer.emit_string("Hotfix.Core.Entry");
        writer.emit_index(None);
        writer.emit_index(Some(3));
        let bytes = writer.into_bytes();

        let mut reader = ImageReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "Hotfix.Core.Entry");
        assert_eq!(reader.read_index().unwrap(), None);
        assert_eq!(reader.read_index().unwrap(), Some(3));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = ImageWriter::new();
        writer.emit_u32(0);
        writer.emit_u8(7);
        writer.patch_u32(0, 0xDEADBEEF);
        let bytes = writer.into_bytes();

        let mut reader = ImageReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = ImageReader::new(&[1, 2]);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { needed: 4, available: 2, .. }));
    }

    #[test]
    fn test_oversized_length_prefix() {
        let mut writer = ImageWriter::new();
        writer.emit_u32(1_000_000);
        writer.emit_bytes(b"abc");
        let bytes = writer.into_bytes();

        let mut reader = ImageReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(DecodeError::LengthOverflow { len: 1_000_000, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = ImageWriter::new();
        writer.emit_u32(2);
        writer.emit_bytes(&[0xFF, 0xFE]);
        let bytes = writer.into_bytes();

        let mut reader = ImageReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(DecodeError::InvalidUtf8(4)));
    }
}
