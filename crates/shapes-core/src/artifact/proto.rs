//! Minimal protobuf wire-format reader.
//!
//! Only what the CoreML model spec needs: varints, length-delimited fields,
//! packed repeated varints and skipping of everything else.

use crate::error::{DiscoveryError, Result};

/// Wire types used by the CoreML spec.
pub(crate) mod wire {
    pub const VARINT: u32 = 0;
    pub const FIXED64: u32 = 1;
    pub const LEN: u32 = 2;
    pub const FIXED32: u32 = 5;
}

fn malformed(message: impl Into<String>) -> DiscoveryError {
    DiscoveryError::Protobuf {
        message: message.into(),
    }
}

pub(crate) struct ProtobufReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProtobufReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Read a field tag as `(field_number, wire_type)`.
    pub fn read_tag(&mut self) -> Result<(u32, u32)> {
        let varint = self.read_varint()?;
        let field_num = (varint >> 3) as u32;
        let wire_type = (varint & 0x7) as u32;
        if field_num == 0 {
            return Err(malformed("field number 0"));
        }
        Ok((field_num, wire_type))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| malformed("unexpected end of data"))?;
            self.pos += 1;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 64 {
                return Err(malformed("varint overflow"));
            }
        }
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                malformed(format!(
                    "length-delimited field extends past data ({} + {} > {})",
                    self.pos,
                    len,
                    self.data.len()
                ))
            })?;
        let result = &self.data[self.pos..end];
        self.pos = end;
        Ok(result)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| malformed("invalid UTF-8 in string"))
    }

    /// Read a repeated varint field, accepting both packed and unpacked encodings.
    pub fn read_repeated_varint(&mut self, wire_type: u32, out: &mut Vec<u64>) -> Result<()> {
        match wire_type {
            wire::VARINT => out.push(self.read_varint()?),
            wire::LEN => {
                let mut packed = ProtobufReader::new(self.read_bytes()?);
                while packed.has_more() {
                    out.push(packed.read_varint()?);
                }
            }
            other => {
                return Err(malformed(format!(
                    "wire type {other} for repeated varint field"
                )))
            }
        }
        Ok(())
    }

    /// Skip over the value of a field with the given wire type.
    pub fn skip_field(&mut self, wire_type: u32) -> Result<()> {
        match wire_type {
            wire::VARINT => {
                self.read_varint()?;
            }
            wire::FIXED64 => self.skip(8)?,
            wire::LEN => {
                self.read_bytes()?;
            }
            wire::FIXED32 => self.skip(4)?,
            other => return Err(malformed(format!("unknown wire type {other}"))),
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(malformed("unexpected end skipping data"));
        }
        self.pos += n;
        Ok(())
    }
}
