use super::ParseError;
use bytes::BufMut;

/// Size of the fixed binary protocol header.
pub const HEADER_LEN: usize = 24;

/// The fixed 24-byte header that starts every binary protocol message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    pub status: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl Header {
    /// Parse a header from the front of `data`.
    ///
    /// Only the length of the buffer is checked. Magic and opcode are taken
    /// as-is.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::Incomplete {
                needed: HEADER_LEN - data.len(),
            });
        }

        Ok(Self {
            magic: data[0],
            opcode: data[1],
            key_len: u16::from_be_bytes([data[2], data[3]]),
            extras_len: data[4],
            data_type: data[5],
            status: u16::from_be_bytes([data[6], data[7]]),
            body_len: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            opaque: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
            cas: u64::from_be_bytes([
                data[16], data[17], data[18], data[19], data[20], data[21], data[22], data[23],
            ]),
        })
    }

    /// Write the header in network byte order.
    pub fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.magic);
        buf.put_u8(self.opcode);
        buf.put_u16(self.key_len);
        buf.put_u8(self.extras_len);
        buf.put_u8(self.data_type);
        buf.put_u16(self.status);
        buf.put_u32(self.body_len);
        buf.put_u32(self.opaque);
        buf.put_u64(self.cas);
    }

    /// Length of the value section implied by the length fields.
    ///
    /// Saturates at zero when extras and key claim more than the body holds.
    #[inline]
    pub fn value_len(&self) -> usize {
        (self.body_len as usize)
            .saturating_sub(self.extras_len as usize)
            .saturating_sub(self.key_len as usize)
    }
}
