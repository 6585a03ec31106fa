use super::{EncodeError, HEADER_LEN, Header, Opcode, ParseError, REQUEST_MAGIC, RESPONSE_MAGIC};
use bytes::{BufMut, Bytes, BytesMut};

/// A binary protocol request or response.
///
/// The length fields in `header` describe the message as it was read. When a
/// message is encoded the key, extras and body lengths are recomputed from
/// the sections, so they never need to be kept in sync by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Message {
    /// Create an empty request for the given opcode.
    pub fn request(opcode: Opcode) -> Self {
        Self {
            header: Header {
                magic: REQUEST_MAGIC,
                opcode: opcode as u8,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A NOOP request, used as a liveness probe.
    pub fn noop() -> Self {
        Self::request(Opcode::Noop)
    }

    /// An empty response to `request` carrying `status`. The opcode and
    /// opaque are echoed back.
    pub fn response_to(request: &Message, status: u16) -> Self {
        Self {
            header: Header {
                magic: RESPONSE_MAGIC,
                opcode: request.header.opcode,
                status,
                opaque: request.header.opaque,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_opaque(mut self, opaque: u32) -> Self {
        self.header.opaque = opaque;
        self
    }

    /// Split a body that was read after `header` into extras, key and value.
    ///
    /// The length fields are trusted. If extras and key claim more bytes than
    /// the body holds, the sections are clamped to what is there.
    pub fn from_body(header: Header, body: Bytes) -> Self {
        let extras_end = (header.extras_len as usize).min(body.len());
        let key_end = (extras_end + header.key_len as usize).min(body.len());

        Self {
            header,
            extras: body.slice(..extras_end),
            key: body.slice(extras_end..key_end),
            value: body.slice(key_end..),
        }
    }

    /// Parse one complete message from the front of `data`.
    ///
    /// Returns the message and the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), ParseError> {
        let header = Header::parse(data)?;
        let total = HEADER_LEN + header.body_len as usize;
        if data.len() < total {
            return Err(ParseError::Incomplete {
                needed: total - data.len(),
            });
        }

        let body = Bytes::copy_from_slice(&data[HEADER_LEN..total]);
        Ok((Self::from_body(header, body), total))
    }

    /// Total body length: extras + key + value.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.extras.len() + self.key.len() + self.value.len()
    }

    /// Number of bytes `encode` will write.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.body_len()
    }

    /// The header as it will be written, with recomputed length fields.
    pub fn wire_header(&self) -> Result<Header, EncodeError> {
        let key_len =
            u16::try_from(self.key.len()).map_err(|_| EncodeError::KeyTooLong(self.key.len()))?;
        let extras_len = u8::try_from(self.extras.len())
            .map_err(|_| EncodeError::ExtrasTooLong(self.extras.len()))?;
        let body_len = u32::try_from(self.body_len())
            .map_err(|_| EncodeError::BodyTooLong(self.body_len()))?;

        Ok(Header {
            key_len,
            extras_len,
            body_len,
            ..self.header
        })
    }

    /// Append the message to `buf`: header, extras, key, value.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let header = self.wire_header()?;

        buf.reserve(self.encoded_len());
        header.put(buf);
        buf.put_slice(&self.extras);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}
