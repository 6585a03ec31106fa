use protocol_memcache::binary::EncodeError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no servers available")]
    NoServers,
    #[error("unknown shard: {0}")]
    NotFound(String),
    #[error("connection timeout")]
    Timeout,
    #[error("invalid backend address: {0}")]
    InvalidAddress(String),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the peer went away between messages or mid-message.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
