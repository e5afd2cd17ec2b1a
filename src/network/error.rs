use super::resources::ResourceError;

/// A structural failure while reading a value off the wire.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("read of {needed} bytes past end of buffer ({remaining} remaining)")]
    OutOfBounds { needed: usize, remaining: usize },
    #[error("varint longer than {max} bytes")]
    VarIntTooLong { max: usize },
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("unknown entity metadata type {0}")]
    UnknownMetadataType(u32),
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),
    #[error("unknown game rule type {0}")]
    UnknownGameRuleType(u32),
    #[error("unknown tag type {0}")]
    UnknownTagType(u8),
    #[error("tag tree nested deeper than {0}")]
    TooDeep(usize),
    #[error("index {index} out of range for table of {len}")]
    BadIndex { index: usize, len: usize },
    #[error("{0}")]
    Unexpected(String),
}

/// A [`WireError`] tagged with the field that was being read.
#[derive(Debug, thiserror::Error)]
#[error("{field}: {source}")]
pub struct FieldError {
    pub field: &'static str,
    #[source]
    pub source: WireError,
}

/// A failed packet decode, naming the packet and the field.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode {packet}.{field}: {source}")]
pub struct DecodeError {
    pub packet: &'static str,
    pub field: &'static str,
    #[source]
    pub source: WireError,
}

impl DecodeError {
    pub fn new(packet: &'static str, err: FieldError) -> Self {
        Self { packet, field: err.field, source: err.source }
    }
}

/// Encoding only fails on invalid internal state.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("list tag mixes element types")]
    MixedList,
    #[error("tag string of {0} bytes is too long")]
    TagStringTooLong(usize),
    #[error("enum value {0:?} not found in value table")]
    UnknownEnumValue(String),
    #[error("postfix {0:?} not found in postfix table")]
    UnknownPostfix(String),
    #[error("enum {0:?} not found in enum table")]
    UnknownEnum(String),
    #[error("{width}x{height} recipe shape holds {inputs} ingredients")]
    RecipeShape { width: i32, height: i32, inputs: usize },
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Connection-level protocol violation. The owner of the connection decides what to do with it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown packet id 0x{0:02x}")]
    UnknownPacket(u32),
    #[error("malformed packet header: {0}")]
    Header(#[source] WireError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ProtocolError {
    pub fn disconnect_reason(&self) -> String {
        format!("Protocol violation: {self}")
    }
}

/// Tags a read result with the name of the field being decoded.
pub trait FieldExt<T> {
    fn field(self, field: &'static str) -> Result<T, FieldError>;
}

impl<T> FieldExt<T> for Result<T, WireError> {
    fn field(self, field: &'static str) -> Result<T, FieldError> {
        self.map_err(|source| FieldError { field, source })
    }
}
