use crate::base::VInt64;

/// Error types for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid variable-length integer encoding, incidicates a vint longer than 8 bytes.
    #[error("Invalid variable-length integer encoding, 8 leading zeros found...")]
    InvalidVInt,

    /// Attempted to read past the end of the buffer.
    #[error("Attempted to read past the end of the buffer")]
    OutOfBounds,

    /// Attempted to read past the end of the buffer during element body decoding.
    #[error("Element body over decode, ID: {0}")]
    OverDecode(VInt64),

    /// Not all bytes were consumed in a element body
    #[error("Short read: not all bytes were consumed")]
    ShortRead,

    /// Not all bytes were consumed in a element body during element body decoding.
    #[error("Element body under decode, ID: {0}")]
    UnderDecode(VInt64),

    /// Missing element.
    #[error("Missing element, ID: {0}")]
    MissingElement(VInt64),

    /// Duplicate element in a master element.
    #[error("Duplicate element {id} in master element {parent}")]
    DuplicateElement {
        /// The duplicate element ID.
        id: VInt64,
        /// The parent master element ID.
        parent: VInt64,
    },

    /// Element body size is unknown.
    #[error("Element body size is unknown, ID: {0}")]
    ElementBodySizeUnknown(VInt64),

    /// EBML `DocType` was neither "matroska" nor "webm".
    #[error("unsupported EBML DocType: {0:?}")]
    InvalidDocType(String),

    /// A Tracks entry announced a codec this crate does not implement (e.g. Vorbis).
    #[error("unsupported codec: {0:?}")]
    UnsupportedCodec(String),

    /// A Block/SimpleBlock used a non-zero lacing field.
    #[error("laced frames are not supported")]
    LacedFrames,

    /// An Opus track announced more than 2 channels.
    #[error("unsupported Opus channel count: {0}")]
    ChannelCountUnsupported(u8),

    /// A muxer input pad was added after streaming had already begun.
    #[error("pad added after playback started")]
    PadAddedInPlayback,

    /// None of VP9's four uncompressed-header layouts matched while testing for a keyframe.
    #[error("malformed VP9 uncompressed header")]
    MalformedVP9Header,

    /// The muxer's output sink does not support the seek-and-rewrite contract
    /// required to patch the header at finalization.
    #[error("output sink does not support seek-and-rewrite")]
    SinkNotSeekable,
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
