//! Leaf elements: EBML header fields and Matroska's scalar element bodies.
//!
//! The upstream crate this was distilled from generates these from an XML
//! schema at build time via `roxmltree`/`askama`. We don't carry that schema
//! file, so the same per-type-tag code shapes are reproduced here as
//! declarative macros and invoked once per element.

use crate::base::VInt64;
use crate::element::Element;
use crate::functional::{Buf, BufMut};
use std::ops::Deref;

/// Declares an unsigned-integer leaf element. EBML uinteger: big-endian,
/// leading zero bytes trimmed on encode, empty body decodes to `0` (or the
/// given default).
macro_rules! uint_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        uint_element!($(#[$meta])* $name, $id, 0);
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl Deref for $name {
            type Target = u64;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                if buf.is_empty() {
                    return Ok(Self($default));
                }
                if buf.len() > 8 {
                    return Err(crate::Error::UnderDecode(Self::ID));
                }
                let len = buf.len();
                let mut value = [0u8; 8];
                value[8 - len..].copy_from_slice(&buf[..len]);
                buf.advance(len);
                Ok(Self(u64::from_be_bytes(value)))
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                let bytes = self.0.to_be_bytes();
                let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
                buf.append_slice(&bytes[first_non_zero..]);
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }
    };
}

/// Declares a signed-integer leaf element: sign-extended on decode, trimmed
/// while preserving the sign bit on encode.
macro_rules! int_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        int_element!($(#[$meta])* $name, $id, 0);
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl Deref for $name {
            type Target = i64;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                if buf.is_empty() {
                    return Ok(Self($default));
                }
                if buf.len() > 8 {
                    return Err(crate::Error::UnderDecode(Self::ID));
                }
                let len = buf.len();
                let is_neg = (buf[0] & 0x80) != 0;
                let mut value = if is_neg { [0xFFu8; 8] } else { [0u8; 8] };
                value[8 - len..].copy_from_slice(&buf[..len]);
                buf.advance(len);
                Ok(Self(i64::from_be_bytes(value)))
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                let bytes = self.0.to_be_bytes();
                let is_neg = self.0 < 0;
                let mut len = 8;
                while len > 1 {
                    let leading = bytes[8 - len];
                    let next_sign_bit = bytes[8 - len + 1] & 0x80 != 0;
                    let leading_is_pure_extension = if is_neg {
                        leading == 0xFF
                    } else {
                        leading == 0x00
                    };
                    if leading_is_pure_extension && next_sign_bit == is_neg {
                        len -= 1;
                    } else {
                        break;
                    }
                }
                buf.append_slice(&bytes[8 - len..]);
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }
    };
}

/// Declares a floating-point leaf element. Wire size is 0 (default), 4, or
/// 8 bytes; encoded as `f32` when that round-trips exactly, else `f64`.
macro_rules! float_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        float_element!($(#[$meta])* $name, $id, 0.0);
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
        pub struct $name(pub f64);

        impl Deref for $name {
            type Target = f64;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                match buf.len() {
                    0 => Ok(Self($default)),
                    4 => {
                        let mut value = [0u8; 4];
                        value.copy_from_slice(&buf[..4]);
                        buf.advance(4);
                        Ok(Self(f32::from_be_bytes(value) as f64))
                    }
                    8 => {
                        let mut value = [0u8; 8];
                        value.copy_from_slice(&buf[..8]);
                        buf.advance(8);
                        Ok(Self(f64::from_be_bytes(value)))
                    }
                    _ => Err(crate::Error::UnderDecode(Self::ID)),
                }
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                fn can_represent_as_f32(value: f64) -> bool {
                    if value.is_infinite() || value.is_nan() {
                        return false;
                    }
                    if value.abs() > f32::MAX as f64
                        || (value != 0.0 && value.abs() < f32::MIN_POSITIVE as f64)
                    {
                        return false;
                    }
                    let f32_value = value as f32;
                    f32_value as f64 == value
                }

                if can_represent_as_f32(self.0) {
                    buf.append_slice(&(self.0 as f32).to_be_bytes());
                } else {
                    buf.append_slice(&self.0.to_be_bytes());
                }
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }
    };
}

/// Declares a string/UTF-8 leaf element: NUL-terminated on decode (trailing
/// padding after the first NUL is discarded), not NUL-terminated on encode
/// (the element size carries the length).
macro_rules! text_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        text_element!($(#[$meta])* $name, $id, "");
    };
    ($(#[$meta:meta])* $name:ident, $id:expr, $default:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);
            const HAS_DEFAULT_VALUE: bool = true;

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                if buf.is_empty() {
                    return Ok(Self($default.to_string()));
                }
                let first_zero = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                let result = Self(String::from_utf8_lossy(&buf[..first_zero]).to_string());
                buf.advance(buf.len());
                Ok(result)
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                buf.append_slice(self.0.as_bytes());
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default.to_string())
            }
        }
    };
}

/// Declares a binary leaf element: the body is the value, verbatim.
macro_rules! bin_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Vec<u8>);

        impl Deref for $name {
            type Target = [u8];
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                let result = Self(buf.to_vec());
                buf.advance(buf.len());
                Ok(result)
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                buf.append_slice(&self.0);
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(Vec::new())
            }
        }
    };
}

/// Declares a date leaf element: signed nanoseconds since 2001-01-01T00:00:00
/// UTC, always an 8-byte body.
macro_rules! date_element {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl Deref for $name {
            type Target = i64;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Element for $name {
            const ID: VInt64 = VInt64::from_encoded($id);

            fn decode_body(buf: &mut &[u8]) -> crate::Result<Self> {
                if buf.len() != 8 {
                    return Err(crate::Error::UnderDecode(Self::ID));
                }
                let result = i64::from_be_bytes(buf[..8].try_into().unwrap());
                buf.advance(8);
                Ok(Self(result))
            }

            fn encode_body<B: BufMut>(&self, buf: &mut B) -> crate::Result<()> {
                buf.append_slice(&self.0.to_be_bytes());
                Ok(())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(0)
            }
        }
    };
}

// --- EBML header -----------------------------------------------------------

uint_element!(
    /// The version of EBML used to encode this document.
    EbmlVersion,
    0x4286,
    1
);
uint_element!(
    /// The minimum EBML version an interpreter must support to read this document.
    EbmlReadVersion,
    0x42F7,
    1
);
uint_element!(
    /// Maximum length, in bytes, of an element ID in this document.
    EbmlMaxIdLength,
    0x42F2,
    4
);
uint_element!(
    /// Maximum length, in bytes, of an element size field in this document.
    EbmlMaxSizeLength,
    0x42F3,
    8
);
text_element!(
    /// Identifies the type of document: `matroska` or `webm`.
    DocType,
    0x4282,
    "matroska"
);
uint_element!(
    /// The version of the DocType interpreter used to create this document.
    DocTypeVersion,
    0x4287,
    1
);
uint_element!(
    /// The minimum DocType version an interpreter must support to read this document.
    DocTypeReadVersion,
    0x4285,
    1
);

// --- Segment::SeekHead -------------------------------------------------------

bin_element!(
    /// The binary ID of the target element referenced by a `Seek` entry.
    SeekId,
    0x53AB
);
uint_element!(
    /// The byte position of the target element, relative to the start of the `Segment` body.
    SeekPosition,
    0x53AC
);

// --- Segment::Info -----------------------------------------------------------

uint_element!(
    /// The number of nanoseconds per `TimestampScale` unit.
    TimestampScale,
    0x2AD7B1,
    1_000_000
);
float_element!(
    /// Duration of the segment, in `TimestampScale` units.
    Duration,
    0x4489
);
date_element!(
    /// The date/time the segment was created.
    DateUtc,
    0x4461
);
text_element!(
    /// General name of the segment.
    Title,
    0x7BA9
);
text_element!(
    /// Name of the library used to mux this segment.
    MuxingApp,
    0x4D80
);
text_element!(
    /// Name of the application or library used to create this segment.
    WritingApp,
    0x5741
);
bin_element!(
    /// A randomly generated unique ID identifying the segment.
    SegmentUuid,
    0x73A4
);

// --- Segment::Tracks::TrackEntry ---------------------------------------------

uint_element!(
    /// The track number used in `Block`/`SimpleBlock` headers.
    TrackNumber,
    0xD7
);
bin_element!(
    /// A randomly generated unique ID identifying this track.
    TrackUid,
    0x73C5
);
uint_element!(
    /// The type of track: 1 = video, 2 = audio.
    TrackType,
    0x83
);
uint_element!(
    /// Set if the track's blocks may use lacing. This crate rejects laced blocks.
    FlagLacing,
    0x9C,
    1
);
text_element!(
    /// The codec's ID string, e.g. `A_OPUS`, `V_VP8`, `V_VP9`, `V_MPEG4/ISO/AVC`.
    CodecId,
    0x86
);
bin_element!(
    /// Private codec-specific initialization data.
    CodecPrivate,
    0x63A2
);
uint_element!(
    /// Number of nanoseconds to discard from the start of decoded output.
    CodecDelay,
    0x56AA
);
uint_element!(
    /// Number of nanoseconds the codec needs to decode before the first sample is valid.
    SeekPreRoll,
    0x56BB
);
uint_element!(
    /// Minimum cache size necessary to store referenced blocks, in track blocks.
    MinCache,
    0x6DE7
);
uint_element!(
    /// Set if a track contains only keyframes.
    FlagDefault,
    0x88,
    1
);

// --- Segment::Tracks::TrackEntry::Audio --------------------------------------

float_element!(
    /// Sampling frequency, in Hz.
    SamplingFrequency,
    0xB5,
    8000.0
);
uint_element!(
    /// Numbers of channels in the track.
    Channels,
    0x9F,
    1
);
uint_element!(
    /// Bits per sample, used for PCM codecs only.
    BitDepth,
    0x6264
);

// --- Segment::Tracks::TrackEntry::Video --------------------------------------

uint_element!(
    /// Width of the encoded video frames, in pixels.
    PixelWidth,
    0xB0
);
uint_element!(
    /// Height of the encoded video frames, in pixels.
    PixelHeight,
    0xBA
);
uint_element!(
    /// Set if the video is stored with the top field first.
    FlagInterlaced,
    0x9A,
    0
);

// --- Segment::Cluster ---------------------------------------------------------

uint_element!(
    /// Absolute timestamp of the cluster, in `TimestampScale` units.
    Timestamp,
    0xE7
);
uint_element!(
    /// Byte position of this cluster, relative to the start of the `Segment`.
    Position,
    0xA7
);
uint_element!(
    /// Size of the previous cluster, in bytes. Used for backward seeking.
    PrevSize,
    0xAB
);
bin_element!(
    /// A complete frame packaged as a single unlaced block.
    SimpleBlock,
    0xA3
);
bin_element!(
    /// The block payload of a `BlockGroup`.
    Block,
    0xA1
);
uint_element!(
    /// Duration of the block, in `TimestampScale` units.
    BlockDuration,
    0x9B
);
int_element!(
    /// Relative position of a referenced block, used to mark non-keyframes.
    ReferenceBlock,
    0xFB
);
uint_element!(
    /// Cache priority of a block; 0 means the block is not referenced by any other block.
    ReferencePriority,
    0xFA
);

// --- Segment::Cues::CuePoint ---------------------------------------------------

uint_element!(
    /// Absolute timestamp of the cue point, in `TimestampScale` units.
    CueTime,
    0xB3
);
uint_element!(
    /// The track number this cue entry applies to.
    CueTrack,
    0xF7
);
uint_element!(
    /// Byte position of the cluster containing the keyframe, relative to the `Segment` start.
    CueClusterPosition,
    0xF1
);
uint_element!(
    /// Byte position of the `Block`/`SimpleBlock` within the cluster.
    CueRelativePosition,
    0xF0
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::{Decode, Encode};

    fn round_trip<T: Element + std::fmt::Debug + PartialEq>(value: &T) {
        let mut buf = Vec::new();
        value.encode(&mut buf).unwrap();
        let decoded = T::decode(&mut &buf[..]).unwrap();
        assert_eq!(&decoded, value);
    }

    #[test]
    fn uint_round_trips_and_trims_leading_zeros() {
        round_trip(&TrackNumber(1));
        round_trip(&TrackNumber(0x1234));
        let mut buf = Vec::new();
        TrackNumber(1).encode_body(&mut buf).unwrap();
        assert_eq!(buf, vec![1]);
    }

    #[test]
    fn uint_empty_body_decodes_to_default() {
        assert_eq!(EbmlVersion::decode_body(&mut &[][..]).unwrap(), EbmlVersion(1));
        assert_eq!(FlagDefault::default(), FlagDefault(1));
    }

    #[test]
    fn int_round_trips_negative_and_positive() {
        round_trip(&ReferenceBlock(-1));
        round_trip(&ReferenceBlock(1));
        round_trip(&ReferenceBlock(0));
        round_trip(&ReferenceBlock(i64::MIN));
        round_trip(&ReferenceBlock(i64::MAX));
    }

    #[test]
    fn int_encode_trims_to_minimal_width() {
        let mut buf = Vec::new();
        ReferenceBlock(-1).encode_body(&mut buf).unwrap();
        assert_eq!(buf, vec![0xFF]);
    }

    #[test]
    fn float_round_trips_via_narrowest_exact_width() {
        round_trip(&SamplingFrequency(48_000.0));
        round_trip(&SamplingFrequency(44_100.0));
        let mut buf = Vec::new();
        SamplingFrequency(48_000.0).encode_body(&mut buf).unwrap();
        assert_eq!(buf.len(), 4, "exactly representable as f32, picks the 4-byte form");
    }

    #[test]
    fn float_widens_to_f64_when_f32_would_lose_precision() {
        let value = 1.0 + 1e-10;
        let mut buf = Vec::new();
        Duration(value).encode_body(&mut buf).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(Duration::decode_body(&mut &buf[..]).unwrap(), Duration(value));
    }

    #[test]
    fn float_empty_body_decodes_to_default() {
        assert_eq!(SamplingFrequency::decode_body(&mut &[][..]).unwrap(), SamplingFrequency(8000.0));
    }

    #[test]
    fn text_strips_nul_terminator_on_decode_but_not_on_encode() {
        let mut buf = Vec::new();
        CodecId("A_OPUS".to_string()).encode_body(&mut buf).unwrap();
        assert_eq!(buf, b"A_OPUS");

        let padded = b"A_OPUS\0\0\0";
        let decoded = CodecId::decode_body(&mut &padded[..]).unwrap();
        assert_eq!(decoded, CodecId("A_OPUS".to_string()));
    }

    #[test]
    fn text_empty_body_decodes_to_default() {
        assert_eq!(DocType::decode_body(&mut &[][..]).unwrap(), DocType("matroska".to_string()));
    }

    #[test]
    fn binary_round_trips_verbatim() {
        round_trip(&CodecPrivate(vec![1, 2, 3, 4]));
        round_trip(&SeekId(vec![]));
    }

    #[test]
    fn date_round_trips_full_i64_range() {
        round_trip(&DateUtc(0));
        round_trip(&DateUtc(-1));
        round_trip(&DateUtc(i64::MIN));
        round_trip(&DateUtc(i64::MAX));
    }

    #[test]
    fn date_rejects_non_eight_byte_body() {
        assert!(DateUtc::decode_body(&mut &[0u8; 4][..]).is_err());
    }
}
