//! The track/block data model shared by the muxer and demuxer.

use crate::codecs::Codec;

/// The small positive integer used on the wire to identify a track within a file.
///
/// Assigned in link order for the muxer (first pad added = 1), or read verbatim from
/// `TrackNumber` for the demuxer. Named `TrackId` rather than `TrackNumber` to avoid colliding
/// with the [`TrackNumber`](crate::leaf::TrackNumber) wire element of the same name once both
/// are glob-reexported through [`prelude`](crate::prelude).
pub type TrackId = u64;

/// Codec-specific track metadata carried on `TrackEntry`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackMetadata {
    /// Opus audio metadata.
    Opus {
        /// Number of channels, 1 or 2.
        channels: u8,
    },
    /// VP8 video metadata.
    Vp8 {
        /// Pixel width, if known.
        width: Option<u64>,
        /// Pixel height, if known.
        height: Option<u64>,
    },
    /// VP9 video metadata.
    Vp9 {
        /// Pixel width, if known.
        width: Option<u64>,
        /// Pixel height, if known.
        height: Option<u64>,
    },
    /// H.264/AVC video metadata.
    H264 {
        /// The AVCDecoderConfigurationRecord, carried verbatim as `CodecPrivate`.
        avc_config: Vec<u8>,
        /// Pixel width, if known.
        width: Option<u64>,
        /// Pixel height, if known.
        height: Option<u64>,
    },
}

impl TrackMetadata {
    /// The codec this metadata belongs to.
    pub fn codec(&self) -> Codec {
        match self {
            TrackMetadata::Opus { .. } => Codec::Opus,
            TrackMetadata::Vp8 { .. } => Codec::Vp8,
            TrackMetadata::Vp9 { .. } => Codec::Vp9,
            TrackMetadata::H264 { .. } => Codec::H264,
        }
    }
}

/// A track's identity and metadata, stable for the lifetime of a muxer/demuxer session.
///
/// Invariants: the track number is unique within a file and assigned in link order; a track
/// never changes codec after its first frame; exactly one stream-format announcement is
/// accepted per pad (enforced by the muxer with [`Error::PadAddedInPlayback`](crate::Error)).
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// The wire track number.
    pub number: TrackId,
    /// A 64-bit nonzero unique ID, stable across remuxes when preserved from the source file.
    pub uid: u64,
    /// Codec-specific metadata.
    pub metadata: TrackMetadata,
}

impl Track {
    /// This track's codec.
    pub fn codec(&self) -> Codec {
        self.metadata.codec()
    }

    /// Whether this is a video track.
    pub fn is_video(&self) -> bool {
        self.codec().is_video()
    }
}

/// A single coded access unit belonging to a track, in the unit the producer supplied it (pts
/// or dts — fixed per track at the first buffer).
#[derive(Debug, Clone)]
pub struct Block {
    /// The absolute timestamp, in milliseconds, measured from the track's first observed
    /// timestamp.
    pub timestamp_ms: i64,
    /// The coded frame bytes.
    pub payload: Vec<u8>,
    /// The track this block belongs to.
    pub track_number: TrackId,
    /// The track's codec, cached for convenient keyframe testing.
    pub codec: Codec,
}

/// Interpret a `TrackUID` binary element's raw bytes as a big-endian unsigned integer, the same
/// way EBML's uinteger type is decoded. `TrackUID` is modeled as a binary element on the wire
/// (see [`crate::leaf::TrackUid`]) so round-tripped files preserve whatever byte width the
/// original muxer chose; this just gives callers the numeric value.
pub(crate) fn uid_from_bytes(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[8 - n..].copy_from_slice(&bytes[bytes.len() - n..]);
    u64::from_be_bytes(buf)
}

/// The inverse of [`uid_from_bytes`]: the minimal big-endian byte representation of `uid`, with
/// leading zero bytes stripped (mirroring how EBML uinteger elements are conventionally encoded).
pub(crate) fn uid_to_bytes(uid: u64) -> Vec<u8> {
    let full = uid.to_be_bytes();
    let first_nonzero = full.iter().position(|&b| b != 0).unwrap_or(7);
    full[first_nonzero..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_bytes_round_trip() {
        for uid in [0u64, 1, 0xdead_beef, u64::MAX] {
            assert_eq!(uid_from_bytes(&uid_to_bytes(uid)), uid);
        }
    }

    #[test]
    fn uid_from_bytes_pads_short_input() {
        assert_eq!(uid_from_bytes(&[0x01]), 1);
        assert_eq!(uid_from_bytes(&[]), 0);
    }
}
