//! Element/byte framing helpers used by the muxer: `SimpleBlock` payload construction, Cluster
//! accumulation, and the `Void`-padding tricks that keep fixed-size regions (the `SeekHead`
//! budget, the header-length-stabilizing padding in `Info`) exactly the size the muxer reserved
//! for them up front.
//!
//! Element framing itself (the ID + size VINT wrapper around a body) is not reimplemented here:
//! it's the blanket [`Encode`] impl every [`Element`] already gets from [`element`](crate::element).
//! This module only builds the bodies that need bespoke assembly.

use crate::base::VInt64;
use crate::element::Element;
use crate::functional::Encode;
use crate::leaf::{CueClusterPosition, CueTime, CueTrack, SeekId, SeekPosition, SimpleBlock, Timestamp};
use crate::master::{Cluster, CuePoint, CueTrackPositions, Seek, SeekHead};
use crate::supplement::Void;
use crate::track::TrackId;

/// Encode `value` into a fresh buffer and return its length in bytes.
///
/// A convenience for the reservation arithmetic the muxer does around fixed-budget header
/// regions: it needs to know how many bytes an element *will* take before committing to writing
/// it at a particular offset.
pub fn encoded_len<T: Encode>(value: &T) -> crate::Result<u64> {
    let mut buf = Vec::new();
    value.encode(&mut buf)?;
    Ok(buf.len() as u64)
}

/// Build a `Void` element whose total encoded length (ID + size VINT + payload) is exactly
/// `total_len` bytes.
///
/// EBML's size VINT is self-describing but not self-sizing: the same payload length can often be
/// encoded in more than one byte width, so naively picking `payload = total_len - id_len - 1`
/// undershoots once the size VINT itself needs to grow past one byte. This searches the (small,
/// bounded) space of size-VINT widths for the one that is self-consistent with the payload length
/// it implies.
pub fn void_of_total_len(total_len: u64) -> crate::Result<Void> {
    let id_len = encoded_len(&Void::ID)?;
    for size_vint_len in 1..=8u64 {
        if total_len < id_len + size_vint_len {
            continue;
        }
        let payload = total_len - id_len - size_vint_len;
        if VInt64::encode_size(payload) as u64 == size_vint_len {
            return Ok(Void { size: payload });
        }
    }
    Err(crate::Error::OutOfBounds)
}

/// Given a master element's ID length and its body length before any trailing `Void`, find the
/// `Void` (if any) to append so the element's total encoded length lands exactly on
/// `target_total_len`, searching over the possible widths of the element's own size VINT.
///
/// Shared by [`seek_head_with_budget`] and the muxer's `Info` header-stabilizing padding: both
/// need to pad a master element to an externally-chosen total length without knowing in advance
/// how that padding changes the element's own size VINT width.
pub fn void_to_reach_total_len(
    id_len: u64,
    body_len_without_void: u64,
    target_total_len: u64,
) -> crate::Result<Option<Void>> {
    for size_vint_len in 1..=8u64 {
        if target_total_len < id_len + size_vint_len {
            continue;
        }
        let body_total = target_total_len - id_len - size_vint_len;
        if VInt64::encode_size(body_total) as u64 != size_vint_len || body_total < body_len_without_void
        {
            continue;
        }
        let void_total = body_total - body_len_without_void;
        if void_total == 0 {
            return Ok(None);
        }
        if let Ok(void) = void_of_total_len(void_total) {
            return Ok(Some(void));
        }
    }
    Err(crate::Error::OutOfBounds)
}

/// Build a `Seek` entry pointing `id` at `position` (a byte offset relative to the start of the
/// Segment body).
pub fn seek_entry(id: VInt64, position: u64) -> crate::Result<Seek> {
    let mut id_bytes = Vec::new();
    id.encode(&mut id_bytes)?;
    Ok(Seek {
        crc32: None,
        void: None,
        seek_id: SeekId(id_bytes),
        seek_position: SeekPosition(position),
    })
}

/// Build a `SeekHead` whose total encoded length (ID + size VINT + body, including its own
/// trailing `Void`) is exactly `budget` bytes.
///
/// Returns `Err(OutOfBounds)` if `budget` is too small to hold `entries` at all; the muxer picks
/// a budget generous enough in practice (160 bytes comfortably covers three `Seek` entries).
pub fn seek_head_with_budget(entries: Vec<Seek>, budget: u64) -> crate::Result<SeekHead> {
    let id_len = encoded_len(&SeekHead::ID)?;
    let base = SeekHead {
        crc32: None,
        void: None,
        seek: entries,
    };
    let mut seeks_body = Vec::new();
    base.encode_body(&mut seeks_body)?;
    let seeks_len = seeks_body.len() as u64;

    for outer_size_len in 1..=8u64 {
        if budget < id_len + outer_size_len {
            continue;
        }
        let body_total = budget - id_len - outer_size_len;
        if VInt64::encode_size(body_total) as u64 != outer_size_len || body_total < seeks_len {
            continue;
        }
        let void_total = body_total - seeks_len;
        if void_total == 0 {
            return Ok(SeekHead { void: None, ..base });
        }
        if let Ok(void) = void_of_total_len(void_total) {
            return Ok(SeekHead {
                void: Some(void),
                ..base
            });
        }
    }
    Err(crate::Error::OutOfBounds)
}

/// Build a `SimpleBlock` wrapping a single unlaced frame.
///
/// Wire layout: track number as a VINT, a big-endian `i16` timestamp relative to the enclosing
/// Cluster, a one-byte flags field (only the keyframe bit, the high bit, is ever set — this
/// crate never emits laced or invisible/discardable blocks), then the frame bytes verbatim.
pub fn simple_block(
    track_number: TrackId,
    relative_timestamp_ms: i64,
    keyframe: bool,
    frame: &[u8],
) -> crate::Result<SimpleBlock> {
    let mut body = Vec::new();
    VInt64::new(track_number).encode(&mut body)?;
    (relative_timestamp_ms as i16).encode(&mut body)?;
    let flags: u8 = if keyframe { 0x80 } else { 0x00 };
    flags.encode(&mut body)?;
    body.extend_from_slice(frame);
    Ok(SimpleBlock(body))
}

/// Build a `CuePoint` indexing a single track at a single cluster position.
pub fn cue_point(time_ms: i64, track_number: TrackId, cluster_position: u64) -> CuePoint {
    CuePoint {
        crc32: None,
        void: None,
        cue_time: CueTime(time_ms as u64),
        cue_track_positions: vec![CueTrackPositions {
            crc32: None,
            void: None,
            cue_track: CueTrack(track_number),
            cue_cluster_position: CueClusterPosition(cluster_position),
            cue_relative_position: None,
        }],
    }
}

/// Accumulates blocks for a single in-progress Cluster.
///
/// The muxer keeps exactly one of these open at a time; its [`byte_size`](Self::byte_size) is
/// consulted against the 5 MiB cluster-size trigger before each push, which is what bounds the
/// muxer's memory use to roughly one Cluster plus one lookahead block per track.
pub struct ClusterBuilder {
    cluster_time: i64,
    blocks: Vec<SimpleBlock>,
    byte_size: u64,
}

impl ClusterBuilder {
    /// Start a new, empty Cluster at absolute timestamp `cluster_time` (milliseconds).
    pub fn new(cluster_time: i64) -> Self {
        Self {
            cluster_time,
            blocks: Vec::new(),
            byte_size: 0,
        }
    }

    /// The cluster's absolute start timestamp, in milliseconds.
    pub fn cluster_time(&self) -> i64 {
        self.cluster_time
    }

    /// The accumulated encoded byte size of all blocks pushed so far (an approximation of the
    /// final Cluster's size, short by the Timestamp element and a few bytes of framing).
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Whether any blocks have been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a block at `absolute_timestamp_ms`.
    ///
    /// Returns `true` if the block's timestamp, relative to this cluster, overflows the signed
    /// 16-bit range a SimpleBlock can carry. The block is still written — the low 16 bits of the
    /// relative timestamp, which will not round-trip correctly — callers should treat `true` as a
    /// non-fatal warning (see [`crate::mux::Muxer`]'s cluster-boundary rules, which are supposed
    /// to always start a new cluster before this can happen).
    pub fn push_block(
        &mut self,
        track_number: TrackId,
        absolute_timestamp_ms: i64,
        keyframe: bool,
        frame: &[u8],
    ) -> crate::Result<bool> {
        let relative = absolute_timestamp_ms - self.cluster_time;
        let overflow = !(i16::MIN as i64..=i16::MAX as i64).contains(&relative);
        let block = simple_block(track_number, relative, keyframe, frame)?;
        self.byte_size += encoded_len(&block)?;
        self.blocks.push(block);
        Ok(overflow)
    }

    /// Consume the builder, producing the `Cluster` element ready for encoding.
    pub fn finish(self) -> Cluster {
        Cluster {
            crc32: None,
            void: None,
            timestamp: Timestamp(self.cluster_time as u64),
            position: None,
            prev_size: None,
            simple_block: self.blocks,
            block_group: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_of_total_len_round_trips_across_widths() {
        for total in [2u64, 3, 10, 127, 128, 129, 200, 16384, 20000] {
            let void = void_of_total_len(total).unwrap();
            assert_eq!(encoded_len(&void).unwrap(), total, "total_len={total}");
        }
    }

    #[test]
    fn void_of_total_len_rejects_too_small() {
        assert!(void_of_total_len(0).is_err());
        assert!(void_of_total_len(1).is_err());
    }

    #[test]
    fn seek_head_hits_exact_budget() {
        let entries = vec![
            seek_entry(VInt64::from_encoded(0x1549A966), 200).unwrap(),
            seek_entry(VInt64::from_encoded(0x1654AE6B), 400).unwrap(),
            seek_entry(VInt64::from_encoded(0x1C53BB6B), 900_000).unwrap(),
        ];
        let seek_head = seek_head_with_budget(entries, 160).unwrap();
        assert_eq!(encoded_len(&seek_head).unwrap(), 160);
    }

    #[test]
    fn seek_head_budget_too_small_errors() {
        let entries = vec![seek_entry(VInt64::from_encoded(0x1549A966), 0).unwrap()];
        assert!(seek_head_with_budget(entries, 4).is_err());
    }

    #[test]
    fn simple_block_layout() {
        let block = simple_block(1, -5, true, &[0xAA, 0xBB]).unwrap();
        assert_eq!(&block.0[..], &[0x81, 0xFF, 0xFB, 0x80, 0xAA, 0xBB]);
    }

    #[test]
    fn cluster_builder_tracks_byte_size_and_detects_overflow() {
        let mut builder = ClusterBuilder::new(0);
        assert!(builder.is_empty());
        let overflow = builder.push_block(1, 0, true, &[0x01]).unwrap();
        assert!(!overflow);
        assert!(!builder.is_empty());
        assert!(builder.byte_size() > 0);

        let overflow = builder.push_block(1, 40_000, false, &[0x02]).unwrap();
        assert!(overflow);
    }

    #[test]
    fn cluster_builder_finish_preserves_blocks() {
        let mut builder = ClusterBuilder::new(1000);
        builder.push_block(2, 1010, true, b"frame").unwrap();
        let cluster = builder.finish();
        assert_eq!(*cluster.timestamp, 1000);
        assert_eq!(cluster.simple_block.len(), 1);
    }
}
