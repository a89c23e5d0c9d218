//! The demuxing state machine: header parsing, track linking, and backpressure-aware per-pad
//! frame delivery with FIFO cache reclassification.
//!
//! Block decoding itself is not reimplemented here: each SimpleBlock/BlockGroup the parser
//! yields is wrapped in a synthetic single-block [`Cluster`] and handed to
//! [`Cluster::frames`](crate::master::Cluster::frames), the same path the whole-file decode
//! path would use.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::Error;
use crate::codecs::Codec;
use crate::frame::ClusterBlock;
use crate::iface::Demand;
use crate::leaf::Timestamp;
use crate::master::{Cluster, TrackEntry};
use crate::parser::{ElementParser, ParsedElement};
use crate::track::{Track, TrackId, TrackMetadata, uid_from_bytes};

/// The demuxer's three phases, in the order a well-formed file moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    /// Feeding input, discarding everything except `TimestampScale` and `Tracks`.
    ReadingHeader,
    /// `Tracks` has been parsed and announced; decoded blocks accumulate in the cache until
    /// every announced track has been linked by the consumer.
    AwaitingLinking,
    /// Every track is linked; decoded blocks are delivered as demand allows.
    Streaming,
}

/// A notification the demuxer raises for its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxEvent {
    /// A track announced by the file's `Tracks` element.
    NewTrack(Track),
    /// A decoded buffer ready for delivery on `track_number`'s output pad.
    Buffer {
        /// The track this buffer belongs to.
        track_number: TrackId,
        /// The frame bytes.
        payload: Vec<u8>,
        /// Presentation timestamp, in nanoseconds, computed as
        /// `(cluster_timecode + block_relative) * timestamp_scale`.
        pts_ns: i64,
    },
    /// No further buffers will arrive on any pad.
    EndOfStream,
}

struct CachedBuffer {
    track_number: TrackId,
    payload: Vec<u8>,
    pts_ns: i64,
}

/// The demuxing state machine.
///
/// Owns no input source: the caller pushes bytes as they arrive via [`feed`](Self::feed) and
/// pulls readiness signals via [`link_track`](Self::link_track)/[`grant_demand`](Self::grant_demand).
/// All three return newly deliverable events, so a caller never needs to poll separately.
pub struct Demuxer {
    parser: ElementParser,
    state: DemuxState,
    timestamp_scale: u64,
    tracks: Vec<Track>,
    linked: HashSet<TrackId>,
    demand: HashMap<TrackId, Demand>,
    cache: VecDeque<CachedBuffer>,
    current_cluster_ts: Option<u64>,
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demuxer {
    /// Create a demuxer with no input fed yet.
    pub fn new() -> Self {
        Self {
            parser: ElementParser::new(),
            state: DemuxState::ReadingHeader,
            timestamp_scale: 1_000_000,
            tracks: Vec::new(),
            linked: HashSet::new(),
            demand: HashMap::new(),
            cache: VecDeque::new(),
            current_cluster_ts: None,
        }
    }

    /// The tracks announced so far (only populated once `Tracks` has been parsed).
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Whether the demuxer's cache is empty, i.e. whether a host wrapping a pull-based input
    /// source should still consider pulling more bytes. Per the backpressure contract, while any
    /// cached buffer is waiting for demand, no new input bytes should be demanded.
    pub fn wants_input(&self) -> bool {
        self.cache.is_empty()
    }

    /// Feed newly arrived input bytes and process as many elements as they complete.
    ///
    /// Returns every event unlocked by this feed: `NewTrack` notifications as `Tracks` is
    /// parsed, and `Buffer`s that demand already covers.
    pub fn feed(&mut self, bytes: &[u8]) -> crate::Result<Vec<DemuxEvent>> {
        self.parser.feed(bytes);
        let parsed = self.parser.parse()?;
        self.handle_parsed(parsed)
    }

    /// Mark `track_number` as linked by the consumer (its stream-format announcement has been
    /// acknowledged downstream). Once every announced track is linked, the demuxer moves from
    /// `AwaitingLinking` to `Streaming` and begins draining its cache as demand allows.
    pub fn link_track(&mut self, track_number: TrackId) -> crate::Result<Vec<DemuxEvent>> {
        if !self.tracks.iter().any(|t| t.number == track_number) {
            return Err(Error::OutOfBounds);
        }
        self.linked.insert(track_number);
        if self.state == DemuxState::AwaitingLinking && self.all_tracks_linked() {
            self.state = DemuxState::Streaming;
        }
        Ok(self.drain_cache())
    }

    /// Grant `n` additional units of demand on `track_number`'s output pad, then reclassify the
    /// cache front-first: stop at the first still-blocked entry rather than skipping ahead, so
    /// per-track delivery order is preserved exactly as it was decoded.
    pub fn grant_demand(&mut self, track_number: TrackId, n: usize) -> Vec<DemuxEvent> {
        self.demand.entry(track_number).or_insert_with(Demand::new).grant(n);
        self.drain_cache()
    }

    /// Signal that no more input bytes will arrive. Any cached buffers still awaiting demand are
    /// left undelivered; per the truncated-input contract, this only ever drops buffers past
    /// what demand already covers, never corrupts or reorders what was delivered.
    pub fn end_of_input(&mut self) -> Vec<DemuxEvent> {
        vec![DemuxEvent::EndOfStream]
    }

    fn all_tracks_linked(&self) -> bool {
        self.tracks.iter().all(|t| self.linked.contains(&t.number))
    }

    fn drain_cache(&mut self) -> Vec<DemuxEvent> {
        let mut emitted = Vec::new();
        if self.state != DemuxState::Streaming {
            return emitted;
        }
        while let Some(front) = self.cache.front() {
            let has_credit = self
                .demand
                .get(&front.track_number)
                .map(Demand::has_credit)
                .unwrap_or(false);
            if !has_credit {
                break;
            }
            let item = self.cache.pop_front().expect("just peeked");
            self.demand.get_mut(&item.track_number).expect("credit checked above").consume();
            emitted.push(DemuxEvent::Buffer {
                track_number: item.track_number,
                payload: item.payload,
                pts_ns: item.pts_ns,
            });
        }
        emitted
    }

    fn handle_parsed(&mut self, events: Vec<ParsedElement>) -> crate::Result<Vec<DemuxEvent>> {
        let mut out = Vec::new();
        for event in events {
            match event {
                ParsedElement::Ebml(ebml) => {
                    if let Some(doc_type) = &ebml.doc_type {
                        if doc_type.0 != "matroska" && doc_type.0 != "webm" {
                            return Err(Error::InvalidDocType(doc_type.0.clone()));
                        }
                    }
                }
                ParsedElement::Info(info) => {
                    self.timestamp_scale = *info.timestamp_scale;
                }
                ParsedElement::Tracks(tracks) => {
                    if self.state != DemuxState::ReadingHeader {
                        log::warn!("ignoring duplicate Tracks element past ReadingHeader");
                        continue;
                    }
                    // Decode every entry before touching `self.tracks`/`out`: if a later entry
                    // fails (e.g. an unsupported codec), nothing gets committed for the earlier
                    // ones either, so there is no internally-registered track that was never
                    // reported via `DemuxEvent::NewTrack`.
                    let new_tracks = tracks
                        .track_entry
                        .iter()
                        .map(track_from_entry)
                        .collect::<crate::Result<Vec<_>>>()?;
                    out.extend(new_tracks.iter().cloned().map(DemuxEvent::NewTrack));
                    self.state = if new_tracks.is_empty() {
                        DemuxState::Streaming
                    } else {
                        DemuxState::AwaitingLinking
                    };
                    self.tracks.extend(new_tracks);
                }
                ParsedElement::ClusterTimestamp(ts) => {
                    self.current_cluster_ts = Some(*ts);
                }
                ParsedElement::SimpleBlock(block) => {
                    self.route_block(ClusterBlock::Simple(block))?;
                }
                ParsedElement::BlockGroup(group) => {
                    self.route_block(ClusterBlock::Group(group))?;
                }
                ParsedElement::SegmentStart
                | ParsedElement::SeekHead(_)
                | ParsedElement::Cues(_)
                | ParsedElement::ClusterStart
                | ParsedElement::ClusterPosition(_)
                | ParsedElement::ClusterPrevSize(_)
                | ParsedElement::Void(_)
                | ParsedElement::Crc32(_)
                | ParsedElement::Unknown { .. } => {}
            }
        }
        out.extend(self.drain_cache());
        Ok(out)
    }

    fn route_block(&mut self, block: ClusterBlock) -> crate::Result<()> {
        let cluster_ts = self.current_cluster_ts.unwrap_or(0);
        let synthetic = match block {
            ClusterBlock::Simple(sb) => Cluster {
                crc32: None,
                void: None,
                timestamp: Timestamp(cluster_ts),
                position: None,
                prev_size: None,
                simple_block: vec![sb],
                block_group: Vec::new(),
            },
            ClusterBlock::Group(bg) => Cluster {
                crc32: None,
                void: None,
                timestamp: Timestamp(cluster_ts),
                position: None,
                prev_size: None,
                simple_block: Vec::new(),
                block_group: vec![bg],
            },
        };
        for frame in synthetic.frames() {
            let frame = frame?;
            let pts_ns = frame.timestamp * self.timestamp_scale as i64;
            self.cache.push_back(CachedBuffer {
                track_number: frame.track_number,
                payload: frame.data.to_vec(),
                pts_ns,
            });
        }
        Ok(())
    }
}

fn track_from_entry(entry: &TrackEntry) -> crate::Result<Track> {
    let codec = Codec::from_wire_id(&entry.codec_id.0)?;
    let metadata = match codec {
        Codec::Opus => {
            let channels = entry
                .audio
                .as_ref()
                .map(|a| *a.channels as u8)
                .unwrap_or(1);
            TrackMetadata::Opus { channels }
        }
        Codec::Vp8 => TrackMetadata::Vp8 {
            width: entry.video.as_ref().and_then(|v| v.pixel_width.as_ref()).map(|w| **w),
            height: entry.video.as_ref().and_then(|v| v.pixel_height.as_ref()).map(|h| **h),
        },
        Codec::Vp9 => TrackMetadata::Vp9 {
            width: entry.video.as_ref().and_then(|v| v.pixel_width.as_ref()).map(|w| **w),
            height: entry.video.as_ref().and_then(|v| v.pixel_height.as_ref()).map(|h| **h),
        },
        Codec::H264 => TrackMetadata::H264 {
            avc_config: entry
                .codec_private
                .as_ref()
                .map(|c| c.0.clone())
                .unwrap_or_default(),
            width: entry.video.as_ref().and_then(|v| v.pixel_width.as_ref()).map(|w| **w),
            height: entry.video.as_ref().and_then(|v| v.pixel_height.as_ref()).map(|h| **h),
        },
    };
    Ok(Track {
        number: *entry.track_number,
        uid: uid_from_bytes(&entry.track_uid.0),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::VInt64;
    use crate::element::Element;
    use crate::functional::Encode;
    use crate::leaf::{
        Channels, CodecId, DocType, DocTypeReadVersion, DocTypeVersion, EbmlMaxIdLength,
        EbmlMaxSizeLength, FlagLacing, MuxingApp, SamplingFrequency, TimestampScale, TrackNumber,
        TrackType, TrackUid, WritingApp,
    };
    use crate::master::{Audio, Ebml, Info, Tracks};
    use crate::serializer::simple_block;

    fn header_bytes(track_entries: Vec<TrackEntry>) -> Vec<u8> {
        let ebml = Ebml {
            crc32: None,
            void: None,
            ebml_version: None,
            ebml_read_version: None,
            ebml_max_id_length: EbmlMaxIdLength(4),
            ebml_max_size_length: EbmlMaxSizeLength(8),
            doc_type: Some(DocType("matroska".to_string())),
            doc_type_version: Some(DocTypeVersion(4)),
            doc_type_read_version: Some(DocTypeReadVersion(2)),
        };
        let info = Info {
            crc32: None,
            void: None,
            segment_uuid: None,
            timestamp_scale: TimestampScale(1_000_000),
            duration: None,
            date_utc: None,
            title: None,
            muxing_app: MuxingApp("test".into()),
            writing_app: WritingApp("test".into()),
        };
        let tracks = Tracks {
            crc32: None,
            void: None,
            track_entry: track_entries,
        };

        let mut out = Vec::new();
        ebml.encode(&mut out).unwrap();
        // Segment, unknown size.
        out.extend_from_slice(&[0x18, 0x53, 0x80, 0x67, 0xFF]);
        info.encode(&mut out).unwrap();
        tracks.encode(&mut out).unwrap();
        out
    }

    fn opus_track_entry(number: u64) -> TrackEntry {
        TrackEntry {
            crc32: None,
            void: None,
            track_number: TrackNumber(number),
            track_uid: TrackUid(vec![number as u8]),
            track_type: TrackType(Codec::Opus.track_type()),
            flag_lacing: Some(FlagLacing(0)),
            codec_id: CodecId(Codec::Opus.wire_id().to_string()),
            codec_private: None,
            codec_delay: None,
            seek_pre_roll: None,
            audio: Some(Audio {
                crc32: None,
                void: None,
                sampling_frequency: SamplingFrequency(48_000.0),
                channels: Channels(1),
                bit_depth: None,
            }),
            video: None,
        }
    }

    fn cluster_bytes(timestamp: u64, blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        Timestamp(timestamp).encode(&mut body).unwrap();
        for block in blocks {
            body.extend_from_slice(block);
        }
        let mut out = Vec::new();
        out.extend_from_slice(&[0x1F, 0x43, 0xB6, 0x75]);
        let mut size = Vec::new();
        VInt64::new(body.len() as u64).encode(&mut size).unwrap();
        out.extend_from_slice(&size);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn tracks_parsed_emits_new_track_and_enters_awaiting_linking() {
        let mut demuxer = Demuxer::new();
        let events = demuxer.feed(&header_bytes(vec![opus_track_entry(1)])).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DemuxEvent::NewTrack(t) if t.number == 1));
        assert_eq!(demuxer.state, DemuxState::AwaitingLinking);
    }

    #[test]
    fn blocks_cache_until_linked_then_flush_respects_demand() {
        let mut demuxer = Demuxer::new();
        demuxer.feed(&header_bytes(vec![opus_track_entry(1)])).unwrap();

        let block = simple_block(1, 0, true, &[0xAA; 4]).unwrap();
        let mut block_bytes = Vec::new();
        block.encode(&mut block_bytes).unwrap();
        let events = demuxer.feed(&cluster_bytes(0, &[block_bytes])).unwrap();
        assert!(events.is_empty(), "no output while awaiting linking");
        assert!(!demuxer.wants_input(), "cache is non-empty");

        let events = demuxer.link_track(1).unwrap();
        assert!(events.is_empty(), "no demand granted yet");

        let events = demuxer.grant_demand(1, 1);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DemuxEvent::Buffer { track_number: 1, .. }));
        assert!(demuxer.wants_input());
    }

    #[test]
    fn two_pads_of_demand_caps_delivery_at_two_buffers() {
        let mut demuxer = Demuxer::new();
        demuxer.feed(&header_bytes(vec![opus_track_entry(1)])).unwrap();
        demuxer.link_track(1).unwrap();

        let mut blocks = Vec::new();
        for ts in [0i64, 20, 40] {
            let block = simple_block(1, ts as i16 as i64, true, &[0xBB; 2]).unwrap();
            let mut bytes = Vec::new();
            block.encode(&mut bytes).unwrap();
            blocks.push(bytes);
        }
        demuxer.feed(&cluster_bytes(0, &blocks)).unwrap();
        assert!(!demuxer.wants_input());

        let events = demuxer.grant_demand(1, 2);
        assert_eq!(events.len(), 2);
        assert!(!demuxer.wants_input(), "one buffer still waits for demand");

        let events = demuxer.grant_demand(1, 1);
        assert_eq!(events.len(), 1);
        assert!(demuxer.wants_input());
    }

    #[test]
    fn unsupported_codec_is_fatal() {
        let mut entry = opus_track_entry(1);
        entry.codec_id = CodecId("A_VORBIS".to_string());
        let mut demuxer = Demuxer::new();
        let err = demuxer.feed(&header_bytes(vec![entry])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCodec(_)));
    }

    #[test]
    fn failed_track_entry_does_not_leave_earlier_entries_half_registered() {
        let mut bad_entry = opus_track_entry(3);
        bad_entry.codec_id = CodecId("A_VORBIS".to_string());
        let entries = vec![opus_track_entry(1), opus_track_entry(2), bad_entry];

        let mut demuxer = Demuxer::new();
        let err = demuxer.feed(&header_bytes(entries)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCodec(_)));
        assert!(
            demuxer.tracks().is_empty(),
            "tracks 1 and 2 must not be committed when track 3 fails to decode"
        );
    }

    #[test]
    fn duplicate_tracks_element_is_ignored_once_streaming() {
        let mut demuxer = Demuxer::new();
        demuxer.feed(&header_bytes(vec![opus_track_entry(1)])).unwrap();
        demuxer.link_track(1).unwrap();
        assert_eq!(demuxer.state, DemuxState::Streaming);

        let tracks = Tracks {
            crc32: None,
            void: None,
            track_entry: vec![opus_track_entry(2)],
        };
        let mut tracks_bytes = Vec::new();
        tracks.encode(&mut tracks_bytes).unwrap();
        let events = demuxer.feed(&tracks_bytes).unwrap();

        assert!(events.is_empty(), "a second Tracks element must not re-announce tracks");
        assert_eq!(demuxer.state, DemuxState::Streaming, "state must not reset to AwaitingLinking");
        assert_eq!(demuxer.tracks().len(), 1, "the duplicate entry must not be appended");
    }

    #[test]
    fn laced_block_is_fatal() {
        let mut demuxer = Demuxer::new();
        demuxer.feed(&header_bytes(vec![opus_track_entry(1)])).unwrap();
        demuxer.link_track(1).unwrap();

        // Flags byte with lacing bits (0x06) set.
        let laced = crate::leaf::SimpleBlock(vec![0x81, 0x00, 0x00, 0x06, 0xCC]);
        let mut block_bytes = Vec::new();
        laced.encode(&mut block_bytes).unwrap();
        let err = demuxer.feed(&cluster_bytes(0, &[block_bytes])).unwrap_err();
        assert!(matches!(err, Error::LacedFrames));
    }

    #[test]
    fn invalid_doc_type_is_fatal() {
        let ebml = Ebml {
            crc32: None,
            void: None,
            ebml_version: None,
            ebml_read_version: None,
            ebml_max_id_length: EbmlMaxIdLength(4),
            ebml_max_size_length: EbmlMaxSizeLength(8),
            doc_type: Some(DocType("realmedia".to_string())),
            doc_type_version: Some(DocTypeVersion(1)),
            doc_type_read_version: Some(DocTypeReadVersion(1)),
        };
        let mut bytes = Vec::new();
        ebml.encode(&mut bytes).unwrap();

        let mut demuxer = Demuxer::new();
        let err = demuxer.feed(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidDocType(_)));
    }
}
