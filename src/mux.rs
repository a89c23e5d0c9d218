//! The muxing scheduler: per-track one-block lookahead, cross-track ordering, cluster
//! segmentation, cue-point recording, and header finalization against a seekable [`Sink`].

use crate::base::{Header, VInt64};
use crate::codecs::{self, Codec};
use crate::element::Element;
use crate::functional::Encode;
use crate::iface::Sink;
use crate::leaf::{
    Channels, CodecDelay, CodecId, CodecPrivate, DateUtc, DocType, DocTypeReadVersion,
    DocTypeVersion, Duration, EbmlMaxIdLength, EbmlMaxSizeLength, FlagLacing, MuxingApp,
    PixelHeight, PixelWidth, SamplingFrequency, SeekPreRoll, Title, TrackNumber, TrackType,
    TrackUid, WritingApp,
};
use crate::master::{Audio, Ebml, Info, Segment, TrackEntry, Tracks, Video};
use crate::serializer::{self, ClusterBuilder};
use crate::track::{Track, TrackId, TrackMetadata, uid_to_bytes};
use crate::Error;

/// Construction-time configuration for a [`Muxer`].
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// `EBML/DocType`: `"matroska"` or `"webm"`.
    pub doc_type: String,
    /// `Info/WritingApp`.
    pub writing_app: String,
    /// `Info/MuxingApp`.
    pub muxing_app: String,
    /// `Info/Title`, if any.
    pub title: Option<String>,
    /// `Info/DateUTC`, signed nanoseconds from 2001-01-01T00:00:00Z, if supplied by the caller.
    pub date_utc: Option<i64>,
    /// Cluster byte-size trigger. Default 5 MiB.
    pub max_cluster_bytes: u64,
    /// Cluster duration trigger, in milliseconds. Default 5000.
    pub max_cluster_duration_ms: i64,
    /// Total reserved `SeekHead` size, in bytes, including its trailing `Void`. Default 160.
    pub seek_head_budget_bytes: u64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            doc_type: "matroska".to_string(),
            writing_app: format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            muxing_app: format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            title: None,
            date_utc: None,
            max_cluster_bytes: 5 * 1024 * 1024,
            max_cluster_duration_ms: 5000,
            seek_head_budget_bytes: 160,
        }
    }
}

/// A single coded access unit handed to the muxer on an input pad.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    /// The coded frame bytes.
    pub payload: Vec<u8>,
    /// Presentation timestamp, in nanoseconds, if known.
    pub pts_ns: Option<i64>,
    /// Decode timestamp, in nanoseconds, if known.
    pub dts_ns: Option<i64>,
    /// For H.264 only: whether the caller asserts this access unit is an IDR.
    pub h264_key_frame: Option<bool>,
}

/// Which of a buffer's two possible timestamps a track uses, fixed at the track's first buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeBase {
    Pts,
    Dts,
}

struct PadState {
    track: Track,
    active: bool,
    time_base: Option<TimeBase>,
    offset_ns: Option<i64>,
    pending: Option<(i64, Vec<u8>, Option<bool>)>,
}

/// The muxing scheduler.
///
/// Owns no output sink of its own: every method that may produce bytes takes one explicitly, so
/// the same sink is threaded through pad registration, buffer pushes, and finalization.
pub struct Muxer {
    config: MuxerConfig,
    pads: Vec<PadState>,
    streaming_started: bool,
    finalized: bool,
    header_prefix: Vec<u8>,
    header_total_len: u64,
    current_cluster: Option<ClusterBuilder>,
    segment_position: u64,
    cues: Vec<crate::master::CuePoint>,
    time_max: Option<i64>,
}

impl Muxer {
    /// Create a muxer with no pads registered yet.
    pub fn new(config: MuxerConfig) -> Self {
        Self {
            config,
            pads: Vec::new(),
            streaming_started: false,
            finalized: false,
            header_prefix: Vec::new(),
            header_total_len: 0,
            current_cluster: None,
            segment_position: 0,
            cues: Vec::new(),
            time_max: None,
        }
    }

    /// Register a new input pad, assigning it a track number equal to its add order (first
    /// added = 1). The track UID is derived deterministically from the track number.
    ///
    /// Rejects registration after streaming has begun ([`Error::PadAddedInPlayback`]) and bad
    /// Opus channel counts ([`Error::ChannelCountUnsupported`]).
    pub fn add_pad(&mut self, metadata: TrackMetadata) -> crate::Result<TrackId> {
        let number = self.pads.len() as TrackId + 1;
        self.add_pad_with_uid(metadata, number)
    }

    /// Like [`add_pad`](Self::add_pad), but with an explicit track UID — used when remuxing to
    /// preserve a source file's `TrackUID`s across a demux→mux round trip.
    pub fn add_pad_with_uid(
        &mut self,
        metadata: TrackMetadata,
        uid: u64,
    ) -> crate::Result<TrackId> {
        if self.streaming_started {
            return Err(Error::PadAddedInPlayback);
        }
        if let TrackMetadata::Opus { channels } = metadata {
            if channels == 0 || channels > 2 {
                return Err(Error::ChannelCountUnsupported(channels));
            }
        }
        let number = self.pads.len() as TrackId + 1;
        self.pads.push(PadState {
            track: Track {
                number,
                uid,
                metadata,
            },
            active: true,
            time_base: None,
            offset_ns: None,
            pending: None,
        });
        Ok(number)
    }

    /// Submit a buffer on `track`'s input pad.
    ///
    /// Lazily writes the EBML header, the Segment header, and a length-reserving placeholder on
    /// the first call across any pad (latching pad registration). The per-track one-block
    /// lookahead means this may or may not cause any bytes to actually be scheduled: a block only
    /// leaves the scheduler once every other still-active track also holds a pending block (or
    /// has ended).
    pub fn push_buffer(
        &mut self,
        sink: &mut dyn Sink,
        track: TrackId,
        buffer: InputBuffer,
    ) -> crate::Result<()> {
        self.ensure_started(sink)?;
        let index = self.pad_index(track)?;

        let raw_ts = match self.pads[index].time_base {
            Some(TimeBase::Pts) => buffer.pts_ns,
            Some(TimeBase::Dts) => buffer.dts_ns,
            None => {
                let base = if buffer.pts_ns.is_some() {
                    TimeBase::Pts
                } else {
                    TimeBase::Dts
                };
                self.pads[index].time_base = Some(base);
                match base {
                    TimeBase::Pts => buffer.pts_ns,
                    TimeBase::Dts => buffer.dts_ns,
                }
            }
        };
        let raw_ts = raw_ts.unwrap_or_else(|| {
            log::warn!("track {track} buffer carries neither pts nor dts; treating as 0ns");
            0
        });
        let offset = *self.pads[index].offset_ns.get_or_insert(raw_ts);
        let timestamp_ms = (raw_ts - offset) / 1_000_000;

        let codec = self.pads[index].track.codec();
        let keyframe = codecs::is_keyframe(
            codec,
            &buffer.payload,
            buffer
                .h264_key_frame
                .map(|key_frame| codecs::KeyframeHint::H264 { key_frame }),
        )?;

        if self.pads[index].pending.is_some() {
            log::warn!("track {track} received a buffer before its pending block was scheduled; replacing it");
        }
        self.pads[index].pending = Some((timestamp_ms, buffer.payload, Some(keyframe)));

        self.drain_ready(sink)
    }

    /// Mark `track`'s input pad as ended. Its last pending block (if any) remains eligible for
    /// scheduling against the other still-active tracks.
    ///
    /// When every pad has ended, this runs [`finalize`](Self::finalize) and returns its result.
    pub fn end_pad(&mut self, sink: &mut dyn Sink, track: TrackId) -> crate::Result<()> {
        let index = self.pad_index(track)?;
        self.pads[index].active = false;
        self.drain_ready(sink)?;
        if self.pads.iter().all(|p| !p.active) {
            self.finalize(sink)?;
        }
        Ok(())
    }

    fn pad_index(&self, track: TrackId) -> crate::Result<usize> {
        self.pads
            .iter()
            .position(|p| p.track.number == track)
            .ok_or(Error::OutOfBounds)
    }

    /// While every still-active track holds a pending block (ended tracks contribute their last
    /// pending block exactly once), select and emit the smallest-timestamp one, tie-breaking
    /// video before audio.
    fn drain_ready(&mut self, sink: &mut dyn Sink) -> crate::Result<()> {
        loop {
            let all_ready = self
                .pads
                .iter()
                .all(|p| !p.active || p.pending.is_some());
            if !all_ready || self.pads.iter().all(|p| p.pending.is_none()) {
                break;
            }

            let rank = |i: usize| -> u8 {
                if self.pads[i].track.is_video() { 0 } else { 1 }
            };
            let winner = self
                .pads
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.pending.as_ref().map(|(ts, _, _)| (i, *ts)))
                .min_by(|(i_a, ts_a), (i_b, ts_b)| {
                    ts_a.cmp(ts_b).then_with(|| rank(*i_a).cmp(&rank(*i_b)))
                })
                .map(|(i, _)| i);

            let Some(index) = winner else { break };
            let (timestamp_ms, payload, keyframe) = self.pads[index].pending.take().unwrap();
            let track_number = self.pads[index].track.number;
            let is_video = self.pads[index].track.is_video();
            let is_keyframe = keyframe.unwrap_or(false);
            self.emit_block(sink, track_number, timestamp_ms, is_video, is_keyframe, &payload)?;
        }
        Ok(())
    }

    fn emit_block(
        &mut self,
        sink: &mut dyn Sink,
        track_number: TrackId,
        timestamp_ms: i64,
        is_video: bool,
        is_keyframe: bool,
        payload: &[u8],
    ) -> crate::Result<()> {
        self.time_max = Some(self.time_max.map_or(timestamp_ms, |m| m.max(timestamp_ms)));

        let needs_new_cluster = match &self.current_cluster {
            None => true,
            Some(cluster) => {
                let relative = timestamp_ms - cluster.cluster_time();
                cluster.byte_size() >= self.config.max_cluster_bytes
                    || relative >= self.config.max_cluster_duration_ms
                    || (is_video && is_keyframe)
            }
        };

        if needs_new_cluster {
            self.flush_current_cluster(sink)?;
            if is_video && is_keyframe {
                self.cues.push(serializer::cue_point(
                    timestamp_ms,
                    track_number,
                    self.segment_position,
                ));
            }
            self.current_cluster = Some(ClusterBuilder::new(timestamp_ms));
        }

        let cluster = self.current_cluster.as_mut().expect("just ensured");
        let overflow = cluster.push_block(track_number, timestamp_ms, is_keyframe, payload)?;
        if overflow {
            log::warn!(
                "track {track_number} block at {timestamp_ms}ms overflows its cluster's 16-bit relative timecode range"
            );
        }
        Ok(())
    }

    fn flush_current_cluster(&mut self, sink: &mut dyn Sink) -> crate::Result<()> {
        let Some(builder) = self.current_cluster.take() else {
            return Ok(());
        };
        if builder.is_empty() {
            return Ok(());
        }
        let cluster = builder.finish();
        let mut bytes = Vec::new();
        cluster.encode(&mut bytes)?;
        log::debug!(
            "flushing cluster at {}ms ({} bytes)",
            *cluster.timestamp,
            bytes.len()
        );
        sink.write(&bytes)?;
        self.segment_position += bytes.len() as u64;
        Ok(())
    }

    fn ensure_started(&mut self, sink: &mut dyn Sink) -> crate::Result<()> {
        if self.streaming_started {
            return Ok(());
        }
        let tracks = self.build_tracks();
        let tracks_len = serializer::encoded_len(&tracks)?;
        let info_reserved_len = self.info_reserved_len()?;
        self.header_total_len =
            self.config.seek_head_budget_bytes + info_reserved_len + tracks_len;

        let mut prefix = Vec::new();
        self.build_ebml().encode(&mut prefix)?;
        Header {
            id: Segment::ID,
            size: VInt64::new_unknown(),
        }
        .encode(&mut prefix)?;
        sink.write(&prefix)?;
        self.header_prefix = prefix;

        let placeholder = serializer::void_of_total_len(self.header_total_len)?;
        let mut placeholder_bytes = Vec::new();
        placeholder.encode(&mut placeholder_bytes)?;
        sink.write(&placeholder_bytes)?;

        self.streaming_started = true;
        Ok(())
    }

    fn build_ebml(&self) -> Ebml {
        Ebml {
            crc32: None,
            void: None,
            ebml_version: None,
            ebml_read_version: None,
            ebml_max_id_length: EbmlMaxIdLength(4),
            ebml_max_size_length: EbmlMaxSizeLength(8),
            doc_type: Some(DocType(self.config.doc_type.clone())),
            doc_type_version: Some(DocTypeVersion(4)),
            doc_type_read_version: Some(DocTypeReadVersion(2)),
        }
    }

    fn build_tracks(&self) -> Tracks {
        Tracks {
            crc32: None,
            void: None,
            track_entry: self.pads.iter().map(|p| track_entry_for(&p.track)).collect(),
        }
    }

    fn build_info(&self, duration: Option<f64>) -> Info {
        Info {
            crc32: None,
            void: None,
            segment_uuid: None,
            timestamp_scale: crate::leaf::TimestampScale(1_000_000),
            duration: duration.map(Duration),
            date_utc: self.config.date_utc.map(DateUtc),
            title: self.config.title.clone().map(Title),
            muxing_app: MuxingApp(self.config.muxing_app.clone()),
            writing_app: WritingApp(self.config.writing_app.clone()),
        }
    }

    /// The fixed total length `Info` is reserved at, computed with a Duration value guaranteed
    /// to encode in its widest (8-byte) form, so the real finalized Duration (whatever width it
    /// turns out to need) always fits with room to spare for a trailing `Void` to absorb the
    /// difference.
    fn info_reserved_len(&self) -> crate::Result<u64> {
        serializer::encoded_len(&self.build_info(Some(f64::MAX)))
    }

    fn info_with_exact_len(&self, duration: Option<f64>, target_len: u64) -> crate::Result<Info> {
        let id_len = serializer::encoded_len(&Info::ID)?;
        let mut info = self.build_info(duration);
        let mut body = Vec::new();
        info.encode_body(&mut body)?;
        info.void = serializer::void_to_reach_total_len(id_len, body.len() as u64, target_len)?;
        Ok(info)
    }

    /// Flush any remaining cluster, write `Cues`, and rewrite the reserved header region with
    /// the real `SeekHead`/`Info`/`Tracks`.
    ///
    /// Called automatically once every pad has ended via [`end_pad`](Self::end_pad); exposed
    /// directly for callers that want to finalize early.
    pub fn finalize(&mut self, sink: &mut dyn Sink) -> crate::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.ensure_started(sink)?;
        self.flush_current_cluster(sink)?;
        let clusters_size = self.segment_position;

        let mut cues_bytes = Vec::new();
        if !self.cues.is_empty() {
            let cues = crate::master::Cues {
                crc32: None,
                void: None,
                cue_point: self
                    .cues
                    .iter()
                    .cloned()
                    .map(|mut cue| {
                        for position in &mut cue.cue_track_positions {
                            position.cue_cluster_position = crate::leaf::CueClusterPosition(
                                *position.cue_cluster_position + self.header_total_len,
                            );
                        }
                        cue
                    })
                    .collect(),
            };
            cues.encode(&mut cues_bytes)?;
        }

        let tracks = self.build_tracks();
        let tracks_len = serializer::encoded_len(&tracks)?;
        let info_reserved_len = self.info_reserved_len()?;

        let info_position = self.config.seek_head_budget_bytes;
        let tracks_position = info_position + info_reserved_len;
        let cues_position = self.header_total_len + clusters_size;

        let mut seek_entries = vec![
            serializer::seek_entry(Info::ID, info_position)?,
            serializer::seek_entry(Tracks::ID, tracks_position)?,
        ];
        if !self.cues.is_empty() {
            seek_entries.push(serializer::seek_entry(crate::master::Cues::ID, cues_position)?);
        }
        let seek_head =
            serializer::seek_head_with_budget(seek_entries, self.config.seek_head_budget_bytes)?;

        let duration = self.time_max.map(|t| t as f64);
        let info = self.info_with_exact_len(duration, info_reserved_len)?;

        let mut header = Vec::new();
        seek_head.encode(&mut header)?;
        info.encode(&mut header)?;
        tracks.encode(&mut header)?;
        debug_assert_eq!(header.len() as u64, self.header_total_len);
        debug_assert_eq!(tracks_len, serializer::encoded_len(&tracks)?);

        sink.write(&cues_bytes)?;

        let mut prefix = self.header_prefix.clone();
        prefix.extend_from_slice(&header);
        sink.seek_rewrite(&prefix)?;

        self.finalized = true;
        Ok(())
    }
}

fn track_entry_for(track: &Track) -> TrackEntry {
    let codec = track.codec();
    let (audio, video, codec_private) = match &track.metadata {
        TrackMetadata::Opus { channels } => {
            let header = codecs::opus_id_header(*channels)
                .expect("channel count was validated at pad registration");
            (
                Some(Audio {
                    crc32: None,
                    void: None,
                    sampling_frequency: SamplingFrequency(48_000.0),
                    channels: Channels(*channels as u64),
                    bit_depth: None,
                }),
                None,
                Some(CodecPrivate(header.to_vec())),
            )
        }
        TrackMetadata::Vp8 { width, height } | TrackMetadata::Vp9 { width, height } => (
            None,
            Some(Video {
                crc32: None,
                void: None,
                pixel_width: width.map(PixelWidth),
                pixel_height: height.map(PixelHeight),
                flag_interlaced: None,
            }),
            None,
        ),
        TrackMetadata::H264 {
            avc_config,
            width,
            height,
        } => (
            None,
            Some(Video {
                crc32: None,
                void: None,
                pixel_width: width.map(PixelWidth),
                pixel_height: height.map(PixelHeight),
                flag_interlaced: None,
            }),
            Some(CodecPrivate(avc_config.clone())),
        ),
    };

    TrackEntry {
        crc32: None,
        void: None,
        track_number: TrackNumber(track.number),
        track_uid: TrackUid(uid_to_bytes(track.uid)),
        track_type: TrackType(codec.track_type()),
        flag_lacing: Some(FlagLacing(0)),
        codec_id: CodecId(codec.wire_id().to_string()),
        codec_private,
        codec_delay: None::<CodecDelay>,
        seek_pre_roll: None::<SeekPreRoll>,
        audio,
        video,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::Decode;
    use crate::iface::MemorySink;
    use crate::parser::{ElementParser, ParsedElement};

    fn opus_buffer(payload: &[u8], pts_ms: i64) -> InputBuffer {
        InputBuffer {
            payload: payload.to_vec(),
            pts_ns: Some(pts_ms * 1_000_000),
            dts_ns: None,
            h264_key_frame: None,
        }
    }

    #[test]
    fn single_opus_track_three_frames_one_cluster() {
        let mut muxer = Muxer::new(MuxerConfig::default());
        let track = muxer.add_pad(TrackMetadata::Opus { channels: 1 }).unwrap();
        let mut sink = MemorySink::new();

        muxer.push_buffer(&mut sink, track, opus_buffer(&[1; 120], 0)).unwrap();
        muxer.push_buffer(&mut sink, track, opus_buffer(&[2; 120], 20)).unwrap();
        muxer.push_buffer(&mut sink, track, opus_buffer(&[3; 120], 40)).unwrap();
        muxer.end_pad(&mut sink, track).unwrap();

        let bytes = sink.into_inner();
        let mut parser = ElementParser::new();
        parser.feed(&bytes);
        let events = parser.parse().unwrap();

        let clusters: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ParsedElement::ClusterStart))
            .collect();
        assert_eq!(clusters.len(), 1);

        let mut relative_times = Vec::new();
        let mut in_cluster = false;
        for event in &events {
            match event {
                ParsedElement::ClusterStart => in_cluster = true,
                ParsedElement::SimpleBlock(block) if in_cluster => {
                    let mut body = &block.0[..];
                    let _track = VInt64::decode(&mut body).unwrap();
                    let mut ts_bytes = [0u8; 2];
                    ts_bytes.copy_from_slice(&body[..2]);
                    relative_times.push(i16::from_be_bytes(ts_bytes));
                    assert_eq!(body[2] & 0x80, 0x80, "opus blocks are always keyframes");
                }
                _ => {}
            }
        }
        assert_eq!(relative_times, vec![0, 20, 40]);

        let tracks = events
            .iter()
            .find_map(|e| match e {
                ParsedElement::Tracks(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(tracks.track_entry.len(), 1);
        assert_eq!(tracks.track_entry[0].codec_id.0, "A_OPUS");
    }

    #[test]
    fn vp8_keyframes_start_new_clusters_and_cues() {
        let mut muxer = Muxer::new(MuxerConfig::default());
        let track = muxer
            .add_pad(TrackMetadata::Vp8 {
                width: Some(640),
                height: Some(480),
            })
            .unwrap();
        let mut sink = MemorySink::new();

        let key = [0x00u8, 0x00, 0x00, 0xAA];
        let inter = [0x01u8, 0x00, 0x00, 0xBB];

        let mut buffer = |payload: &[u8], pts_ms: i64| InputBuffer {
            payload: payload.to_vec(),
            pts_ns: Some(pts_ms * 1_000_000),
            dts_ns: None,
            h264_key_frame: None,
        };

        muxer.push_buffer(&mut sink, track, buffer(&key, 0)).unwrap();
        muxer.push_buffer(&mut sink, track, buffer(&inter, 1000)).unwrap();
        muxer.push_buffer(&mut sink, track, buffer(&key, 5000)).unwrap();
        muxer.push_buffer(&mut sink, track, buffer(&inter, 6000)).unwrap();
        muxer.end_pad(&mut sink, track).unwrap();

        let bytes = sink.into_inner();
        let mut parser = ElementParser::new();
        parser.feed(&bytes);
        let events = parser.parse().unwrap();

        let cluster_starts = events
            .iter()
            .filter(|e| matches!(e, ParsedElement::ClusterStart))
            .count();
        assert_eq!(cluster_starts, 2);

        let cues = events
            .iter()
            .find_map(|e| match e {
                ParsedElement::Cues(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(cues.cue_point.len(), 2);
        assert_eq!(*cues.cue_point[0].cue_time, 0);
        assert_eq!(*cues.cue_point[1].cue_time, 5000);
    }

    #[test]
    fn opus_and_h264_colocated_keyframe_orders_video_first() {
        let mut muxer = Muxer::new(MuxerConfig::default());
        let video = muxer
            .add_pad(TrackMetadata::H264 {
                avc_config: vec![0x01, 0x42, 0x00, 0x1e],
                width: Some(1280),
                height: Some(720),
            })
            .unwrap();
        let audio = muxer.add_pad(TrackMetadata::Opus { channels: 2 }).unwrap();
        let mut sink = MemorySink::new();

        muxer
            .push_buffer(
                &mut sink,
                video,
                InputBuffer {
                    payload: vec![0xAA; 10],
                    pts_ns: Some(100_000_000),
                    dts_ns: None,
                    h264_key_frame: Some(true),
                },
            )
            .unwrap();
        muxer
            .push_buffer(&mut sink, audio, opus_buffer(&[0xBB; 20], 100))
            .unwrap();
        muxer.end_pad(&mut sink, video).unwrap();
        muxer.end_pad(&mut sink, audio).unwrap();

        let bytes = sink.into_inner();
        let mut parser = ElementParser::new();
        parser.feed(&bytes);
        let events = parser.parse().unwrap();

        let mut in_cluster = false;
        let mut block_tracks = Vec::new();
        for event in &events {
            match event {
                ParsedElement::ClusterStart => in_cluster = true,
                ParsedElement::SimpleBlock(block) if in_cluster => {
                    let mut body = &block.0[..];
                    let track = VInt64::decode(&mut body).unwrap();
                    block_tracks.push(*track);
                }
                _ => {}
            }
        }
        assert_eq!(block_tracks, vec![video, audio]);
    }

    #[test]
    fn pad_added_after_streaming_is_rejected() {
        let mut muxer = Muxer::new(MuxerConfig::default());
        let track = muxer.add_pad(TrackMetadata::Opus { channels: 1 }).unwrap();
        let mut sink = MemorySink::new();
        muxer.push_buffer(&mut sink, track, opus_buffer(&[1; 4], 0)).unwrap();

        let err = muxer.add_pad(TrackMetadata::Opus { channels: 1 }).unwrap_err();
        assert!(matches!(err, Error::PadAddedInPlayback));
    }

    #[test]
    fn bad_opus_channel_count_rejected() {
        let mut muxer = Muxer::new(MuxerConfig::default());
        let err = muxer
            .add_pad(TrackMetadata::Opus { channels: 3 })
            .unwrap_err();
        assert!(matches!(err, Error::ChannelCountUnsupported(3)));
    }

    #[test]
    fn oversized_keyframe_free_track_splits_cluster_on_byte_budget() {
        // VP9 with no keyframes ever (every frame's lowest profile-0 bits say "inter"): the only
        // thing that can end a cluster is the byte-size trigger, so push frames well past it.
        let mut config = MuxerConfig::default();
        config.max_cluster_bytes = 1024;
        let mut muxer = Muxer::new(config);
        let track = muxer
            .add_pad(TrackMetadata::Vp9 {
                width: Some(640),
                height: Some(480),
            })
            .unwrap();
        let mut sink = MemorySink::new();

        // VP9 uncompressed header: marker=10, profile=00, show_existing_frame=0, frame_type=1
        // (inter). The rest of the payload is irrelevant padding.
        let mut inter_frame = [0xFFu8; 64];
        inter_frame[0] = 0x84;
        for i in 0..32 {
            muxer
                .push_buffer(
                    &mut sink,
                    track,
                    InputBuffer {
                        payload: inter_frame.to_vec(),
                        pts_ns: Some(i * 10 * 1_000_000),
                        dts_ns: None,
                        h264_key_frame: None,
                    },
                )
                .unwrap();
        }
        muxer.end_pad(&mut sink, track).unwrap();

        let bytes = sink.into_inner();
        let mut parser = ElementParser::new();
        parser.feed(&bytes);
        let events = parser.parse().unwrap();

        let cluster_starts = events
            .iter()
            .filter(|e| matches!(e, ParsedElement::ClusterStart))
            .count();
        assert!(
            cluster_starts >= 2,
            "expected the byte-size trigger to split into multiple clusters, got {cluster_starts}"
        );

        // No keyframe was ever seen, so Cues stays empty.
        let cues = events.iter().find_map(|e| match e {
            ParsedElement::Cues(c) => Some(c),
            _ => None,
        });
        assert!(cues.is_none() || cues.unwrap().cue_point.is_empty());
    }
}
