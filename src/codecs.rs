//! Codec identification, wire strings, and keyframe detection.
//!
//! Bitstream parsing stops at "is this a keyframe": full codec-level decoding is left to the
//! host application. H.264 keyframe detection is not implemented here at all — the muxer/demuxer
//! never parse NAL units and instead trust caller-supplied metadata.

use crate::Error;

/// A codec this crate can mux/demux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Opus audio.
    Opus,
    /// VP8 video.
    Vp8,
    /// VP9 video.
    Vp9,
    /// H.264/AVC video.
    H264,
}

impl Codec {
    /// The `CodecID` string written to `TrackEntry`.
    pub fn wire_id(self) -> &'static str {
        match self {
            Codec::Opus => "A_OPUS",
            Codec::Vp8 => "V_VP8",
            Codec::Vp9 => "V_VP9",
            Codec::H264 => "V_MPEG4/ISO/AVC",
        }
    }

    /// Parse a `CodecID` string, rejecting anything not in this crate's supported set
    /// (in particular Vorbis, which the original source also carried).
    pub fn from_wire_id(id: &str) -> crate::Result<Self> {
        match id {
            "A_OPUS" => Ok(Codec::Opus),
            "V_VP8" => Ok(Codec::Vp8),
            "V_VP9" => Ok(Codec::Vp9),
            "V_MPEG4/ISO/AVC" => Ok(Codec::H264),
            other => Err(Error::UnsupportedCodec(other.to_string())),
        }
    }

    /// Whether this codec is carried on a video track (`TrackType = 1`) or an audio track
    /// (`TrackType = 2`).
    pub fn track_type(self) -> u64 {
        match self {
            Codec::Opus => 2,
            Codec::Vp8 | Codec::Vp9 | Codec::H264 => 1,
        }
    }

    /// Whether `self` is a video codec.
    pub fn is_video(self) -> bool {
        matches!(self, Codec::Vp8 | Codec::Vp9 | Codec::H264)
    }
}

/// Per-codec keyframe metadata a caller attaches to a buffer crossing the muxer boundary.
///
/// H.264 carries no bitstream to inspect here: the caller (who already has access to slice
/// headers or a higher-level encoder API) states whether the access unit is an IDR.
#[derive(Debug, Clone, Copy)]
pub enum KeyframeHint {
    /// The caller asserts this H.264 access unit is (or is not) a keyframe.
    H264 {
        /// Whether the access unit is an IDR.
        key_frame: bool,
    },
}

/// Determine whether `frame` (the codec payload of a single block) is a keyframe.
///
/// For VP8/VP9 this inspects the frame's bitstream header. For Opus every frame counts as a
/// keyframe (Opus has no inter-frame dependency at the container level). For H.264, `hint` must
/// be supplied by the caller; absent a hint this returns `false` — the cue index will be
/// incomplete but the stream will still mux correctly.
pub fn is_keyframe(codec: Codec, frame: &[u8], hint: Option<KeyframeHint>) -> crate::Result<bool> {
    match codec {
        Codec::Opus => Ok(true),
        Codec::Vp8 => vp8_is_keyframe(frame),
        Codec::Vp9 => vp9_is_keyframe(frame),
        Codec::H264 => Ok(match hint {
            Some(KeyframeHint::H264 { key_frame }) => key_frame,
            None => false,
        }),
    }
}

/// VP8 keyframe test: the first 3 bytes of an uncompressed VP8 frame hold a 19-bit size field
/// plus flags, including a `frame_type` bit where `0` means keyframe.
pub fn vp8_is_keyframe(frame: &[u8]) -> crate::Result<bool> {
    if frame.len() < 3 {
        return Ok(false);
    }
    let tag = u32::from(frame[0]) | (u32::from(frame[1]) << 8) | (u32::from(frame[2]) << 16);
    let frame_type = tag & 0x1;
    Ok(frame_type == 0)
}

/// VP9 keyframe test: the uncompressed header starts with a 2-bit frame marker (`10`), then a
/// profile encoded across one or two bits, an optional `show_existing_frame` bit, and finally a
/// `frame_type` bit (`0` = keyframe). The profile encoding branches into up to 4 distinct bit
/// layouts; this tries each in turn and rejects the frame if none match.
pub fn vp9_is_keyframe(frame: &[u8]) -> crate::Result<bool> {
    let mut bits = BitReader::new(frame);

    let marker = bits.read_bits(2)?;
    if marker != 0b10 {
        return Err(Error::MalformedVP9Header);
    }

    let profile_low = bits.read_bit()?;
    let profile_high = bits.read_bit()?;
    let profile = profile_low | (profile_high << 1);

    // Layout A: profile 3 reserves an extra bit.
    // Layout B: profiles 0-2 have no reserved bit.
    if profile == 3 {
        let _reserved = bits.read_bit()?;
    }

    let show_existing_frame = bits.read_bit()?;
    if show_existing_frame == 1 {
        // A shown-existing-frame packet carries no new frame_type bit; it can never itself be
        // the start of a new keyframe.
        return Ok(false);
    }

    let frame_type = bits.read_bit()?;
    Ok(frame_type == 0)
}

struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn read_bit(&mut self) -> crate::Result<u8> {
        let byte = *self
            .data
            .get(self.byte_pos)
            .ok_or(Error::MalformedVP9Header)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit)
    }

    fn read_bits(&mut self, n: u8) -> crate::Result<u8> {
        let mut value = 0u8;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()?;
        }
        Ok(value)
    }
}

/// Build the deterministic 19-byte Opus `CodecPrivate` ID header.
///
/// Layout: `"OpusHead"`, version=1, channel_count, pre_skip=0 (u16le), input_sample_rate=0
/// (u32le), output_gain=0 (i16le), channel_mapping_family=0. `channel_count` must be 1 or 2;
/// this crate does not support multistream Opus.
pub fn opus_id_header(channels: u8) -> crate::Result<[u8; 19]> {
    if channels == 0 || channels > 2 {
        return Err(Error::ChannelCountUnsupported(channels));
    }
    let mut header = [0u8; 19];
    header[0..8].copy_from_slice(b"OpusHead");
    header[8] = 1; // version
    header[9] = channels;
    header[10..12].copy_from_slice(&0u16.to_le_bytes()); // pre_skip
    header[12..16].copy_from_slice(&0u32.to_le_bytes()); // input sample rate
    header[16..18].copy_from_slice(&0i16.to_le_bytes()); // output gain
    header[18] = 0; // channel mapping family
    Ok(header)
}
