use crate::{
    Error,
    base::VInt64,
    functional::{Decode, Encode},
    leaf::SimpleBlock,
    master::{BlockGroup, Cluster},
};

/// A decoded Matroska frame, extracted from a SimpleBlock or a BlockGroup's Block.
pub struct Frame<'a> {
    /// The frame's payload bytes.
    pub data: &'a [u8],
    /// Whether the frame is a keyframe.
    pub is_keyframe: bool,
    /// Whether the frame is invisible (mostly for subtitle tracks).
    pub is_invisible: bool,
    /// Whether the frame is discardable (for video tracks, e.g. non-reference frames).
    pub is_discardable: bool,
    /// The track number the frame belongs to.
    pub track_number: u64,
    /// The frame's timestamp, in the Cluster's timescale, relative to the Segment.
    pub timestamp: i64,
}

/// A block in a Cluster: either a SimpleBlock or a BlockGroup.
///
/// This is a convenience enum to allow handling both types of blocks uniformly.
/// * when reading: often we just want to iterate over all blocks in a cluster, regardless of type.
/// * when writing: we may want to write a list of blocks of mixed types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterBlock {
    /// A SimpleBlock.
    Simple(SimpleBlock),
    /// A BlockGroup.
    Group(BlockGroup),
}

impl From<SimpleBlock> for ClusterBlock {
    fn from(b: SimpleBlock) -> Self {
        ClusterBlock::Simple(b)
    }
}
impl From<BlockGroup> for ClusterBlock {
    fn from(b: BlockGroup) -> Self {
        ClusterBlock::Group(b)
    }
}

impl Encode for ClusterBlock {
    fn encode<B: crate::functional::BufMut>(&self, buf: &mut B) -> crate::Result<()> {
        match self {
            ClusterBlock::Simple(b) => b.encode(buf),
            ClusterBlock::Group(b) => b.encode(buf),
        }
    }
}

enum BlockRef<'a> {
    Simple(&'a SimpleBlock),
    Group(&'a BlockGroup),
}

/// The decoded header of a SimpleBlock/Block payload, preceding the frame bytes.
struct BlockHeader {
    track_number: VInt64,
    relative_timestamp: i16,
    flags: u8,
}

impl BlockHeader {
    fn decode(body_buf: &mut &[u8]) -> crate::Result<Self> {
        let track_number = VInt64::decode(body_buf)?;
        let relative_timestamp = i16::decode(body_buf)?;
        let flags = u8::decode(body_buf)?;
        let lacing = (flags >> 1) & 0x03;
        if lacing != 0 {
            return Err(Error::LacedFrames);
        }
        Ok(Self {
            track_number,
            relative_timestamp,
            flags,
        })
    }
}

impl<'a> BlockRef<'a> {
    fn into_frame(self, cluster_ts: u64) -> crate::Result<Frame<'a>> {
        match self {
            BlockRef::Simple(block) => {
                let mut body_buf = &block[..];
                let header = BlockHeader::decode(&mut body_buf)?;
                Ok(Frame {
                    data: body_buf,
                    is_keyframe: (header.flags & 0x80) != 0,
                    is_invisible: (header.flags & 0x08) != 0,
                    is_discardable: (header.flags & 0x01) != 0,
                    track_number: *header.track_number,
                    timestamp: cluster_ts as i64 + header.relative_timestamp as i64,
                })
            }
            BlockRef::Group(g) => {
                let mut body_buf = &g.block[..];
                let header = BlockHeader::decode(&mut body_buf)?;
                Ok(Frame {
                    data: body_buf,
                    is_keyframe: g.reference_block.is_empty(),
                    is_invisible: (header.flags & 0x08) != 0,
                    is_discardable: false,
                    track_number: *header.track_number,
                    timestamp: cluster_ts as i64 + header.relative_timestamp as i64,
                })
            }
        }
    }
}

impl<'a> From<&'a SimpleBlock> for BlockRef<'a> {
    fn from(b: &'a SimpleBlock) -> Self {
        BlockRef::Simple(b)
    }
}
impl<'a> From<&'a BlockGroup> for BlockRef<'a> {
    fn from(b: &'a BlockGroup) -> Self {
        BlockRef::Group(b)
    }
}

impl Cluster {
    /// Frames carried by this cluster, in storage order (SimpleBlocks, then BlockGroups).
    ///
    /// Laced blocks are rejected with [`Error::LacedFrames`] rather than delaced: lacing is
    /// not supported by this crate.
    pub fn frames(&self) -> impl Iterator<Item = crate::Result<Frame<'_>>> + '_ {
        let ts = *self.timestamp;
        self.simple_block
            .iter()
            .map(BlockRef::from)
            .chain(self.block_group.iter().map(BlockRef::from))
            .map(move |b| b.into_frame(ts))
    }
}
