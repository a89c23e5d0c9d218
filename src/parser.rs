//! The incremental, schema-driven element parser.
//!
//! Maintains a stateful, append-only input buffer. Each call to [`ElementParser::parse`]
//! decodes as many complete elements as the buffered bytes allow and leaves any partial
//! element in the residue for the next [`feed`](ElementParser::feed)/`parse` round. `Segment`
//! and `Cluster` are flat-parsed per the schema registry: only their header is consumed, and
//! their children are parsed at the parent level rather than buffered whole — essential since a
//! Segment may be gigabytes and Clusters must stream.

use crate::Error;
use crate::base::Header;
use crate::element::Element;
use crate::functional::{Buf, Decode};
use crate::leaf::{PrevSize, Position, SimpleBlock, Timestamp};
use crate::master::{BlockGroup, Cues, Ebml, Info, SeekHead, Tracks};
use crate::master::{Cluster, Segment};
use crate::schema;
use crate::supplement::{Crc32, Void};

/// One element fully decoded by the parser.
///
/// `SegmentStart`/`ClusterStart` mark the point where a flat-parsed master's header was
/// consumed; no corresponding "end" event is produced — the parser's caller tracks context
/// (e.g. "what is the current cluster's timestamp") from the stream of events itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedElement {
    /// The EBML header element.
    Ebml(Ebml),
    /// The Segment header was consumed; its children follow as subsequent events.
    SegmentStart,
    /// A SeekHead child of Segment.
    SeekHead(SeekHead),
    /// The Info child of Segment.
    Info(Info),
    /// The Tracks child of Segment.
    Tracks(Tracks),
    /// The Cues child of Segment.
    Cues(Cues),
    /// A Cluster header was consumed; its children follow as subsequent events, until an
    /// element not belonging to the Cluster context is seen.
    ClusterStart,
    /// A Cluster's Timestamp child.
    ClusterTimestamp(Timestamp),
    /// A Cluster's Position child.
    ClusterPosition(Position),
    /// A Cluster's PrevSize child.
    ClusterPrevSize(PrevSize),
    /// A SimpleBlock inside a Cluster.
    SimpleBlock(SimpleBlock),
    /// A BlockGroup inside a Cluster.
    BlockGroup(BlockGroup),
    /// A Void padding element, at any nesting level.
    Void(Void),
    /// A CRC-32 element, at any nesting level the schema allows one.
    Crc32(Crc32),
    /// An element whose ID the schema does not recognize in the current context. Its payload
    /// is retained as opaque binary so no data is lost.
    Unknown {
        /// The element's raw ID.
        id: crate::base::VInt64,
        /// The element's payload.
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlatKind {
    Segment,
    Cluster,
}

struct OpenFlat {
    kind: FlatKind,
    /// Absolute byte offset (in the overall parsed stream) where this element's payload ends.
    /// `None` for Segment, which this crate always treats as unknown-size.
    end: Option<u64>,
}

/// A stateful, append-only, incremental parser over the Matroska/EBML element stream.
pub struct ElementParser {
    residue: Vec<u8>,
    consumed_total: u64,
    stack: Vec<OpenFlat>,
}

impl Default for ElementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementParser {
    /// Create an empty parser with no buffered bytes.
    pub fn new() -> Self {
        Self {
            residue: Vec::new(),
            consumed_total: 0,
            stack: Vec::new(),
        }
    }

    /// Append newly arrived bytes to the parser's input buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.residue.extend_from_slice(bytes);
    }

    /// Bytes currently buffered but not yet decoded into an element (a partial element, or
    /// simply nothing having arrived yet).
    pub fn residue(&self) -> &[u8] {
        &self.residue
    }

    /// Decode as many complete elements as the buffered bytes allow.
    ///
    /// Returns the decoded elements in stream order. On return, every yielded element has been
    /// fully decoded; any partial element remains buffered in the residue for the next call.
    pub fn parse(&mut self) -> crate::Result<Vec<ParsedElement>> {
        let mut out = Vec::new();
        loop {
            let mut view: &[u8] = &self.residue;
            let start_len = view.len();
            let header = match Header::decode(&mut view) {
                Ok(h) => h,
                Err(Error::OutOfBounds) => break,
                Err(e) => return Err(e),
            };
            let header_len = start_len - view.len();

            if schema::is_flat(header.id) {
                let event = self.enter_flat(header, header_len as u64)?;
                self.residue.drain(0..header_len);
                self.consumed_total += header_len as u64;
                out.push(event);
                self.close_finished_contexts();
                continue;
            }

            if header.size.is_unknown {
                return Err(Error::ElementBodySizeUnknown(header.id));
            }
            let size = *header.size as usize;
            if view.remaining() < size {
                break;
            }

            let total_len = header_len + size;
            let context = self.stack.last().map(|o| o.kind);
            let payload = &self.residue[header_len..total_len];
            let parsed = decode_known(context, header.id, payload)?;
            self.residue.drain(0..total_len);
            self.consumed_total += total_len as u64;
            out.push(parsed);
            self.close_finished_contexts();
        }
        Ok(out)
    }

    fn enter_flat(&mut self, header: Header, header_len: u64) -> crate::Result<ParsedElement> {
        if header.id == Segment::ID {
            self.stack.push(OpenFlat {
                kind: FlatKind::Segment,
                end: None,
            });
            Ok(ParsedElement::SegmentStart)
        } else if header.id == Cluster::ID {
            if header.size.is_unknown {
                return Err(Error::ElementBodySizeUnknown(header.id));
            }
            // `end` is the absolute stream offset one past the Cluster's payload: the header
            // itself (id + size VInts) plus the declared payload size, counted from where this
            // Cluster started (consumed_total, before the header is folded in by the caller).
            let end = self.consumed_total + header_len + *header.size;
            self.stack.push(OpenFlat {
                kind: FlatKind::Cluster,
                end: Some(end),
            });
            Ok(ParsedElement::ClusterStart)
        } else {
            unreachable!("schema::is_flat only marks Segment and Cluster as flat")
        }
    }

    fn close_finished_contexts(&mut self) {
        while let Some(top) = self.stack.last() {
            match top.end {
                Some(end) if self.consumed_total >= end => {
                    self.stack.pop();
                }
                _ => break,
            }
        }
    }
}

fn decode_body_checked<T: Element>(payload: &[u8]) -> crate::Result<T> {
    let mut buf = payload;
    let value = match T::decode_body(&mut buf) {
        Ok(v) => v,
        Err(Error::OutOfBounds) => return Err(Error::OverDecode(T::ID)),
        Err(Error::ShortRead) => return Err(Error::UnderDecode(T::ID)),
        Err(e) => return Err(e),
    };
    if buf.has_remaining() {
        return Err(Error::UnderDecode(T::ID));
    }
    Ok(value)
}

fn decode_known(
    context: Option<FlatKind>,
    id: crate::base::VInt64,
    payload: &[u8],
) -> crate::Result<ParsedElement> {
    match context {
        None => {
            if id == Ebml::ID {
                Ok(ParsedElement::Ebml(decode_body_checked(payload)?))
            } else if id == Void::ID {
                Ok(ParsedElement::Void(decode_body_checked(payload)?))
            } else {
                Ok(unknown(id, payload))
            }
        }
        Some(FlatKind::Segment) => {
            if id == SeekHead::ID {
                Ok(ParsedElement::SeekHead(decode_body_checked(payload)?))
            } else if id == Info::ID {
                Ok(ParsedElement::Info(decode_body_checked(payload)?))
            } else if id == Tracks::ID {
                Ok(ParsedElement::Tracks(decode_body_checked(payload)?))
            } else if id == Cues::ID {
                Ok(ParsedElement::Cues(decode_body_checked(payload)?))
            } else if id == Void::ID {
                Ok(ParsedElement::Void(decode_body_checked(payload)?))
            } else if id == Crc32::ID {
                Ok(ParsedElement::Crc32(decode_body_checked(payload)?))
            } else {
                Ok(unknown(id, payload))
            }
        }
        Some(FlatKind::Cluster) => {
            if id == Timestamp::ID {
                Ok(ParsedElement::ClusterTimestamp(decode_body_checked(
                    payload,
                )?))
            } else if id == Position::ID {
                Ok(ParsedElement::ClusterPosition(decode_body_checked(
                    payload,
                )?))
            } else if id == PrevSize::ID {
                Ok(ParsedElement::ClusterPrevSize(decode_body_checked(
                    payload,
                )?))
            } else if id == SimpleBlock::ID {
                Ok(ParsedElement::SimpleBlock(decode_body_checked(payload)?))
            } else if id == BlockGroup::ID {
                Ok(ParsedElement::BlockGroup(decode_body_checked(payload)?))
            } else if id == Void::ID {
                Ok(ParsedElement::Void(decode_body_checked(payload)?))
            } else {
                Ok(unknown(id, payload))
            }
        }
    }
}

fn unknown(id: crate::base::VInt64, payload: &[u8]) -> ParsedElement {
    log::warn!("unknown element {id} ({}B) kept as opaque binary", payload.len());
    ParsedElement::Unknown {
        id,
        data: payload.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::Encode;
    use crate::leaf::{DocType, EbmlMaxIdLength, EbmlMaxSizeLength, MuxingApp, TimestampScale, WritingApp};

    fn sample_ebml() -> Vec<u8> {
        let ebml = Ebml {
            ebml_max_id_length: EbmlMaxIdLength(4),
            ebml_max_size_length: EbmlMaxSizeLength(8),
            doc_type: Some(DocType("webm".into())),
            ..Default::default()
        };
        let mut out = Vec::new();
        ebml.encode(&mut out).unwrap();
        out
    }

    fn sample_info() -> Info {
        Info {
            timestamp_scale: TimestampScale(1_000_000),
            muxing_app: MuxingApp("test-mux".into()),
            writing_app: WritingApp("test-mux".into()),
            ..Default::default()
        }
    }

    #[test]
    fn feeding_byte_at_a_time_eventually_yields_the_element() {
        let bytes = sample_ebml();
        let mut parser = ElementParser::new();
        let mut last = Vec::new();
        for b in &bytes {
            parser.feed(std::slice::from_ref(b));
            last = parser.parse().unwrap();
        }
        assert_eq!(last.len(), 1);
        assert!(matches!(last[0], ParsedElement::Ebml(_)));
    }

    #[test]
    fn segment_is_flat_and_streams_its_children() {
        let mut segment_body = Vec::new();
        sample_info().encode(&mut segment_body).unwrap();

        let mut stream = Vec::new();
        // Segment header with unknown size (0xFF), as this crate always emits.
        stream.extend_from_slice(&[0x18, 0x53, 0x80, 0x67, 0xFF]);
        stream.extend_from_slice(&segment_body);

        let mut parser = ElementParser::new();
        parser.feed(&stream);
        let events = parser.parse().unwrap();

        assert!(matches!(events[0], ParsedElement::SegmentStart));
        assert!(matches!(events[1], ParsedElement::Info(_)));
    }

    #[test]
    fn cluster_children_stream_without_buffering_the_whole_cluster() {
        let ts = Timestamp(0);
        let mut ts_bytes = Vec::new();
        ts.encode(&mut ts_bytes).unwrap();

        let mut cluster_body = ts_bytes;
        let block = SimpleBlock(vec![0x81, 0x00, 0x00, 0x80, b'x']);
        let mut block_bytes = Vec::new();
        block.encode(&mut block_bytes).unwrap();
        cluster_body.extend_from_slice(&block_bytes);

        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x1F, 0x43, 0xB6, 0x75]); // Cluster ID
        let mut size_buf = Vec::new();
        crate::base::VInt64::new(cluster_body.len() as u64)
            .encode(&mut size_buf)
            .unwrap();
        stream.extend_from_slice(&size_buf);
        stream.extend_from_slice(&cluster_body);

        let mut parser = ElementParser::new();
        parser.feed(&stream);
        let events = parser.parse().unwrap();

        assert!(matches!(events[0], ParsedElement::ClusterStart));
        assert!(matches!(events[1], ParsedElement::ClusterTimestamp(_)));
        assert!(matches!(events[2], ParsedElement::SimpleBlock(_)));
    }
}
