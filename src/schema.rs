//! The element-ID/name/type schema registry.
//!
//! This is a descriptive table, not a second decode path: the actual dispatch between an
//! element ID and its Rust type stays in the [`Element`](crate::element::Element) trait and the
//! `nested!` macro in [`master`](crate::master). [`ElementParser`](crate::parser::ElementParser)
//! consults this table to decide framing behavior (flat vs. recursive) and to name unknown IDs
//! for logging.

use crate::base::VInt64;

/// The wire type of an element's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// A master element: a concatenation of child elements.
    Master,
    /// An unsigned integer, big-endian, leading-zero-byte-trimmed.
    UInt,
    /// A signed integer, big-endian, sign-extended/trimmed.
    Int,
    /// An IEEE-754 big-endian float (4 or 8 bytes).
    Float,
    /// An ASCII string, null-terminated on decode.
    String,
    /// UTF-8 text, null-terminated on decode.
    Utf8,
    /// Signed nanoseconds since 2001-01-01T00:00:00 UTC.
    Date,
    /// Opaque binary data.
    Binary,
}

/// One row of the schema: an element's name, ID, type tag, and parsing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    /// The element's name, matching the Matroska specification's element names.
    pub name: &'static str,
    /// The element's ID, as a VINT preserving its canonical encoded width.
    pub id: VInt64,
    /// The element's payload type.
    pub tag: TypeTag,
    /// Whether this element is flat-parsed: the [`ElementParser`](crate::parser::ElementParser)
    /// consumes only its header and continues parsing children at the parent level, rather than
    /// buffering the entire payload before recursing.
    pub is_flat: bool,
}

macro_rules! entry {
    ($name:literal, $id:expr, $tag:ident) => {
        SchemaEntry {
            name: $name,
            id: VInt64::from_encoded($id),
            tag: TypeTag::$tag,
            is_flat: false,
        }
    };
    ($name:literal, $id:expr, $tag:ident, flat) => {
        SchemaEntry {
            name: $name,
            id: VInt64::from_encoded($id),
            tag: TypeTag::$tag,
            is_flat: true,
        }
    };
}

/// The full table of known Matroska/WebM elements.
///
/// `Segment` and `Cluster` are flat-parsed per the Matroska specification: they may be
/// gigabytes long and must stream rather than buffer. `Tags`, `Chapters`, and `Attachments`
/// are named here (so the registry can map their IDs to names and skip their payloads as
/// opaque binary) but are not modeled as typed masters in [`master`](crate::master) — this
/// crate does not build or interpret their content.
pub static SCHEMA: &[SchemaEntry] = &[
    // EBML header.
    entry!("EBML", 0x1A45DFA3, Master),
    entry!("EBMLVersion", 0x4286, UInt),
    entry!("EBMLReadVersion", 0x42F7, UInt),
    entry!("EBMLMaxIDLength", 0x42F2, UInt),
    entry!("EBMLMaxSizeLength", 0x42F3, UInt),
    entry!("DocType", 0x4282, String),
    entry!("DocTypeVersion", 0x4287, UInt),
    entry!("DocTypeReadVersion", 0x4285, UInt),
    // Segment and its top-level children.
    entry!("Segment", 0x18538067, Master, flat),
    entry!("SeekHead", 0x114D9B74, Master),
    entry!("Seek", 0x4DBB, Master),
    entry!("SeekID", 0x53AB, Binary),
    entry!("SeekPosition", 0x53AC, UInt),
    entry!("Info", 0x1549A966, Master),
    entry!("SegmentUUID", 0x73A4, Binary),
    entry!("TimestampScale", 0x2AD7B1, UInt),
    entry!("Duration", 0x4489, Float),
    entry!("DateUTC", 0x4461, Date),
    entry!("Title", 0x7BA9, Utf8),
    entry!("MuxingApp", 0x4D80, Utf8),
    entry!("WritingApp", 0x5741, Utf8),
    entry!("Tracks", 0x1654AE6B, Master),
    entry!("TrackEntry", 0xAE, Master),
    entry!("TrackNumber", 0xD7, UInt),
    entry!("TrackUID", 0x73C5, UInt),
    entry!("TrackType", 0x83, UInt),
    entry!("FlagLacing", 0x9C, UInt),
    entry!("CodecID", 0x86, String),
    entry!("CodecPrivate", 0x63A2, Binary),
    entry!("CodecDelay", 0x56AA, UInt),
    entry!("SeekPreRoll", 0x56BB, UInt),
    entry!("Audio", 0xE1, Master),
    entry!("SamplingFrequency", 0xB5, Float),
    entry!("Channels", 0x9F, UInt),
    entry!("BitDepth", 0x6264, UInt),
    entry!("Video", 0xE0, Master),
    entry!("PixelWidth", 0xB0, UInt),
    entry!("PixelHeight", 0xBA, UInt),
    entry!("FlagInterlaced", 0x9A, UInt),
    entry!("Colour", 0x55B0, Master),
    entry!("Cluster", 0x1F43B675, Master, flat),
    entry!("Timestamp", 0xE7, UInt),
    entry!("Position", 0xA7, UInt),
    entry!("PrevSize", 0xAB, UInt),
    entry!("SimpleBlock", 0xA3, Binary),
    entry!("BlockGroup", 0xA0, Master),
    entry!("Block", 0xA1, Binary),
    entry!("BlockDuration", 0x9B, UInt),
    entry!("ReferencePriority", 0xFA, UInt),
    entry!("ReferenceBlock", 0xFB, Int),
    entry!("Cues", 0x1C53BB6B, Master),
    entry!("CuePoint", 0xBB, Master),
    entry!("CueTime", 0xB3, UInt),
    entry!("CueTrackPositions", 0xB7, Master),
    entry!("CueTrack", 0xF7, UInt),
    entry!("CueClusterPosition", 0xF1, UInt),
    entry!("CueRelativePosition", 0xF0, UInt),
    // Named but not modeled: out of this crate's scope.
    entry!("Tags", 0x1254C367, Master),
    entry!("Chapters", 0x1043A770, Master),
    entry!("Attachments", 0x1941A469, Master),
    // EBML supplementary elements.
    entry!("CRC-32", 0xBF, Binary),
    entry!("Void", 0xEC, Binary),
];

/// Look up a schema entry by its element ID.
///
/// Returns `None` for unknown IDs; callers should treat unknown elements as opaque binary and
/// keep their payload rather than erroring, per this crate's tolerant-unknown-element policy.
pub fn lookup(id: VInt64) -> Option<&'static SchemaEntry> {
    SCHEMA.iter().find(|e| e.id == id)
}

/// Look up a schema entry by its element name.
pub fn lookup_by_name(name: &str) -> Option<&'static SchemaEntry> {
    SCHEMA.iter().find(|e| e.name == name)
}

/// Whether `id` names an element this crate flat-parses (`Segment`, `Cluster`).
pub fn is_flat(id: VInt64) -> bool {
    lookup(id).is_some_and(|e| e.is_flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_and_cluster_are_flat() {
        assert!(is_flat(VInt64::from_encoded(0x18538067)));
        assert!(is_flat(VInt64::from_encoded(0x1F43B675)));
        assert!(!is_flat(VInt64::from_encoded(0x1549A966)));
    }

    #[test]
    fn unknown_id_has_no_entry() {
        assert!(lookup(VInt64::from_encoded(0x7F7F7F7F)).is_none());
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for entry in SCHEMA {
            assert_eq!(lookup(entry.id).unwrap().name, entry.name);
            assert_eq!(lookup_by_name(entry.name).unwrap().id, entry.id);
        }
    }
}
