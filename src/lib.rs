#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
//! A Matroska/WebM muxer and demuxer.
//!
//! This crate implements the EBML codec, the Matroska element schema, a
//! streaming demuxer state machine, and a muxer scheduler for files carrying
//! one Opus audio track and/or one or more VP8/VP9/H.264 video tracks.
//! Transport I/O, codec-level bitstream decoding, and seeking-while-reading
//! are left to the host application; see [`iface`] for the boundary.

/// Error types for this crate.
mod error;
mod functional;
pub use error::*;

/// I/O utilities.
pub mod io;

/// base types for Matroska elements. ie. `VInt64`, `Header`, etc.
mod base;
/// Frame extraction from SimpleBlock/BlockGroup payloads.
mod frame;
/// Leaf elements in Matroska.
mod leaf;
/// Master elements in Matroska.
mod master;
/// Supplementary elements in Matroska. Void elements, CRC-32, etc.
///
/// These elements are not from the Matroska specification, but Matroska specifications inherit them from EBML specifications.
mod supplement;
// Element body definitions and traits.
mod element;

/// The element-ID/name/type schema registry.
pub mod schema;

/// Codec identification, wire strings, and keyframe detection.
pub mod codecs;

/// The incremental, schema-driven element parser.
pub mod parser;

/// Element and cluster serialization helpers.
pub mod serializer;

/// The track/block data model shared by the muxer and demuxer.
pub mod track;

/// Sink/source boundary traits (backpressure, seek-and-rewrite).
pub mod iface;

/// The streaming demuxer state machine.
pub mod demux;

/// The muxing scheduler.
pub mod mux;

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::base::*;
    pub use crate::codecs::*;
    pub use crate::demux::*;
    pub use crate::element::*;
    pub use crate::frame::*;
    pub use crate::iface::*;
    pub use crate::leaf::*;
    pub use crate::master::*;
    pub use crate::mux::*;
    pub use crate::parser::*;
    pub use crate::schema::*;
    pub use crate::serializer::*;
    pub use crate::supplement::*;
    pub use crate::track::*;
}
