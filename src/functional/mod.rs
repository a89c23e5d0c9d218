//! Small, dependency-free traits this crate builds its codec on: a read-only
//! `Buf` slice cursor and a growable `BufMut` sink that (unlike `bytes::BufMut`)
//! can seek backwards to patch a previously-written size, plus `Decode`/`Encode`
//! over those.

mod buf;
mod coding;

pub use buf::*;
pub use coding::*;
