//! rev-pack packs the storage layer of a document database's
//! revision-tracking subsystem.
//!
//! Two cores live here:
//!
//! - A compact tagged binary value encoding. The [`ValueEncoder`] turns a
//!   stream of typed value events into a forward-written buffer with
//!   intra-document string sharing, cross-document extern-string interning,
//!   and a per-dict key-hash index; the [`Parser`] walks an encoded buffer
//!   back into [`Element`]s.
//! - The [`RevTree`]: an in-memory DAG of document revisions with a fixed
//!   big-endian serialization, HTTP-style insertion semantics, pruning and
//!   purging, and delta-compressed bodies.
//!
//! Everything is single-threaded and synchronous; the enclosing store owns
//! concurrency, durability, and document checksums.

mod delta;
mod element;
mod encode;
mod error;
mod integer;
mod marker;
mod rev_tree;
mod revid;
mod varint;
mod writer;

pub use delta::{apply_delta, create_delta};
pub use element::{Element, Parser};
pub use encode::{hash_code, ValueEncoder};
pub use error::{Error, Result};
pub use integer::Integer;
pub use marker::Marker;
pub use rev_tree::{BodyLoader, InsertStatus, NoLoader, RevTree, Revision, NO_PARENT};
pub use revid::RevId;
pub use writer::Writer;

/// Strings shorter than this are never shared within a document; the
/// reference would cost as much as the string.
pub const MIN_SHARED_STRING_LEN: usize = 4;
/// Strings longer than this are never shared within a document.
pub const MAX_SHARED_STRING_LEN: usize = 100;
/// The most revisions a tree can hold: indexes are 16-bit, with `0xFFFF`
/// reserved to mean "none".
pub const MAX_REVS: usize = 65535;
