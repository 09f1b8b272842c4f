//! Journaled storage for Gentle.
//!
//! [`SnapshotIndex`] wraps any [`DataStore`](gentle_store::DataStore) and
//! indexes both its content and pointer spaces with a persistent 16-way
//! radix tree. Tree nodes are themselves content blobs, so every change
//! produces a fresh root without touching old nodes, and each root is
//! recorded in a chained, checksummed [`SnapshotRecord`].
//!
//! # Key Types
//!
//! - [`SnapshotIndex`] -- the journaled store; implements `DataStore`
//! - [`SnapshotView`] -- read-only access to any past snapshot
//! - [`SnapshotRecord`] -- `{timestamp, previous, root}` in a fixed binary layout
//! - [`Node`] / [`Entry`] -- tree nodes and the entries in their leaves
//!
//! # Tree Shape
//!
//! A node is a leaf iff its subtree holds at most [`LEAF_CAPACITY`] entries.
//! Inserting a sixteenth entry into a leaf splits it into 16 children keyed
//! by the next hex digit of each identifier; deleting below the threshold
//! collapses an internal node back into a leaf. Every internal node carries
//! the entry count of its subtree, checked whenever the subtree is read in
//! full.

pub mod index;
pub mod node;
pub mod record;
mod tree;
pub mod view;

pub use index::{SnapshotIndex, SNAPSHOT_POINTER};
pub use node::{Entry, Node, FANOUT, LEAF_CAPACITY};
pub use record::{SnapshotRecord, SNAPSHOT_MAGIC, SNAPSHOT_RECORD_LEN, SNAPSHOT_VERSION};
pub use view::SnapshotView;
