//! Item types, sequence types and the atomic type hierarchy.

mod atomic;
mod item_type;
mod sequence_type;

pub use atomic::{AtomicOrUnionType, lookup_atomic_type, lookup_cast_target};
pub use item_type::{ItemType, KindTest, NameTest};
pub use sequence_type::{Occurrence, SequenceType};
