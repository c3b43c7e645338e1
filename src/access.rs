//! Access layer: the tuple data model and heap table files.

pub mod heap;
pub mod tuple;

pub use heap::{DbFile, DbFileIterator, HeapFile, HeapFileIterator};
pub use tuple::{Field, RecordId, Tuple, TupleDesc, Type};
