//! Query operators.
//!
//! Operators share one cursor contract, [`OpIterator`]: open, pull tuples
//! with `has_next`/`next`, optionally `rewind`, and `close`. The state
//! machine matters — `rewind` restarts the stream, and pulling from an
//! unopened or closed operator reports `NoSuchElement` rather than
//! panicking.

pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod predicate;
pub mod seq_scan;
pub mod tuple_iterator;

pub use aggregate::{AggOp, IntegerAggregator, StringAggregator};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use predicate::{CmpOp, Predicate};
pub use seq_scan::SeqScan;
pub use tuple_iterator::TupleIterator;

use crate::access::tuple::{Tuple, TupleDesc};
use crate::error::DbResult;

/// Cursor-style tuple stream.
pub trait OpIterator: Send {
    fn open(&mut self) -> DbResult<()>;

    fn has_next(&mut self) -> DbResult<bool>;

    /// The next tuple; `NoSuchElement` when exhausted, unopened, or closed.
    fn next(&mut self) -> DbResult<Tuple>;

    /// Restarts the stream from the first tuple.
    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    /// Schema of the tuples this operator produces.
    fn tuple_desc(&self) -> &TupleDesc;
}
