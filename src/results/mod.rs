//! From driver rows to caller-visible records.

mod assembler;
mod bounds;
mod nested;
mod row;

pub use assembler::{RecordStream, ResultStreamAssembler, Step};
pub use bounds::{BoundedStream, RowBounds, RowBudget};
pub use nested::{GroupKey, RowMapper};
pub use row::{Columns, DbRow};
