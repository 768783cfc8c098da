/// Table layer: typed interpretation of staged bytes and Parquet output.
///
/// Architecture:
/// ```text
///   segment bytes + Shape + ElementType
///        │
///        ▼
///   ┌───────────┐
///   │ TypedView │  validate byte count, borrow (no copy)
///   └───────────┘
///        │ to_local
///        ▼
///   ┌────────────┐
///   │ LocalArray │  process-local copy
///   └────────────┘
///        │
///        ▼
///   ┌─────────┐
///   │  Table  │  RecordBatch: `value` or `0..n` columns
///   └─────────┘
///        │
///        ▼
///   ┌─────────┐
///   │ writer  │  single-row-group Parquet, atomic rename
///   └─────────┘
/// ```

pub mod builder;
pub mod dtype;
pub mod reader;
pub mod shape;
pub mod view;
pub mod writer;

pub use builder::{convert, convert_bytes, SourceInfo, Table};
pub use dtype::ElementType;
pub use shape::Shape;
pub use view::{LocalArray, TypedView};
pub use writer::{write_table, Destination, WriteSummary};
