//! Stage raw binary numeric arrays in named shared memory and convert them
//! to Parquet tables.
//!
//! ```text
//!  input.bin ──► StagingSegment ──► AttachedSegment ──► Table ──► out.parquet
//!                     │                                              │
//!                     └──────────────── release ◄───────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod staging;
pub mod table;

pub use config::StagingConfig;
pub use error::{ConvertError, InputError, WriteError};
pub use pipeline::{run, ConvertRequest};
pub use staging::{AttachedSegment, StagingSegment};
pub use table::{Destination, ElementType, Shape, Table, WriteSummary};
