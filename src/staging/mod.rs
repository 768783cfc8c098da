/// Staging layer: named shared-memory segments and their teardown.
///
/// Lifecycle:
/// ```text
///   input file (L bytes)
///        │
///        ▼
///   ┌────────────────┐
///   │ StagingSegment │  create: exclusive namespace entry, exactly L bytes
///   └────────────────┘
///        │ name
///        ▼
///   ┌────────────────┐
///   │ AttachedSegment│  read-only mapping, never removes the entry
///   └────────────────┘
///        │
///        ▼
///   release (explicit, on drop, or from the interrupt handler via `guard`)
/// ```

pub mod guard;
pub mod segment;

pub use segment::{release_named, segment_name_for, AttachedSegment, StagingSegment};
