//! Stable exit codes for the `workpanel` binary.

/// Clean quit (state flushed).
pub const OK: i32 = 0;
/// Workflow file missing, unparsable, or schema-invalid.
pub const LOAD_ERROR: i32 = 1;
/// Unexpected runtime error (terminal IO failure, engine startup, ...).
pub const RUNTIME_ERROR: i32 = 2;
