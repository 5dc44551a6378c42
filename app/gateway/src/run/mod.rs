//! Run lifecycle: the per-uid state machine and its persisted projection.

pub use coordinator::{
    BATCH_BYTES, BATCH_MS, BeginError, BeginRequest, Coordinator, MAX_RUN_MS, Run, timeout_message,
};
pub use log::{Delta, DeltaLog, Snapshot};

mod coordinator;
mod log;
