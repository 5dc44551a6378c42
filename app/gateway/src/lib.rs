//! Sune gateway — streaming LLM proxy with resumable runs.
//!
//! One run per uid: a server-mediated streaming call to an upstream LLM,
//! fanned out to every connected socket for that uid, durably buffered in
//! a short-TTL delta log so reconnecting and polling clients resume
//! without data loss.

pub mod config;
pub mod dispatch;
pub mod feature;
pub mod protocol;
pub mod run;
pub mod state;

pub use config::Config;
pub use dispatch::{DriveStream, Driver, HttpDriver};
pub use run::{
    BATCH_BYTES, BATCH_MS, BeginError, BeginRequest, Coordinator, Delta, DeltaLog, MAX_RUN_MS,
    Snapshot, timeout_message,
};
pub use state::AppState;
