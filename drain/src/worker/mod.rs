/// The poll / handle / delete loop and its builder.
pub mod batch;
/// Cooperative shutdown signalling.
pub mod shutdown;
/// Per-run counters, stop reasons and the final summary.
pub mod state;

pub use batch::{BatchWorker, BatchWorkerBuilder};
pub use shutdown::{spawn_signal_listener, ShutdownToken};
pub use state::{RunState, RunSummary, StopReason};
