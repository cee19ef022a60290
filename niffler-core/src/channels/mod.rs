//! Channel Fabric (spec §4.1): typed mailboxes connecting the CLI, API
//! worker, and Tool worker, plus one broadcast shutdown signal.
//!
//! All mailboxes are bounded MPSC (`tokio::sync::mpsc`); the shutdown signal
//! is a level-triggered `tokio::sync::watch<bool>` so every worker reads the
//! same current state rather than consuming a one-shot event. Messages that
//! expect a reply carry a correlation id (`Uuid`) in their own type; the
//! fabric itself does not interpret payloads.

mod fabric;
mod shutdown;

pub use fabric::{ChannelFabric, FabricError};
pub use shutdown::{Shutdown, ShutdownHandle};

/// Default bound for request/response mailboxes. Chosen so a worker that is
/// mid-turn can still accept a shutdown notice without the sender blocking
/// for long; actual backpressure is expected to be rare since the tool
/// worker and API worker each process one request at a time.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Poll interval workers use when racing a mailbox receive against the
/// shutdown watch, so that even a `select!` implementation without native
/// wakeup coalescing still notices shutdown promptly (spec §4.1, §5).
pub const SHUTDOWN_POLL: std::time::Duration = std::time::Duration::from_millis(50);
