//! Protocol timeouts and fixed limits.

use std::time::Duration;

/// Timeout value meaning "wait indefinitely".
pub const WAIT_FOREVER: Duration = Duration::MAX;

/// Maximum number of thread objects that may exist at once.
pub const MAX_THREADS: usize = 1024;

/// Smallest explicit stack size; zero still means "platform default".
pub const MIN_STACK_SIZE: usize = 0x10000;

/// How long `start` waits for the new thread to reach its first checkpoint.
///
/// Debug builds wait long enough to step through a thread's startup in a
/// debugger without the starter giving up.
pub const START_TIMEOUT: Duration = if cfg!(debug_assertions) {
    Duration::from_secs(480)
} else {
    Duration::from_secs(30)
};

/// How long a paused thread waits to be released.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `release` waits for the target to confirm it resumed.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long dropping a still-running thread waits for it to exit.
pub const DROP_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest uninterrupted nap inside a cancelable sleep.
pub const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// Name given to the adopted process main thread.
pub const PRIMARY_THREAD_NAME: &str = "PrimaryThread";
