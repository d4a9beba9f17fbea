//! Engine-wide tuning constants.

use std::time::Duration;

/// Period of the executor's cleanup pass.
pub const CLEANUP_PERIOD: Duration = Duration::from_secs(2);

/// How long a stopped action may keep running before its worker is abandoned.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(4);
