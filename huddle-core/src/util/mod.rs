mod id;

pub use id::*;

use std::time::Duration;

/// Whole seconds left of `duration`, rounded up so a pending wait is never reported as zero.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();

    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
