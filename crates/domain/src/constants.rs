//! Fixed tables shared by the queue: kind priorities and retry backoff.

use std::time::Duration;

/// Maximum attempts before an operation becomes terminal-failed.
pub const DEFAULT_ATTEMPT_LIMIT: i32 = 3;

/// Priority assigned to unrecognized operation kinds. Unknown kinds are
/// accepted rather than rejected so no locally-recorded intent is dropped;
/// they simply sort after every known kind.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Retry delays indexed by `attempt - 1`. The last entry is reused for all
/// further attempts. Values are fixed and unjittered so retry timing stays
/// deterministic under test.
pub const BACKOFF_SCHEDULE: [Duration; 5] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(60),
    Duration::from_secs(300),
];

/// Resolve the dispatch priority for a business-intent tag. Lower values
/// are serviced first.
pub fn priority_for_kind(kind: &str) -> i32 {
    match kind {
        "completion" => 1,
        "status_change" => 2,
        "waste" => 3,
        "attachment" => 4,
        "note" => 5,
        _ => DEFAULT_PRIORITY,
    }
}
