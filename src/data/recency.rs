//! Coarse "time since last sample" buckets.

use std::fmt;
use std::time::Duration;

/// How long ago something happened, rounded down to a display bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    /// Under 5 seconds.
    JustNow,
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
}

impl Recency {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let secs = elapsed.as_secs();
        if secs < 5 {
            Recency::JustNow
        } else if secs < 60 {
            Recency::Seconds(secs)
        } else if secs < 3600 {
            Recency::Minutes(secs / 60)
        } else {
            Recency::Hours(secs / 3600)
        }
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recency::JustNow => f.write_str("just now"),
            Recency::Seconds(n) => write!(f, "{n}s ago"),
            Recency::Minutes(n) => write!(f, "{n}m ago"),
            Recency::Hours(n) => write!(f, "{n}h ago"),
        }
    }
}
