//! Time source abstracted out so interpreter timeouts and tick scheduling
//! are testable without a real clock.
//!
//! Grounded on `wrldbldr-engine-ports/src/outbound/clock_port.rs`.

use chrono::{DateTime, Utc};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_unix_secs(&self) -> i64 {
        self.now().timestamp()
    }

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
