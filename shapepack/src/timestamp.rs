//! The msgpack timestamp extension value.

use core::fmt;

use crate::errors::Error;

/// A point in time as seconds and nanoseconds relative to the Unix epoch.
///
/// On the wire this is extension type −1 in one of its three canonical
/// sizes; the writer picks the smallest form that loses nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// The Unix epoch.
    pub const UNIX_EPOCH: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Builds a timestamp; `nanos` must stay below one second.
    pub fn new(secs: i64, nanos: u32) -> Result<Self, Error> {
        if nanos >= 1_000_000_000 {
            return Err(Error::invalid_operation(
                "timestamp nanoseconds must be less than 1e9",
            ));
        }
        Ok(Timestamp { secs, nanos })
    }

    /// A whole-second timestamp.
    pub fn from_seconds(secs: i64) -> Self {
        Timestamp { secs, nanos: 0 }
    }

    /// Seconds since the epoch. Negative values are before 1970.
    pub fn seconds(&self) -> i64 {
        self.secs
    }

    /// The sub-second component.
    pub fn nanoseconds(&self) -> u32 {
        self.nanos
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            write!(f, "{}s", self.secs)
        } else {
            write!(f, "{}s+{}ns", self.secs, self.nanos)
        }
    }
}
