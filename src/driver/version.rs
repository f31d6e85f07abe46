use std::cmp::Ordering;
use std::fmt;

macro_rules! v {
    ($major:expr, $minor:expr) => {
        $crate::driver::Version {
            major: $major,
            minor: $minor,
        }
    };
}

/// Interface version a driver implements.
///
/// Drivers are compatible with the library when their major versions match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: usize,
    pub minor: usize,
}

impl Version {
    /// Version of the driver interface this crate expects.
    pub const CURRENT: Version = v!(7, 1);

    pub fn is_compatible(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => self.minor.cmp(&other.minor),
            ord => ord,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
