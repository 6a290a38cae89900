//! The Configuration shared by all the Reclamation-Schemes

use crate::{Error, Result};

/// The Configuration of a single Reclamation-Domain
///
/// # Example
/// ```rust
/// # use lfcds::Config;
/// let config = Config::default()
///     .with_hazards_per_thread(2)
///     .with_scan_threshold(128);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    hazards_per_thread: usize,
    scan_threshold: usize,
}

impl Config {
    /// The largest number of Hazard-Slots a single Thread can own
    pub const MAX_HAZARDS_PER_THREAD: usize = 64;

    /// The Configuration used by [`Config::default`]
    pub const fn new() -> Self {
        Self {
            hazards_per_thread: 4,
            scan_threshold: 64,
        }
    }

    /// Sets the Number of Hazard-Slots every Thread owns, which is the maximum number of Guards
    /// a single Thread can hold at the same time
    pub const fn with_hazards_per_thread(mut self, count: usize) -> Self {
        self.hazards_per_thread = count;
        self
    }

    /// Sets the minimum number of retired Nodes a Thread collects before it attempts to
    /// reclaim them.
    ///
    /// A larger Threshold results in fewer Scans, but more Memory is held by Nodes that are
    /// waiting to be reclaimed
    pub const fn with_scan_threshold(mut self, threshold: usize) -> Self {
        self.scan_threshold = threshold;
        self
    }

    /// The Number of Hazard-Slots per Thread
    pub const fn hazards_per_thread(&self) -> usize {
        self.hazards_per_thread
    }

    /// The minimum Scan-Threshold
    pub const fn scan_threshold(&self) -> usize {
        self.scan_threshold
    }

    /// Checks if the Configuration can actually be used
    pub fn validate(&self) -> Result<()> {
        if self.hazards_per_thread == 0 {
            return Err(Error::InvalidConfig(
                "every thread needs at least one hazard slot",
            ));
        }
        if self.hazards_per_thread > Self::MAX_HAZARDS_PER_THREAD {
            return Err(Error::InvalidConfig(
                "at most 64 hazard slots per thread are supported",
            ));
        }
        if self.scan_threshold == 0 {
            return Err(Error::InvalidConfig("the scan threshold must not be zero"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
