//! Tunables for the multiplexer loop.

use std::time::Duration;

/// Default wait for a readiness poll before handoffs are checked again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default maximum number of bytes read from a source at once.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Settings for a merge.
///
/// ```
/// use std::time::Duration;
/// use pipemux::MuxConfig;
///
/// let config = MuxConfig::new()
///     .with_poll_interval(Duration::from_millis(50))
///     .with_chunk_size(4096);
/// assert_eq!(config.chunk_size(), 4096);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MuxConfig {
    poll_interval: Duration,
    chunk_size: usize,
}

impl MuxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long one readiness poll may wait.
    ///
    /// Shorter intervals admit newly opened sources sooner at the cost of more
    /// wakeups.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the read size per ready source. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        MuxConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MuxConfig::default();

        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.chunk_size(), 65536);
    }

    #[test]
    fn test_zero_chunk_size() {
        assert_eq!(MuxConfig::new().with_chunk_size(0).chunk_size(), 1);
    }
}
