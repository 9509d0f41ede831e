//! Process memory sampling for the optional memory column.
//!
//! Readings come from `/proc/self/statm` on Linux; other platforms report
//! nothing and the column stays empty.

/// Samples resident memory and remembers the peak
#[derive(Debug, Clone, Default)]
pub struct MemorySampler {
    peak_bytes: u64,
    last_bytes: Option<u64>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reading, returning resident bytes when available
    pub fn sample(&mut self) -> Option<u64> {
        let bytes = process_memory_bytes();
        if let Some(b) = bytes {
            self.peak_bytes = self.peak_bytes.max(b);
        }
        self.last_bytes = bytes;
        bytes
    }

    /// Last reading in megabytes
    pub fn last_mb(&self) -> Option<f64> {
        self.last_bytes.map(bytes_to_mb)
    }

    /// Highest reading so far, `None` if nothing was ever read
    pub fn peak_bytes(&self) -> Option<u64> {
        if self.peak_bytes > 0 {
            Some(self.peak_bytes)
        } else {
            None
        }
    }
}

#[inline]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Resident set size of this process in bytes
#[cfg(target_os = "linux")]
pub fn process_memory_bytes() -> Option<u64> {
    // Format: size resident shared text lib data dt, in pages
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(rss_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
pub fn process_memory_bytes() -> Option<u64> {
    None
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
