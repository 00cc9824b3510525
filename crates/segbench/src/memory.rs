//! Peak resident memory of the benchmark process.
//!
//! Reads `VmRSS` and `VmHWM` from `/proc/self/status`. On platforms without
//! procfs every reading is zero.

use std::fs;

const STATUS_PATH: &str = "/proc/self/status";
const CLEAR_REFS_PATH: &str = "/proc/self/clear_refs";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Tracks peak RSS growth from the moment it was started.
#[derive(Debug, Clone, Copy)]
pub struct MemoryProbe {
    baseline_bytes: u64,
}

impl MemoryProbe {
    /// Reset the kernel's high-water mark and record the current RSS.
    pub fn start() -> Self {
        // Writing 5 resets VmHWM to the current RSS (Linux 4.0+).
        if let Err(err) = fs::write(CLEAR_REFS_PATH, "5") {
            tracing::debug!(error = %err, "could not reset peak RSS");
        }

        Self {
            baseline_bytes: read_status_field("VmRSS").unwrap_or(0),
        }
    }

    /// Peak RSS above the baseline, in MiB.
    pub fn peak_delta_mb(&self) -> f64 {
        let peak = read_status_field("VmHWM").unwrap_or(0);
        peak.saturating_sub(self.baseline_bytes) as f64 / BYTES_PER_MB
    }
}

fn read_status_field(field: &str) -> Option<u64> {
    let status = fs::read_to_string(STATUS_PATH).ok()?;
    parse_status_field(&status, field)
}

/// Value of a `Name:   1234 kB` line, in bytes.
fn parse_status_field(status: &str, field: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim() != field {
            return None;
        }
        let kilobytes: u64 = value.split_whitespace().next()?.parse().ok()?;
        Some(kilobytes * 1024)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tsegbench\nVmPeak:\t  900 kB\nVmHWM:\t    2048 kB\nVmRSS:\t    1024 kB\n";

    #[test]
    fn status_fields_are_read_in_bytes() {
        assert_eq!(parse_status_field(STATUS, "VmHWM"), Some(2048 * 1024));
        assert_eq!(parse_status_field(STATUS, "VmRSS"), Some(1024 * 1024));
    }

    #[test]
    fn missing_field_is_none() {
        assert_eq!(parse_status_field(STATUS, "VmSwap"), None);
    }

    #[test]
    fn peak_delta_is_never_negative() {
        let probe = MemoryProbe {
            baseline_bytes: u64::MAX,
        };

        assert_eq!(probe.peak_delta_mb(), 0.0);
    }
}
