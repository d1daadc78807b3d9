// File intake: dedup, size validation and per-file upload progress for the
// resumes staged in the current session.

pub mod registry;

pub use registry::{AddOutcome, FileCandidate, FileKey, IntakeError, IntakeFile, IntakeRegistry};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Renders a byte count as B / KB / MB / GB, rounded to the nearest unit.
pub fn friendly_size(n: u64) -> String {
    if n < KB {
        format!("{n} B")
    } else if n < MB {
        format!("{} KB", round_div(n, KB))
    } else if n < GB {
        format!("{} MB", round_div(n, MB))
    } else {
        format!("{} GB", round_div(n, GB))
    }
}

fn round_div(n: u64, unit: u64) -> u64 {
    (n as f64 / unit as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendly_size_units() {
        assert_eq!(friendly_size(512), "512 B");
        assert_eq!(friendly_size(1536), "2 KB");
        assert_eq!(friendly_size(5 * MB), "5 MB");
        assert_eq!(friendly_size(GB), "1 GB");
    }

    #[test]
    fn test_friendly_size_boundary_rolls_to_next_unit() {
        assert_eq!(friendly_size(1023), "1023 B");
        assert_eq!(friendly_size(1024), "1 KB");
    }
}
