//! Consolidation summary types

use std::fmt;
use std::path::PathBuf;

/// Rows removed by deduplication
///
/// `NotApplicable` means the identity column was absent, so nothing could be
/// deduplicated. It is reported as `N/A`, never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCount {
    Count(usize),
    NotApplicable,
}

impl DuplicateCount {
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(*n),
            Self::NotApplicable => None,
        }
    }
}

impl fmt::Display for DuplicateCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so width and alignment specifiers apply
        match self {
            Self::Count(n) => f.pad(&n.to_string()),
            Self::NotApplicable => f.pad("N/A"),
        }
    }
}

/// One row of the cross-site report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationSummary {
    pub site: String,
    pub raw_total: usize,
    pub duplicates: DuplicateCount,
    pub unique_total: usize,
    pub with_price: usize,
    pub output_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_count_display() {
        assert_eq!(DuplicateCount::Count(3).to_string(), "3");
        assert_eq!(DuplicateCount::NotApplicable.to_string(), "N/A");
        assert_eq!(format!("{:<5}|", DuplicateCount::NotApplicable), "N/A  |");
        assert_eq!(format!("{:<5}|", DuplicateCount::Count(12)), "12   |");
    }

    #[test]
    fn test_not_applicable_is_not_zero() {
        assert_ne!(DuplicateCount::NotApplicable, DuplicateCount::Count(0));
        assert_eq!(DuplicateCount::NotApplicable.count(), None);
        assert_eq!(DuplicateCount::Count(0).count(), Some(0));
    }
}
