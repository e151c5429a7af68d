use serde::{Deserialize, Serialize};

/// Inclusive range of projection years at yearly granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Returns `None` when `start > end`
    #[must_use]
    pub fn new(start: i32, end: i32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }

    #[must_use]
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_range_rejected() {
        assert!(YearRange::new(2031, 2030).is_none());
    }

    #[test]
    fn test_single_year_range() {
        let range = YearRange::new(2030, 2030).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.years().collect::<Vec<_>>(), vec![2030]);
        assert!(range.contains(2030));
        assert!(!range.contains(2031));
    }
}
