//! Inclusive block windows.

/// An inclusive `[from, to]` block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block, inclusive.
    pub from: u64,
    /// Last block, inclusive.
    pub to: u64,
}

impl BlockRange {
    /// Lower bound of the range that follows this one.
    #[must_use]
    pub const fn next_lower(self) -> u64 {
        self.to.saturating_add(1)
    }
}

/// Next window starting at `lower`, capped at `lower + window` and at
/// `head`. `None` while the chain has not reached `lower`.
#[must_use]
pub fn next_range(lower: u64, head: u64, window: u64) -> Option<BlockRange> {
    if head < lower {
        return None;
    }
    Some(BlockRange {
        from: lower,
        to: lower.saturating_add(window).min(head),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_caps_upper_bound() {
        assert_eq!(next_range(90, 100, 5), Some(BlockRange { from: 90, to: 95 }));
        assert_eq!(next_range(96, 100, 5), Some(BlockRange { from: 96, to: 100 }));
    }

    #[test]
    fn head_caps_upper_bound() {
        assert_eq!(next_range(99, 100, 5), Some(BlockRange { from: 99, to: 100 }));
        assert_eq!(next_range(100, 100, 5), Some(BlockRange { from: 100, to: 100 }));
    }

    #[test]
    fn nothing_to_do_below_lower_bound() {
        assert_eq!(next_range(101, 100, 5), None);
    }

    #[test]
    fn consecutive_ranges_are_contiguous() {
        let mut lower = 0;
        let mut covered = Vec::new();
        while let Some(range) = next_range(lower, 37, 5) {
            covered.extend(range.from..=range.to);
            lower = range.next_lower();
        }
        assert_eq!(covered, (0..=37).collect::<Vec<_>>());
    }

    #[test]
    fn saturates_at_top_of_range() {
        let range = next_range(u64::MAX - 1, u64::MAX, 5);
        assert_eq!(range, Some(BlockRange { from: u64::MAX - 1, to: u64::MAX }));
        assert_eq!(range.map(BlockRange::next_lower), Some(u64::MAX));
    }
}
