//! Screen controllers for the group list and group detail screens.

pub mod detail;
pub mod list;

pub use detail::GroupDetailController;
pub use list::{EmptyState, GroupListController};

/// Geometry of a scrollable region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: u32,
    pub client_height: u32,
    pub scroll_height: u32,
}

impl ScrollMetrics {
    pub fn new(scroll_top: u32, client_height: u32, scroll_height: u32) -> Self {
        Self {
            scroll_top,
            client_height,
            scroll_height,
        }
    }

    /// Within `threshold` pixels of the bottom.
    pub fn is_near_bottom(&self, threshold: u32) -> bool {
        self.scroll_top
            .saturating_add(self.client_height)
            .saturating_add(threshold)
            >= self.scroll_height
    }
}

/// Why a page request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotNearBottom,
    /// The screen's initial fetch has not finished
    Loading,
    Exhausted,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { added: usize, exhausted: bool },
    Skipped(SkipReason),
    /// The response arrived after a newer request replaced it and was dropped
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_bottom_threshold() {
        // 600 + 370 + 30 == 1000
        assert!(ScrollMetrics::new(600, 370, 1000).is_near_bottom(30));
        assert!(!ScrollMetrics::new(600, 369, 1000).is_near_bottom(30));
        assert!(ScrollMetrics::new(0, 400, 200).is_near_bottom(30));
        assert!(ScrollMetrics::new(u32::MAX, u32::MAX, u32::MAX).is_near_bottom(30));
    }
}
