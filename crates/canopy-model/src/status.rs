//! Page load status state machine
//!
//! ```text
//! Preload
//!   ↓ navigation starts
//! Loading
//!   ↓ navigation completes
//! Complete
//!   ↓ re-navigation
//! Loading
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Tab reported by the browser but no navigation observed yet
    Preload,
    /// A navigation is in flight
    Loading,
    /// Last observed navigation finished (also the resting state of
    /// hibernated pages)
    Complete,
}

impl PageStatus {
    /// Check if transition to another status is valid
    pub fn can_transition_to(&self, target: PageStatus) -> bool {
        match (self, target) {
            (PageStatus::Preload, PageStatus::Loading) => true,
            // A page can complete without an observed loading event
            (PageStatus::Preload, PageStatus::Complete) => true,
            (PageStatus::Loading, PageStatus::Complete) => true,
            // Re-navigation of a settled page
            (PageStatus::Complete, PageStatus::Loading) => true,
            // Same status is always valid (no-op)
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, PageStatus::Complete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Preload => "preload",
            PageStatus::Loading => "loading",
            PageStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preload" => Ok(PageStatus::Preload),
            "loading" => Ok(PageStatus::Loading),
            "complete" => Ok(PageStatus::Complete),
            _ => Err(format!("Unknown page status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(PageStatus::Preload.can_transition_to(PageStatus::Loading));
        assert!(PageStatus::Preload.can_transition_to(PageStatus::Complete));
        assert!(PageStatus::Loading.can_transition_to(PageStatus::Complete));
        assert!(PageStatus::Complete.can_transition_to(PageStatus::Loading));
    }

    #[test]
    fn test_invalid_transitions() {
        // A page never goes back to preload
        assert!(!PageStatus::Loading.can_transition_to(PageStatus::Preload));
        assert!(!PageStatus::Complete.can_transition_to(PageStatus::Preload));
    }

    #[test]
    fn test_round_trip_strings() {
        for status in [PageStatus::Preload, PageStatus::Loading, PageStatus::Complete] {
            assert_eq!(status.as_str().parse::<PageStatus>().unwrap(), status);
        }
    }
}
