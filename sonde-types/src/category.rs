//! Snapshot classification: categories, priorities, and update modes.

use serde::{Deserialize, Serialize};

/// Bit-flag classification of a snapshot, used for capture filtering.
///
/// A configuration carries a mask of these flags; a capture whose category
/// is not in the mask is skipped before any data is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(u32);

impl Category {
    /// No categories, or unknown category.
    pub const NONE: Category = Category(0);
    /// Engine-wide state.
    pub const ENGINE: Category = Category(1 << 0);
    /// Per-entity state.
    pub const ENTITY: Category = Category(1 << 1);
    /// Per-channel state.
    pub const CHANNEL: Category = Category(1 << 2);
    /// Per-listener state.
    pub const LISTENER: Category = Category(1 << 3);
    /// Environment state.
    pub const ENVIRONMENT: Category = Category(1 << 4);
    /// Performance counters.
    pub const PERFORMANCE: Category = Category(1 << 5);
    /// Memory counters.
    pub const MEMORY: Category = Category(1 << 6);
    /// Discrete events.
    pub const EVENTS: Category = Category(1 << 7);
    /// Every category.
    pub const ALL: Category = Category(u32::MAX);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Category) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Category {
    type Output = Category;

    fn bitor(self, rhs: Category) -> Category {
        Category(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Category {
    fn bitor_assign(&mut self, rhs: Category) {
        self.0 |= rhs.0;
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::ALL
    }
}

/// Priority attached to a snapshot at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Numeric wire form (low = 0 .. critical = 3).
    pub fn as_u8(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }
}

/// When the scheduling loop captures state automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Full captures at a fixed interval derived from the update frequency.
    #[default]
    Timed,
    /// Captures only entities/channels/listeners whose state moved beyond
    /// the configured thresholds.
    OnChange,
    /// A full capture on every scheduling-loop iteration.
    PerFrame,
    /// No automatic captures; only explicit capture calls enqueue data.
    Manual,
}

impl UpdateMode {
    /// Config-file string form.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Timed => "timed",
            UpdateMode::OnChange => "on_change",
            UpdateMode::PerFrame => "per_frame",
            UpdateMode::Manual => "manual",
        }
    }

    /// Parse the config-file string form.
    pub fn parse(s: &str) -> Option<UpdateMode> {
        match s {
            "timed" => Some(UpdateMode::Timed),
            "on_change" => Some(UpdateMode::OnChange),
            "per_frame" => Some(UpdateMode::PerFrame),
            "manual" => Some(UpdateMode::Manual),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_contains() {
        let mask = Category::ENGINE | Category::CHANNEL;
        assert!(mask.contains(Category::ENGINE));
        assert!(mask.contains(Category::CHANNEL));
        assert!(!mask.contains(Category::ENTITY));
        assert!(Category::ALL.contains(Category::EVENTS));
        assert!(!Category::NONE.contains(Category::ENGINE));
    }

    #[test]
    fn category_none_is_contained_everywhere() {
        // An empty flag set is a subset of any mask.
        assert!(Category::NONE.contains(Category::NONE));
        assert!(Category::ENGINE.contains(Category::NONE));
    }

    #[test]
    fn update_mode_roundtrip() {
        for mode in [
            UpdateMode::Timed,
            UpdateMode::OnChange,
            UpdateMode::PerFrame,
            UpdateMode::Manual,
        ] {
            assert_eq!(UpdateMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(UpdateMode::parse("sometimes"), None);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
