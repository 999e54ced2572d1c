use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::input::expand_key;

const FILTER_NAMES: [&str; 3] = ["all", "pending", "completed"];

/// Completion-state filter applied before text search.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Pending,
    Completed,
}

impl FilterMode {
    pub const ALL: [FilterMode; 3] = [FilterMode::All, FilterMode::Pending, FilterMode::Completed];

    pub fn matches(self, done: bool) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Pending => !done,
            FilterMode::Completed => done,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::Pending => "Pending",
            FilterMode::Completed => "Completed",
        }
    }

    /// Cycles all -> pending -> completed -> all.
    pub fn next(self) -> Self {
        match self {
            FilterMode::All => FilterMode::Pending,
            FilterMode::Pending => FilterMode::Completed,
            FilterMode::Completed => FilterMode::All,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(FILTER_NAMES[*self as usize])
    }
}

impl FromStr for FilterMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let name = expand_key(&key, &FILTER_NAMES)?;
        match name.as_str() {
            "pending" => Ok(FilterMode::Pending),
            "completed" => Ok(FilterMode::Completed),
            _ => Ok(FilterMode::All),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        assert_eq!("all".parse::<FilterMode>().unwrap(), FilterMode::All);
        assert_eq!("pend".parse::<FilterMode>().unwrap(), FilterMode::Pending);
        assert_eq!("C".parse::<FilterMode>().unwrap(), FilterMode::Completed);
        assert!("x".parse::<FilterMode>().is_err());
    }

    #[test]
    fn test_cycle_visits_every_mode() {
        let mut mode = FilterMode::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(seen, FilterMode::ALL.to_vec());
        assert_eq!(mode, FilterMode::All);
        assert_eq!(FilterMode::Pending.to_string(), "pending");
    }
}
