//! Dashboard time ranges.

use clap::ValueEnum;
use orient_common::cache::WindowQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimeRange {
    /// The most recent `window_size` readings
    #[default]
    Latest,
    #[value(name = "1h")]
    LastHour,
    #[value(name = "6h")]
    Last6Hours,
    #[value(name = "24h")]
    Last24Hours,
}

impl TimeRange {
    pub fn to_query(self, window_size: usize) -> WindowQuery {
        match self {
            TimeRange::Latest => WindowQuery::Latest(window_size),
            TimeRange::LastHour => WindowQuery::last_hours(1),
            TimeRange::Last6Hours => WindowQuery::last_hours(6),
            TimeRange::Last24Hours => WindowQuery::last_hours(24),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ranges_map_to_queries() {
        assert_eq!(TimeRange::Latest.to_query(25), WindowQuery::Latest(25));
        assert_eq!(
            TimeRange::Last6Hours.to_query(25),
            WindowQuery::Since(Duration::from_secs(6 * 3600))
        );
    }

    #[test]
    fn test_parse_from_cli_names() {
        assert_eq!(TimeRange::from_str("24h", false).unwrap(), TimeRange::Last24Hours);
        assert_eq!(TimeRange::from_str("latest", false).unwrap(), TimeRange::Latest);
        assert!(TimeRange::from_str("2h", false).is_err());
    }
}
