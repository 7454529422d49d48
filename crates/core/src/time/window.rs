use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

// Closes are fetched from a little before the start date so the base price can still be
// found when the start date falls on a weekend or market holiday.
pub const LOOKBACK_DAYS: i64 = 10;

/// Accepted start-date years.
pub const START_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Inclusive calendar-date range requested from the price provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl FetchWindow {
    pub fn for_start(start: NaiveDate, today: NaiveDate) -> anyhow::Result<Self> {
        let from = start
            .checked_sub_signed(Duration::days(LOOKBACK_DAYS))
            .with_context(|| format!("start date {start} is out of range"))?;
        Ok(Self {
            from,
            to: today.max(from),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.from..=self.to).contains(&date)
    }

    /// `[period1, period2)` in unix seconds: midnight UTC of `from` up to midnight after `to`.
    pub fn unix_bounds(&self) -> anyhow::Result<(i64, i64)> {
        let midnight = |d: NaiveDate| {
            d.and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
                .unwrap_or_default()
        };
        let after_to = self
            .to
            .checked_add_signed(Duration::days(1))
            .with_context(|| format!("fetch window end {} is out of range", self.to))?;
        Ok((midnight(self.from), midnight(after_to)))
    }
}

/// Parse a `YYYY-MM-DD` start date, falling back to `default` when absent or blank.
pub fn resolve_start_date(start_arg: Option<&str>, default: NaiveDate) -> anyhow::Result<NaiveDate> {
    let Some(s) = start_arg.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("start date must be YYYY-MM-DD (got {s:?})"))?;
    anyhow::ensure!(
        START_YEARS.contains(&date.year()),
        "start date year must be within {}..={} (got {s:?})",
        START_YEARS.start(),
        START_YEARS.end()
    );
    Ok(date)
}

pub fn today_utc(now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn window_looks_back_ten_days() {
        let w = FetchWindow::for_start(d(2025, 8, 20), d(2025, 9, 1)).unwrap();
        assert_eq!(w.from, d(2025, 8, 10));
        assert_eq!(w.to, d(2025, 9, 1));
        assert!(w.contains(d(2025, 8, 10)));
        assert!(w.contains(d(2025, 9, 1)));
        assert!(!w.contains(d(2025, 9, 2)));
    }

    #[test]
    fn future_start_never_inverts_window() {
        let w = FetchWindow::for_start(d(2030, 1, 20), d(2025, 9, 1)).unwrap();
        assert!(w.from <= w.to);
    }

    #[test]
    fn unix_bounds_cover_whole_days() {
        let w = FetchWindow {
            from: d(2025, 8, 20),
            to: d(2025, 8, 21),
        };
        assert_eq!(w.unix_bounds().unwrap(), (1_755_648_000, 1_755_820_800));
    }

    #[test]
    fn extreme_dates_are_errors_not_panics() {
        assert!(FetchWindow::for_start(NaiveDate::MIN, d(2025, 9, 1)).is_err());

        let w = FetchWindow {
            from: d(2025, 8, 20),
            to: NaiveDate::MAX,
        };
        assert!(w.unix_bounds().is_err());
    }

    #[test]
    fn resolves_start_argument() {
        let default = d(2025, 8, 20);
        assert_eq!(resolve_start_date(None, default).unwrap(), default);
        assert_eq!(resolve_start_date(Some("  "), default).unwrap(), default);
        assert_eq!(
            resolve_start_date(Some("2025-09-02"), default).unwrap(),
            d(2025, 9, 2)
        );
        assert!(resolve_start_date(Some("09/02/2025"), default).is_err());
    }

    #[test]
    fn rejects_out_of_range_start_years() {
        let default = d(2025, 8, 20);
        for arg in ["-262143-01-01", "262142-12-31", "0001-01-01", "10000-01-01"] {
            assert!(resolve_start_date(Some(arg), default).is_err(), "{arg}");
        }
        assert_eq!(
            resolve_start_date(Some("1900-01-01"), default).unwrap(),
            d(1900, 1, 1)
        );
    }

    #[test]
    fn today_is_utc_calendar_date() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 0).unwrap();
        assert_eq!(today_utc(now), d(2026, 1, 5));
    }
}
