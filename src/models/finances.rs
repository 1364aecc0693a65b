// src/models/finances.rs
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Append-only ledger row, one per completed delivery. Never updated after
/// creation; all reporting is computed over the rows.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverFinancesEntry {
    pub driver_id: String,
    pub earnings: f64,
    pub charges: f64,
    pub profit: f64,
    pub date: NaiveDate,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
}

impl DriverFinancesEntry {
    pub fn new(driver_id: &str, earnings: f64, charges: f64, date: NaiveDate) -> Self {
        let week_start = week_start_of(date);
        let month_start = month_start_of(date);
        Self {
            driver_id: driver_id.to_string(),
            earnings,
            charges,
            profit: earnings - charges,
            date,
            week_start,
            week_end: week_start + Duration::days(6),
            month_start,
            month_end: month_end_of(date),
        }
    }
}

/// Sums for one reporting window.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FinancesPeriod {
    pub earnings: f64,
    pub charges: f64,
    pub profit: f64,
    pub total_trips: u32,
}

impl FinancesPeriod {
    fn add(&mut self, entry: &DriverFinancesEntry) {
        self.earnings += entry.earnings;
        self.charges += entry.charges;
        self.profit += entry.profit;
        self.total_trips += 1;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinancesReport {
    pub today: FinancesPeriod,
    pub week: FinancesPeriod,
    pub month: FinancesPeriod,
    pub all_time: FinancesPeriod,
}

impl FinancesReport {
    /// Pure read-side aggregation of a driver's ledger rows as of `today`.
    pub fn compute(entries: &[DriverFinancesEntry], today: NaiveDate) -> Self {
        let week_start = week_start_of(today);
        let month_start = month_start_of(today);

        let mut report = Self {
            today: FinancesPeriod::default(),
            week: FinancesPeriod::default(),
            month: FinancesPeriod::default(),
            all_time: FinancesPeriod::default(),
        };

        for entry in entries {
            report.all_time.add(entry);
            if entry.date == today {
                report.today.add(entry);
            }
            if entry.week_start == week_start {
                report.week.add(entry);
            }
            if entry.month_start == month_start {
                report.month.add(entry);
            }
        }

        report
    }
}

/// The week runs Sunday through Saturday.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let days_since_sunday = date.weekday().num_days_from_sunday() as i64;
    date - Duration::days(days_since_sunday)
}

pub fn month_start_of(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_end_of(date: NaiveDate) -> NaiveDate {
    let next_month_start = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    match next_month_start {
        Some(first) => first - Duration::days(1),
        None => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2025-08-25 is a Monday
        assert_eq!(week_start_of(date(2025, 8, 25)), date(2025, 8, 24));
        // a Sunday is its own week start
        assert_eq!(week_start_of(date(2025, 8, 24)), date(2025, 8, 24));
        assert_eq!(week_start_of(date(2025, 8, 30)), date(2025, 8, 24));
    }

    #[test]
    fn month_bounds_span_the_calendar_month() {
        assert_eq!(month_start_of(date(2025, 2, 14)), date(2025, 2, 1));
        assert_eq!(month_end_of(date(2025, 2, 14)), date(2025, 2, 28));
        assert_eq!(month_end_of(date(2024, 2, 14)), date(2024, 2, 29));
        assert_eq!(month_end_of(date(2025, 12, 3)), date(2025, 12, 31));
    }

    #[test]
    fn entry_derives_profit_and_buckets() {
        let entry = DriverFinancesEntry::new("drv-1", 12.50, 0.30, date(2025, 8, 25));
        assert!((entry.profit - 12.20).abs() < 1e-9);
        assert_eq!(entry.week_start, date(2025, 8, 24));
        assert_eq!(entry.week_end, date(2025, 8, 30));
        assert_eq!(entry.month_start, date(2025, 8, 1));
        assert_eq!(entry.month_end, date(2025, 8, 31));
    }

    #[test]
    fn report_buckets_entries_by_window() {
        let today = date(2025, 8, 25);
        let entries = vec![
            DriverFinancesEntry::new("drv-1", 10.0, 0.30, today),
            DriverFinancesEntry::new("drv-1", 8.0, 0.20, date(2025, 8, 24)), // this week
            DriverFinancesEntry::new("drv-1", 6.0, 0.50, date(2025, 8, 2)),  // this month
            DriverFinancesEntry::new("drv-1", 4.0, 0.10, date(2025, 7, 30)), // older
        ];

        let report = FinancesReport::compute(&entries, today);
        assert_eq!(report.today.total_trips, 1);
        assert!((report.today.earnings - 10.0).abs() < 1e-9);
        assert_eq!(report.week.total_trips, 2);
        assert_eq!(report.month.total_trips, 3);
        assert_eq!(report.all_time.total_trips, 4);
        assert!((report.all_time.profit - (9.7 + 7.8 + 5.5 + 3.9)).abs() < 1e-9);
    }
}
