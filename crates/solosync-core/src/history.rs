//! Session history statistics and the month calendar.
//!
//! Dates are taken in the caller's local offset; weeks start on Monday.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::api::SessionLogRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Days with at least one completed session.
    pub completed_dates: BTreeSet<NaiveDate>,
    pub sessions_this_week: usize,
    /// Consecutive weeks with a session, counted back from the week of the
    /// most recent session.
    pub weekly_streak: u32,
    pub total_sessions: usize,
}

impl HistoryStats {
    pub fn compute(records: &[SessionLogRecord], offset: FixedOffset, today: NaiveDate) -> Self {
        let dates: Vec<NaiveDate> = records.iter().map(|r| local_date(r, offset)).collect();
        let this_week = week_start(today);

        Self {
            completed_dates: dates.iter().copied().collect(),
            sessions_this_week: dates.iter().filter(|d| week_start(**d) == this_week).count(),
            weekly_streak: weekly_streak(&dates),
            total_sessions: records.len(),
        }
    }

    pub fn has_session_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn local_date(record: &SessionLogRecord, offset: FixedOffset) -> NaiveDate {
    record.completed_at.with_timezone(&offset).date_naive()
}

fn weekly_streak(dates: &[NaiveDate]) -> u32 {
    let weeks: BTreeSet<NaiveDate> = dates.iter().map(|d| week_start(*d)).collect();
    let Some(mut expected) = weeks.last().copied() else {
        return 0;
    };
    let mut streak = 0;
    for week in weeks.iter().rev() {
        if *week != expected {
            break;
        }
        streak += 1;
        expected -= Duration::weeks(1);
    }
    streak
}

/// Sessions completed on `date`, most recent first.
pub fn sessions_on<'a>(
    records: &'a [SessionLogRecord],
    offset: FixedOffset,
    date: NaiveDate,
) -> Vec<&'a SessionLogRecord> {
    let mut day: Vec<_> = records
        .iter()
        .filter(|r| local_date(r, offset) == date)
        .collect();
    day.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    day
}

/// Month view: rows of Monday-first weeks, `None` for padding days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[Option<CalendarDay>; 7]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub completed: bool,
}

impl MonthGrid {
    /// `None` for an invalid year/month.
    pub fn build(year: i32, month: u32, stats: &HistoryStats) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let mut weeks = Vec::new();
        let mut row: [Option<CalendarDay>; 7] = [None; 7];
        let mut date = first;
        while date.month() == month {
            let col = date.weekday().num_days_from_monday() as usize;
            row[col] = Some(CalendarDay {
                date,
                completed: stats.has_session_on(date),
            });
            if col == 6 {
                weeks.push(row);
                row = [None; 7];
            }
            date = date.succ_opt()?;
        }
        if row.iter().any(Option::is_some) {
            weeks.push(row);
        }
        Some(Self { year, month, weeks })
    }

    pub fn title(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default()
    }
}
