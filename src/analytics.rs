//! Read-only views over the visit store used by the shell and reports.
//!
//! Every function takes `today` explicitly; callers pass the current UTC date.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::model::{VisitRecord, VisitStatus};
use crate::VisitDb;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub total: usize,
    pub completed: usize,
    pub scheduled: usize,
    pub cancelled: usize,
    pub this_month: usize,
    pub completed_this_month: usize,
    /// Completed share of all visits, as a rounded percentage
    pub success_rate: u32,
}

pub fn todays_visits(db: &VisitDb, today: NaiveDate) -> Result<Vec<VisitRecord>> {
    db.visits_by_date(&today.format("%Y-%m-%d").to_string())
}

/// Non-cancelled visits dated `today..=today + days`, earliest first.
pub fn upcoming_visits(db: &VisitDb, today: NaiveDate, days: u32) -> Result<Vec<VisitRecord>> {
    let horizon = today + Duration::days(i64::from(days));
    let mut visits: Vec<VisitRecord> = db
        .all_visits()?
        .into_iter()
        .filter(|v| v.status != Some(VisitStatus::Cancelled))
        .filter(|v| matches!(v.date, Some(d) if d >= today && d <= horizon))
        .collect();

    visits.sort_by(|a, b| (a.date, a.time.as_deref()).cmp(&(b.date, b.time.as_deref())));
    Ok(visits)
}

pub fn visit_stats(db: &VisitDb, today: NaiveDate) -> Result<VisitStats> {
    let visits = db.all_visits()?;
    Ok(summarize(&visits, today))
}

fn summarize(visits: &[VisitRecord], today: NaiveDate) -> VisitStats {
    let mut stats = VisitStats { total: visits.len(), ..Default::default() };

    for visit in visits {
        let completed = visit.status == Some(VisitStatus::Completed);
        match visit.status {
            Some(VisitStatus::Completed) => stats.completed += 1,
            Some(VisitStatus::Scheduled) => stats.scheduled += 1,
            Some(VisitStatus::Cancelled) => stats.cancelled += 1,
            None => {}
        }

        let in_month = visit
            .date
            .map_or(false, |d| d.year() == today.year() && d.month() == today.month());
        if in_month {
            stats.this_month += 1;
            if completed {
                stats.completed_this_month += 1;
            }
        }
    }

    if stats.total > 0 {
        stats.success_rate = (stats.completed as f64 / stats.total as f64 * 100.0).round() as u32;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::storage::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn visit(id: &str, date: NaiveDate, time: &str, status: VisitStatus) -> VisitRecord {
        VisitRecord {
            id: id.into(),
            date: Some(date),
            time: Some(time.into()),
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_counts() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let may = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let visits = vec![
            visit("a", today, "09:00", VisitStatus::Completed),
            visit("b", today, "10:00", VisitStatus::Scheduled),
            visit("c", may, "10:00", VisitStatus::Completed),
            visit("d", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), "10:00", VisitStatus::Cancelled),
        ];

        let stats = summarize(&visits, today);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.this_month, 2);
        assert_eq!(stats.completed_this_month, 1);
        assert_eq!(stats.success_rate, 50);
    }

    #[test]
    fn test_empty_store_has_zero_rate() {
        let stats = summarize(&[], NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(stats, VisitStats::default());
    }

    #[test]
    fn test_upcoming_window_and_order() {
        let db = VisitDb::open(Arc::new(MemoryStore::new()), TierConfig::default()).unwrap();
        let today = Utc::now().date_naive();
        let day = |n: i64| today + Duration::days(n);

        db.save(visit("later", day(3), "09:00", VisitStatus::Scheduled)).unwrap();
        db.save(visit("soon_pm", day(1), "15:00", VisitStatus::Scheduled)).unwrap();
        db.save(visit("soon_am", day(1), "08:30", VisitStatus::Scheduled)).unwrap();
        db.save(visit("dropped", day(2), "09:00", VisitStatus::Cancelled)).unwrap();
        db.save(visit("too_far", day(40), "09:00", VisitStatus::Scheduled)).unwrap();
        db.save(visit("past", day(-1), "09:00", VisitStatus::Completed)).unwrap();

        let ids: Vec<String> = upcoming_visits(&db, today, 30).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, ["soon_am", "soon_pm", "later"]);

        assert_eq!(todays_visits(&db, day(1)).unwrap().len(), 2);
    }
}
