//! Compliance metrics for the admin dashboard

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_METRICS};
use crate::followup::codes::modality_display_name;
use crate::followup::{Actor, FollowUpRecommendation, FollowUpStatus};
use crate::store::{Page, WorklistFilters};
use crate::Result;

/// Most recommendations scanned for one report
pub const METRICS_SCAN_LIMIT: i64 = 10_000;

/// Window for the daily trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MetricsRange {
    /// The `days` days ending at `now`
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub scheduled: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Open and past due at report time, plus rows stored as overdue
    pub overdue: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModalityBreakdown {
    pub modality: String,
    /// Display name, e.g. "MRI" for `MR`
    pub modality_name: String,
    pub count: i64,
    pub completed_on_time: i64,
    pub completed_late: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub range: MetricsRange,
    pub total_followups: i64,
    pub total_completed: i64,
    pub total_overdue: i64,
    pub completed_on_time: i64,
    pub completed_late: i64,
    /// Percent of all follow-ups completed on or before their due date
    pub completion_rate: f64,
    /// Percent of all follow-ups currently overdue
    pub overdue_rate: f64,
    pub status_breakdown: StatusBreakdown,
    pub modality_breakdown: Vec<ModalityBreakdown>,
    /// `YYYY-MM-DD` → count, inside the range only
    pub daily_created: BTreeMap<String, i64>,
    pub daily_completed: BTreeMap<String, i64>,
}

fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

fn day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// `Some(true)` on time, `Some(false)` late, `None` if not completed or undated
fn completed_on_time(rec: &FollowUpRecommendation) -> Option<bool> {
    if rec.status() != FollowUpStatus::Completed {
        return None;
    }
    rec.due_date().map(|due| rec.updated_at() <= due)
}

/// Build the report from a snapshot of recommendations
pub(crate) fn compute_report(
    recommendations: &[FollowUpRecommendation],
    range: MetricsRange,
    now: DateTime<Utc>,
) -> MetricsReport {
    let mut status = StatusBreakdown::default();
    let mut on_time = 0;
    let mut late = 0;
    let mut modalities: BTreeMap<String, ModalityBreakdown> = BTreeMap::new();
    let mut daily_created: BTreeMap<String, i64> = BTreeMap::new();
    let mut daily_completed: BTreeMap<String, i64> = BTreeMap::new();

    for rec in recommendations {
        match rec.status() {
            FollowUpStatus::Pending => status.pending += 1,
            FollowUpStatus::Scheduled => status.scheduled += 1,
            FollowUpStatus::Completed => status.completed += 1,
            FollowUpStatus::Cancelled => status.cancelled += 1,
            // Stored overdue rows always land in the overdue bucket
            FollowUpStatus::Overdue => {}
        }
        if rec.status() == FollowUpStatus::Overdue || rec.is_overdue_at(now) {
            status.overdue += 1;
        }

        let modality = if rec.recommended_modality().is_empty() {
            "Unknown".to_string()
        } else {
            rec.recommended_modality().to_string()
        };
        let entry = modalities
            .entry(modality.clone())
            .or_insert_with(|| ModalityBreakdown {
                modality_name: modality_display_name(&modality).to_string(),
                modality,
                ..Default::default()
            });
        entry.count += 1;

        match completed_on_time(rec) {
            Some(true) => {
                on_time += 1;
                entry.completed_on_time += 1;
            }
            Some(false) => {
                late += 1;
                entry.completed_late += 1;
            }
            None => {}
        }

        if range.contains(rec.created_at()) {
            *daily_created.entry(day_key(rec.created_at())).or_insert(0) += 1;
        }
        if rec.status() == FollowUpStatus::Completed && range.contains(rec.updated_at()) {
            *daily_completed.entry(day_key(rec.updated_at())).or_insert(0) += 1;
        }
    }

    let total = recommendations.len() as i64;
    MetricsReport {
        range,
        total_followups: total,
        total_completed: status.completed,
        total_overdue: status.overdue,
        completed_on_time: on_time,
        completed_late: late,
        completion_rate: percent(on_time, total),
        overdue_rate: percent(status.overdue, total),
        status_breakdown: status,
        modality_breakdown: modalities.into_values().collect(),
        daily_created,
        daily_completed,
    }
}

impl FollowUpService {
    /// Status, timeliness and trend metrics over all recommendations
    ///
    /// Totals cover every stored recommendation (up to
    /// [`METRICS_SCAN_LIMIT`]); only the daily series are limited to `range`.
    pub async fn metrics(
        &self,
        range: MetricsRange,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<MetricsReport> {
        let result: Result<MetricsReport> = async {
            let scan = Page {
                limit: METRICS_SCAN_LIMIT,
                offset: 0,
            };
            let recommendations = self
                .store
                .list_matching(&WorklistFilters::default(), scan)
                .await?;
            if recommendations.len() as i64 >= METRICS_SCAN_LIMIT {
                tracing::warn!(
                    "Metrics scan hit its limit of {} recommendations; totals are truncated",
                    METRICS_SCAN_LIMIT
                );
            }
            Ok(compute_report(&recommendations, range, now))
        }
        .await;

        let entry = AuditEntry::new(AuditAction::Read, ENTITY_METRICS)
            .actor(actor)
            .meta("time_range_start", range.start.to_rfc3339())
            .meta("time_range_end", range.end.to_rfc3339());

        self.audited(
            result,
            |report| entry.clone().meta("total_followups", report.total_followups),
            entry.clone(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::followup::{NewFollowUp, FollowUpPriority};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn rec(modality: &str, created: DateTime<Utc>) -> FollowUpRecommendation {
        let mut r = FollowUpRecommendation::new(
            NewFollowUp {
                report_id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                recommended_modality: modality.to_string(),
                body_region: "chest".to_string(),
                reason: String::new(),
                interval_months: 1,
                priority: FollowUpPriority::Routine,
            },
            Uuid::new_v4(),
            created,
        )
        .unwrap();
        r.compute_due_date(Some(created));
        r
    }

    #[test]
    fn test_empty_report_has_zero_rates() {
        let now = utc(2024, 6, 30);
        let report = compute_report(&[], MetricsRange::last_days(30, now), now);
        assert_eq!(report.total_followups, 0);
        assert_eq!(report.completion_rate, 0.0);
        assert_eq!(report.overdue_rate, 0.0);
        assert!(report.modality_breakdown.is_empty());
    }

    #[test]
    fn test_breakdowns_and_rates() {
        let now = utc(2024, 6, 30);
        // due 2024-06-10
        let mut on_time = rec("CT", utc(2024, 5, 11));
        on_time.update_status_at(FollowUpStatus::Completed, utc(2024, 6, 5)).unwrap();
        // due 2024-06-04
        let mut late = rec("CT", utc(2024, 5, 5));
        late.update_status_at(FollowUpStatus::Completed, utc(2024, 6, 20)).unwrap();
        // due 2024-06-14, still pending -> overdue
        let overdue = rec("MR", utc(2024, 5, 15));
        // due 2024-07-25
        let open = rec("US", utc(2024, 6, 25));

        let report = compute_report(
            &[on_time, late, overdue, open],
            MetricsRange::last_days(30, now),
            now,
        );

        assert_eq!(report.total_followups, 4);
        assert_eq!(report.total_completed, 2);
        assert_eq!(report.completed_on_time, 1);
        assert_eq!(report.completed_late, 1);
        assert_eq!(report.status_breakdown.pending, 2);
        assert_eq!(report.status_breakdown.overdue, 1);
        assert_eq!(report.completion_rate, 25.0);
        assert_eq!(report.overdue_rate, 25.0);

        let modalities: Vec<&str> = report
            .modality_breakdown
            .iter()
            .map(|m| m.modality.as_str())
            .collect();
        assert_eq!(modalities, vec!["CT", "MR", "US"]);
        assert_eq!(report.modality_breakdown[1].modality_name, "MRI");
        let ct = &report.modality_breakdown[0];
        assert_eq!((ct.count, ct.completed_on_time, ct.completed_late), (2, 1, 1));

        // Only the 2024-06-25 creation falls in the last 30 days
        assert_eq!(report.daily_created.len(), 1);
        assert_eq!(report.daily_created.get("2024-06-25"), Some(&1));
        assert_eq!(report.daily_completed.get("2024-06-05"), Some(&1));
        assert_eq!(report.daily_completed.get("2024-06-20"), Some(&1));
    }

    #[test]
    fn test_stored_overdue_counted_once() {
        let now = utc(2024, 6, 30);
        let template = rec("CT", utc(2024, 5, 1));
        let stored_overdue = |due_date: Option<DateTime<Utc>>| {
            FollowUpRecommendation::restore(
                Uuid::new_v4(),
                template.report_id(),
                template.patient_id(),
                "CT".to_string(),
                "chest".to_string(),
                String::new(),
                1,
                due_date,
                FollowUpStatus::Overdue,
                FollowUpPriority::Routine,
                None,
                template.created_by(),
                template.created_at(),
                template.updated_at(),
                2,
            )
        };

        // past due, no due date, not yet due
        let report = compute_report(
            &[
                stored_overdue(Some(utc(2024, 6, 1))),
                stored_overdue(None),
                stored_overdue(Some(utc(2024, 8, 1))),
            ],
            MetricsRange::last_days(30, now),
            now,
        );

        let breakdown = &report.status_breakdown;
        assert_eq!(breakdown.overdue, 3);
        assert_eq!(
            breakdown.pending + breakdown.scheduled + breakdown.completed + breakdown.cancelled,
            0
        );
        assert_eq!(report.total_overdue, 3);
    }

    #[test]
    fn test_rates_round_to_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(0, 5), 0.0);
    }
}
