//! Dashboard and detail-view figures derived from already-fetched rows.
//!
//! Everything here is a pure function of its inputs. Callers pass `today`
//! explicitly so the same snapshot always yields the same figures.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::models::{ApplicationStatus, InterviewRecord, InterviewResult, JobApplication, normalize};

/// Length of the "applied recently" window, in days before today.
pub const RECENT_WINDOW_DAYS: u64 = 7;

/// Number of calendar months in the applications-over-time series.
pub const TREND_MONTHS: u32 = 6;

pub fn total_count(jobs: &[JobApplication]) -> usize {
    jobs.len()
}

/// Applications that are neither rejected nor withdrawn. Unrecognised
/// statuses count as active.
pub fn active_count(jobs: &[JobApplication]) -> usize {
    jobs.iter()
        .filter(|job| {
            !matches!(
                job.status.kind(),
                ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
            )
        })
        .count()
}

pub fn interview_scheduled_count(jobs: &[JobApplication]) -> usize {
    count_status(jobs, ApplicationStatus::Interview)
}

/// Applications dated within `[today - 7 days, today]`, both ends inclusive.
pub fn recent_count(jobs: &[JobApplication], today: NaiveDate) -> usize {
    let Some(since) = today.checked_sub_days(Days::new(RECENT_WINDOW_DAYS)) else {
        return 0;
    };
    jobs.iter()
        .filter(|job| job.application_date >= since && job.application_date <= today)
        .count()
}

fn count_status(jobs: &[JobApplication], status: ApplicationStatus) -> usize {
    jobs.iter().filter(|job| job.status.is(status)).count()
}

/// Occurrences of each distinct stored status, in first-seen order.
///
/// Keys are the stored text as-is: `"Applied"` and `"applied"` are separate
/// categories, and so is a typo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    entries: Vec<(String, usize)>,
}

impl StatusBreakdown {
    pub fn of(jobs: &[JobApplication]) -> Self {
        let mut entries: Vec<(String, usize)> = Vec::new();
        for job in jobs {
            let status = job.status.as_str();
            match entries.iter_mut().find(|(label, _)| label == status) {
                Some((_, count)) => *count += 1,
                None => entries.push((status.to_string(), 1)),
            }
        }
        Self { entries }
    }

    pub fn get(&self, status: &str) -> usize {
        self.entries
            .iter()
            .find(|(label, _)| label == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(label, count)| (label.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Share of one category as a rounded percentage of all applications.
    pub fn share(&self, status: &str) -> u32 {
        rounded_percent(self.get(status), self.total())
    }
}

/// Counts behind the response rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Responses {
    pub interviews: usize,
    pub offers: usize,
    pub rejections: usize,
}

impl Responses {
    pub fn of(jobs: &[JobApplication]) -> Self {
        Self {
            interviews: count_status(jobs, ApplicationStatus::Interview),
            offers: count_status(jobs, ApplicationStatus::Offer),
            rejections: count_status(jobs, ApplicationStatus::Rejected),
        }
    }

    pub fn total(&self) -> usize {
        self.interviews + self.offers + self.rejections
    }
}

/// Percentage of applications that got an interview, offer or rejection.
/// Withdrawn applications are not responses.
pub fn response_rate(jobs: &[JobApplication]) -> u32 {
    rounded_percent(Responses::of(jobs).total(), jobs.len())
}

/// `round(100 * part / whole)` with halves rounded up; 0 when `whole` is 0.
pub fn rounded_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let scaled = (200 * part as u64 + whole as u64) / (2 * whole as u64);
    scaled as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    /// First day of the month.
    pub month: NaiveDate,
    pub count: usize,
}

impl MonthBucket {
    /// Chart label, e.g. `"Mar 2024"`.
    pub fn label(&self) -> String {
        self.month.format("%b %Y").to_string()
    }

    fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.month.year() && date.month() == self.month.month()
    }
}

/// Applications per calendar month for the current month and the five
/// before it, oldest first. Always six buckets; empty months hold zero.
pub fn monthly_applications(jobs: &[JobApplication], today: NaiveDate) -> Vec<MonthBucket> {
    let current = today.with_day(1).unwrap_or(today);
    let mut buckets: Vec<MonthBucket> = (0..TREND_MONTHS)
        .rev()
        .map(|back| MonthBucket {
            month: current.checked_sub_months(Months::new(back)).unwrap_or(current),
            count: 0,
        })
        .collect();

    for job in jobs {
        if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(job.application_date)) {
            bucket.count += 1;
        }
    }
    buckets
}

/// Outcome counts for the interviews of one application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterviewTally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl InterviewTally {
    pub fn of(interviews: &[InterviewRecord]) -> Self {
        let mut tally = Self {
            total: interviews.len(),
            ..Self::default()
        };
        for interview in interviews {
            match interview.result.kind() {
                InterviewResult::Passed => tally.passed += 1,
                InterviewResult::Failed => tally.failed += 1,
                InterviewResult::Pending => tally.pending += 1,
                InterviewResult::NoResponse | InterviewResult::Unrecognized => {}
            }
        }
        tally
    }
}

/// Everything the dashboard shows, computed from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub active: usize,
    pub interview_scheduled: usize,
    pub recent: usize,
    pub response_rate: u32,
    pub responses: Responses,
    pub status_breakdown: StatusBreakdown,
    pub monthly: Vec<MonthBucket>,
}

impl DashboardStats {
    pub fn compute(jobs: &[JobApplication], today: NaiveDate) -> Self {
        Self {
            total: total_count(jobs),
            active: active_count(jobs),
            interview_scheduled: interview_scheduled_count(jobs),
            recent: recent_count(jobs, today),
            response_rate: response_rate(jobs),
            responses: Responses::of(jobs),
            status_breakdown: StatusBreakdown::of(jobs),
            monthly: monthly_applications(jobs, today),
        }
    }
}

/// The applications list filter.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Matched case-insensitively against company, position and location.
    pub search: String,
    /// `None` shows every status.
    pub status: Option<String>,
}

impl JobFilter {
    pub fn matches(&self, job: &JobApplication) -> bool {
        let needle = normalize(&self.search);
        let matches_search = [&job.company, &job.position, &job.location]
            .iter()
            .any(|field| normalize(field).contains(&needle));

        let matches_status = match &self.status {
            Some(status) => normalize(job.status.as_str()) == normalize(status),
            None => true,
        };

        matches_search && matches_status
    }

    pub fn apply<'a>(&self, jobs: &'a [JobApplication]) -> Vec<&'a JobApplication> {
        jobs.iter().filter(|job| self.matches(job)).collect()
    }
}

/// Progress bar and milestones shown on an application's detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationProgress {
    pub percent: u32,
    pub submitted: bool,
    pub interviewing: bool,
    pub offer: bool,
}

impl ApplicationProgress {
    pub fn of(status: ApplicationStatus) -> Self {
        use ApplicationStatus::*;
        Self {
            percent: match status {
                Applied => 25,
                Interview => 50,
                Offer => 100,
                Rejected | Withdrawn | Unrecognized => 0,
            },
            submitted: matches!(status, Applied | Interview | Offer),
            interviewing: matches!(status, Interview | Offer),
            offer: status == Offer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn job(status: &str, applied: NaiveDate) -> JobApplication {
        JobApplication {
            id: format!("job-{}-{}", status, applied),
            owner: "user-1".to_string(),
            company: "Acme".to_string(),
            position: "Backend Engineer".to_string(),
            location: "Berlin".to_string(),
            employment_type: Label::new("Full-time"),
            salary_range: "€70k - €90k".to_string(),
            application_date: applied,
            status: Label::new(status),
            notes: None,
            url: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn interview(result: &str) -> InterviewRecord {
        InterviewRecord {
            id: format!("iv-{}", result),
            job_id: "job-1".to_string(),
            interview_date: date(2024, 5, 1),
            interview_type: Label::new("Technical"),
            interviewer: None,
            notes: None,
            result: Label::new(result),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_list() {
        let today = date(2024, 6, 15);
        let stats = DashboardStats::compute(&[], today);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.interview_scheduled, 0);
        assert_eq!(stats.recent, 0);
        assert_eq!(stats.response_rate, 0);
        assert!(stats.status_breakdown.is_empty());
        assert_eq!(stats.monthly.len(), 6);
        assert!(stats.monthly.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_single_applied_today() {
        let today = date(2024, 6, 15);
        let jobs = vec![job("Applied", today)];
        let stats = DashboardStats::compute(&jobs, today);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.recent, 1);
        assert_eq!(stats.response_rate, 0);
        assert_eq!(
            stats.status_breakdown.iter().collect::<Vec<_>>(),
            vec![("Applied", 1)]
        );
    }

    #[test]
    fn test_every_application_responded() {
        let today = date(2024, 6, 15);
        let jobs = vec![
            job("Interview", today),
            job("Offer", today),
            job("Rejected", today),
        ];
        assert_eq!(response_rate(&jobs), 100);
        assert_eq!(active_count(&jobs), 2);
        assert_eq!(interview_scheduled_count(&jobs), 1);
    }

    #[test]
    fn test_status_matching_ignores_case() {
        let today = date(2024, 6, 15);
        let jobs = vec![
            job("interview", today),
            job("WITHDRAWN", today),
            job("rejected", today),
        ];
        assert_eq!(interview_scheduled_count(&jobs), 1);
        assert_eq!(active_count(&jobs), 1);
    }

    #[test]
    fn test_withdrawn_is_not_a_response() {
        let today = date(2024, 6, 15);
        let jobs = vec![job("Withdrawn", today), job("Interview", today)];
        assert_eq!(response_rate(&jobs), 50);
    }

    #[test]
    fn test_response_rate_rounds_to_nearest() {
        let today = date(2024, 6, 15);
        let jobs = vec![
            job("Offer", today),
            job("Applied", today),
            job("Applied", today),
        ];
        // 33.3 -> 33
        assert_eq!(response_rate(&jobs), 33);

        let jobs = vec![
            job("Offer", today),
            job("Rejected", today),
            job("Applied", today),
        ];
        // 66.7 -> 67
        assert_eq!(response_rate(&jobs), 67);

        assert_eq!(rounded_percent(1, 8), 13); // 12.5 rounds up
        assert_eq!(rounded_percent(0, 0), 0);
    }

    #[test]
    fn test_unrecognized_status_counts_toward_totals_only() {
        let today = date(2024, 6, 15);
        let jobs = vec![job("Ghosted", today), job("Applied", today)];
        assert_eq!(total_count(&jobs), 2);
        assert_eq!(active_count(&jobs), 2);
        assert_eq!(response_rate(&jobs), 0);
        assert_eq!(StatusBreakdown::of(&jobs).get("Ghosted"), 1);
    }

    #[test]
    fn test_recent_window_boundaries() {
        let today = date(2024, 6, 15);
        let jobs = vec![
            job("Applied", date(2024, 6, 8)),  // exactly 7 days ago
            job("Applied", date(2024, 6, 7)),  // 8 days ago
            job("Applied", date(2024, 6, 15)), // today
            job("Applied", date(2024, 6, 16)), // tomorrow
        ];
        assert_eq!(recent_count(&jobs, today), 2);
    }

    #[test]
    fn test_status_breakdown_preserves_case_and_order() {
        let today = date(2024, 6, 15);
        let jobs = vec![
            job("Offer", today),
            job("Applied", today),
            job("applied", today),
            job("Applied", today),
            job("Aplied", today),
        ];
        let breakdown = StatusBreakdown::of(&jobs);
        assert_eq!(
            breakdown.iter().collect::<Vec<_>>(),
            vec![("Offer", 1), ("Applied", 2), ("applied", 1), ("Aplied", 1)]
        );
        assert_eq!(breakdown.total(), jobs.len());
        assert_eq!(breakdown.share("Applied"), 40);
        assert_eq!(breakdown.get("Withdrawn"), 0);
    }

    #[test]
    fn test_monthly_series_spans_six_months() {
        let today = date(2024, 3, 31);
        let jobs = vec![
            job("Applied", date(2023, 10, 1)),  // first day of oldest month
            job("Applied", date(2023, 9, 30)),  // just outside
            job("Applied", date(2024, 2, 29)),
            job("Applied", date(2024, 3, 1)),
            job("Applied", date(2024, 3, 31)),
            job("Applied", date(2024, 4, 1)),   // next month, outside
        ];
        let series = monthly_applications(&jobs, today);
        let labels: Vec<String> = series.iter().map(MonthBucket::label).collect();
        assert_eq!(
            labels,
            vec!["Oct 2023", "Nov 2023", "Dec 2023", "Jan 2024", "Feb 2024", "Mar 2024"]
        );
        let counts: Vec<usize> = series.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 0, 0, 1, 2]);
        assert_eq!(counts.iter().sum::<usize>(), 4);
    }

    #[test]
    fn test_monthly_series_crosses_year_boundary() {
        let today = date(2025, 1, 10);
        let series = monthly_applications(&[job("Applied", date(2024, 8, 31))], today);
        assert_eq!(series[0].month, date(2024, 8, 1));
        assert_eq!(series[5].month, date(2025, 1, 1));
        assert_eq!(series[0].count, 1);
    }

    #[test]
    fn test_interview_tally() {
        let interviews = vec![
            interview("Passed"),
            interview("passed"),
            interview("Failed"),
            interview("Pending"),
            interview("No Response"),
        ];
        let tally = InterviewTally::of(&interviews);
        assert_eq!(
            tally,
            InterviewTally { total: 5, passed: 2, failed: 1, pending: 1 }
        );
        assert!(tally.passed + tally.failed + tally.pending <= tally.total);
        assert_eq!(InterviewTally::of(&[]), InterviewTally::default());
    }

    #[test]
    fn test_job_filter() {
        let today = date(2024, 6, 15);
        let mut remote = job("Applied", today);
        remote.location = "Remote (EU)".to_string();
        let jobs = vec![job("Offer", today), remote, job("Rejected", today)];

        let filter = JobFilter { search: "remote".to_string(), status: None };
        assert_eq!(filter.apply(&jobs).len(), 1);

        let filter = JobFilter { search: String::new(), status: Some("offer".to_string()) };
        let found = filter.apply(&jobs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status.as_str(), "Offer");

        let filter = JobFilter { search: "ACME".to_string(), status: Some("rejected".to_string()) };
        assert_eq!(filter.apply(&jobs).len(), 1);

        assert_eq!(JobFilter::default().apply(&jobs).len(), 3);
    }

    #[test]
    fn test_application_progress() {
        let offer = ApplicationProgress::of(ApplicationStatus::Offer);
        assert_eq!(offer.percent, 100);
        assert!(offer.submitted && offer.interviewing && offer.offer);

        let applied = ApplicationProgress::of(ApplicationStatus::Applied);
        assert_eq!(applied.percent, 25);
        assert!(applied.submitted && !applied.interviewing);

        let rejected = ApplicationProgress::of(ApplicationStatus::Rejected);
        assert_eq!(rejected.percent, 0);
        assert!(!rejected.submitted);
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let today = date(2024, 6, 15);
        let jobs = vec![job("Applied", today), job("Offer", date(2024, 1, 3))];
        let before = jobs.clone();
        let first = DashboardStats::compute(&jobs, today);
        let second = DashboardStats::compute(&jobs, today);
        assert_eq!(jobs, before);
        assert_eq!(first, second);
    }
}
