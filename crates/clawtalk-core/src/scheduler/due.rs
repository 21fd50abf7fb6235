//! Due-set computation for `recurring` and `once` jobs (§4.7).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::talk::{Job, JobType};

/// Whether `job` is due to run, given the last tick and current time.
///
/// `recurring` jobs fire if the cron expression has a scheduled time in
/// `(last_tick, now]` — strictly after the last tick so a job already
/// fired for a given minute never fires again for that same minute
/// (monotonic boundary discipline). `once` jobs fire if their target time
/// has passed and they have never run. `event` jobs are never due here;
/// they are dispatched by the event dispatcher instead.
pub fn is_due(job: &Job, last_tick: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match job.job_type {
        JobType::Event => false,
        JobType::Once => {
            if job.last_run_at.is_some() {
                return false;
            }
            match parse_once_schedule(&job.schedule) {
                Some(target) => target <= now,
                None => false,
            }
        }
        JobType::Recurring => match Schedule::from_str(&job.schedule) {
            Ok(schedule) => schedule.after(&last_tick).take_while(|t| *t <= now).next().is_some(),
            Err(_) => false,
        },
    }
}

fn parse_once_schedule(schedule: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(schedule) {
        return Some(dt.with_timezone(&Utc));
    }
    // A bare cron expression for a `once` job means "next time it fires
    // from epoch" — treat its first occurrence after the epoch as the
    // target instant.
    let epoch = DateTime::<Utc>::from_timestamp(0, 0)?;
    Schedule::from_str(schedule)
        .ok()?
        .after(&epoch)
        .next()
}

/// Parse an event job's `schedule` field, which takes the form `on <scope>`.
pub fn parse_event_trigger(schedule: &str) -> Option<String> {
    schedule.strip_prefix("on ").map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::talk::JobOutputDestination;

    fn job(job_type: JobType, schedule: &str) -> Job {
        Job {
            id: "j1".into(),
            job_type,
            schedule: schedule.into(),
            prompt: "do it".into(),
            output: JobOutputDestination::ReportOnly,
            active: true,
            created_at: 0,
            last_run_at: None,
            last_status: None,
        }
    }

    #[test]
    fn recurring_fires_once_per_boundary() {
        let j = job(JobType::Recurring, "0 * * * * *");
        let last_tick = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:01:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_due(&j, last_tick, now));

        // Same tick window, already advanced past the fire point: the next
        // check starts from the new last_tick and must not re-fire.
        let last_tick2 = DateTime::parse_from_rfc3339("2026-01-01T00:01:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!is_due(&j, last_tick2, now));
    }

    #[test]
    fn once_fires_when_target_passed_and_never_run() {
        let j = job(JobType::Once, "2026-01-01T00:00:00Z");
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        let before = DateTime::parse_from_rfc3339("2025-12-31T23:59:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_due(&j, before, now));
    }

    #[test]
    fn once_never_fires_twice() {
        let mut j = job(JobType::Once, "2026-01-01T00:00:00Z");
        j.last_run_at = Some(1);
        let now = Utc::now();
        assert!(!is_due(&j, now, now));
    }

    #[test]
    fn event_jobs_are_never_due_here() {
        let j = job(JobType::Event, "on slack:channel:C1");
        let now = Utc::now();
        assert!(!is_due(&j, now, now));
    }

    #[test]
    fn parses_event_trigger_scope() {
        assert_eq!(
            parse_event_trigger("on slack:channel:C123"),
            Some("slack:channel:C123".to_string())
        );
        assert_eq!(parse_event_trigger("0 * * * * *"), None);
    }
}
