use std::time::Duration;

use crate::pipeline::{HourSummary, RunSummary};

/// Format an elapsed duration as `4.2s` or `3m 07s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let whole = d.as_secs();
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

/// One-line counts for a finished hour
pub fn format_hour_counts(summary: &HourSummary) -> String {
    let mut out = format!("{} kept of {} lines", summary.kept, summary.lines);
    if summary.geocode_attempts > 0 {
        out.push_str(&format!(
            ", {}/{} geocoded",
            summary.geocoded, summary.geocode_attempts
        ));
    }
    if summary.parse_errors > 0 {
        out.push_str(&format!(", {} malformed", summary.parse_errors));
    }
    out
}

pub fn format_summary_readable(summary: &RunSummary) -> String {
    let totals = &summary.totals;
    let mut output = String::new();

    output.push_str(&format!(
        "Hours: {}/{} processed in {}\n",
        summary.hours_ok,
        summary.hours_total,
        format_duration(summary.elapsed)
    ));
    output.push_str(&format!(
        "Events: {} kept, {} other types, {} malformed lines ({} lines read)\n",
        totals.kept, totals.rejected, totals.parse_errors, totals.lines
    ));
    if totals.geocode_attempts > 0 {
        output.push_str(&format!(
            "Geocoding: {} resolved, {} unresolved of {} located actors\n",
            totals.geocoded, totals.geocode_failures, totals.geocode_attempts
        ));
    }

    if !summary.failed_hours.is_empty() {
        output.push_str("\nFailed hours:\n");
        for failed in &summary.failed_hours {
            output.push_str(&format!("• {}: {}\n", failed.hour, failed.error));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::{pipeline::FailedHour, types::HourId};

    #[test]
    fn durations_switch_to_minutes() {
        assert_eq!(format_duration(Duration::from_millis(4_300)), "4.3s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
    }

    #[test]
    fn hour_counts_mention_only_what_happened() {
        let quiet = HourSummary {
            lines: 10,
            kept: 4,
            rejected: 6,
            ..Default::default()
        };
        assert_eq!(format_hour_counts(&quiet), "4 kept of 10 lines");

        let busy = HourSummary {
            lines: 10,
            kept: 4,
            rejected: 5,
            parse_errors: 1,
            geocode_attempts: 3,
            geocoded: 2,
            geocode_failures: 1,
        };
        assert_eq!(
            format_hour_counts(&busy),
            "4 kept of 10 lines, 2/3 geocoded, 1 malformed"
        );
    }

    #[test]
    fn summary_lists_failed_hours() {
        let hour = HourId::new(NaiveDate::from_ymd_opt(2014, 11, 1).unwrap(), 3).unwrap();
        let summary = RunSummary {
            run_id: Uuid::nil(),
            hours_total: 2,
            hours_ok: 1,
            failed_hours: vec![FailedHour {
                hour,
                error: "HTTP 404".into(),
            }],
            totals: HourSummary {
                lines: 5,
                kept: 2,
                rejected: 3,
                ..Default::default()
            },
            elapsed: Duration::from_secs(2),
        };

        let text = format_summary_readable(&summary);
        assert!(text.starts_with("Hours: 1/2 processed in 2.0s\n"));
        assert!(text.contains("Events: 2 kept, 3 other types, 0 malformed lines (5 lines read)"));
        assert!(!text.contains("Geocoding"));
        assert!(text.contains("• 2014-11-01-3: HTTP 404"));
    }
}
