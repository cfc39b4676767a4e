use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::models::{AuditReport, RatingTally};
use crate::reconcile::{OverrideSubmission, ReviewRow};
use crate::source::AuditSource;

/// Rating distribution for one scope, as shown on the summary page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub scope: String,
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
    pub in_development: i64,
    /// Courses counted towards the audit, excluded ones removed.
    pub total: i64,
    pub gold_pc: f64,
    pub silver_pc: f64,
    pub bronze_pc: f64,
    pub in_development_pc: f64,
}

impl RatingSummary {
    pub fn from_tally(scope: &str, tally: &RatingTally) -> Self {
        let total = tally.courses - tally.excluded;
        let rated = tally.gold + tally.silver + tally.bronze;
        let in_development = total - rated;

        Self {
            scope: scope.to_string(),
            gold: tally.gold,
            silver: tally.silver,
            bronze: tally.bronze,
            in_development,
            total,
            gold_pc: percent(tally.gold, total),
            silver_pc: percent(tally.silver, total),
            bronze_pc: percent(tally.bronze, total),
            in_development_pc: percent(in_development, total),
        }
    }
}

fn percent(count: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Site-wide summary followed by one summary per top-level category.
///
/// Categories without any visible course are left out.
pub async fn collect_summaries<S: AuditSource + ?Sized>(
    source: &S,
    site_name: &str,
) -> Result<Vec<RatingSummary>> {
    let mut summaries = vec![RatingSummary::from_tally(
        site_name,
        &source.rating_tally(None).await?,
    )];

    for category in source.list_top_level_categories().await? {
        let ids: Vec<i64> = source
            .list_audit_categories(category.id)
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        if ids.is_empty() {
            continue;
        }

        let tally = source.rating_tally(Some(&ids)).await?;
        if tally.courses > 0 {
            summaries.push(RatingSummary::from_tally(&category.name, &tally));
        }
    }

    Ok(summaries)
}

pub fn build_summary_report(summaries: &[RatingSummary]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Course Audit Summary");

    if summaries.is_empty() {
        let _ = writeln!(output, "No courses have been audited yet.");
        return output;
    }

    for summary in summaries {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", summary.scope);
        let _ = writeln!(output, "- Gold: {} ({:.1}%)", summary.gold, summary.gold_pc);
        let _ = writeln!(output, "- Silver: {} ({:.1}%)", summary.silver, summary.silver_pc);
        let _ = writeln!(output, "- Bronze: {} ({:.1}%)", summary.bronze, summary.bronze_pc);
        let _ = writeln!(
            output,
            "- In Dev: {} ({:.1}%)",
            summary.in_development, summary.in_development_pc
        );
        let _ = writeln!(output, "- Total courses: {}", summary.total);
    }

    output
}

/// Writes the courses of an audit run as a sheet for override review.
pub fn write_review_sheet(path: &Path, report: &AuditReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for course in &report.courses {
        writer.serialize(course)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a reviewed sheet back as override submissions.
pub fn read_review_sheet(path: &Path) -> Result<Vec<OverrideSubmission>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut submissions = Vec::new();

    for result in reader.deserialize::<ReviewRow>() {
        submissions.push(OverrideSubmission::from(result?));
    }

    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditedCourse, Category, Rating};
    use crate::reconcile::OverrideChoice;
    use std::env;
    use std::fs;

    fn tally(gold: i64, silver: i64, bronze: i64, excluded: i64, courses: i64) -> RatingTally {
        RatingTally {
            gold,
            silver,
            bronze,
            excluded,
            courses,
        }
    }

    #[test]
    fn excluded_courses_leave_the_total() {
        let summary = RatingSummary::from_tally("Site", &tally(2, 3, 5, 2, 22));
        assert_eq!(summary.total, 20);
        assert_eq!(summary.in_development, 10);
        assert!((summary.gold_pc - 10.0).abs() < 0.001);
        assert!((summary.silver_pc - 15.0).abs() < 0.001);
        assert!((summary.in_development_pc - 50.0).abs() < 0.001);
    }

    #[test]
    fn empty_scope_has_zero_percentages() {
        let summary = RatingSummary::from_tally("Empty", &tally(0, 0, 0, 0, 0));
        assert_eq!(summary.total, 0);
        assert_eq!(summary.gold_pc, 0.0);
        assert_eq!(summary.in_development_pc, 0.0);
    }

    #[test]
    fn report_formats_one_decimal() {
        let summaries = vec![RatingSummary::from_tally("Engineering", &tally(1, 0, 0, 0, 3))];
        let report = build_summary_report(&summaries);
        assert!(report.contains("## Engineering"));
        assert!(report.contains("- Gold: 1 (33.3%)"));
        assert!(report.contains("- In Dev: 2 (66.7%)"));
        assert!(report.contains("- Total courses: 3"));
    }

    #[test]
    fn review_sheet_reads_back_as_submissions() {
        let path = env::temp_dir()
            .join(format!("course_audit_review_{}.csv", uuid::Uuid::new_v4()));

        let report = AuditReport {
            run_id: uuid::Uuid::new_v4(),
            category: Category {
                id: 3,
                name: "Engineering".into(),
                path: "/3".into(),
            },
            courses: vec![
                AuditedCourse {
                    course_id: 10,
                    category_id: 3,
                    category: "Engineering".into(),
                    course: "Welding, Level 1".into(),
                    previous_rating: "".into(),
                    auto_rating: "Bronze".into(),
                    suggested_override: "".into(),
                },
                AuditedCourse {
                    course_id: 11,
                    category_id: 3,
                    category: "Engineering".into(),
                    course: "Welding, Level 2".into(),
                    previous_rating: "Gold".into(),
                    auto_rating: "Silver".into(),
                    suggested_override: "Gold".into(),
                },
            ],
            failures: vec![],
            skipped_categories: vec![],
        };

        write_review_sheet(&path, &report).unwrap();
        let submissions = read_review_sheet(&path).unwrap();

        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].auto_rating, Rating::Bronze);
        assert_eq!(submissions[0].choice, OverrideChoice::Clear);
        assert_eq!(submissions[1].course_id, 11);
        assert_eq!(submissions[1].choice, OverrideChoice::Gold);

        fs::remove_file(&path).unwrap();
    }
}
