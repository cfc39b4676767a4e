//! Batch audit of a category subtree and override processing.

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collector::{CollectorSettings, MetricCollector};
use crate::error::{AuditError, Result};
use crate::models::{
    AuditReport, AuditedCourse, Category, CategoryFailure, CategoryId, CourseFailure, CourseInfo,
    CourseRating, OverrideReport,
};
use crate::rating::compute_rating;
use crate::reconcile::{reconcile, suggested_override, OverrideSubmission};
use crate::source::AuditSource;

pub struct Auditor<S: AuditSource> {
    source: S,
    settings: CollectorSettings,
}

impl<S: AuditSource> Auditor<S> {
    pub fn new(source: S, settings: CollectorSettings) -> Self {
        Self { source, settings }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Rates every visible course under `category_id` and persists the results.
    ///
    /// A course or sub-category that fails is recorded in the report and the
    /// batch moves on.
    pub async fn audit_category(&self, category_id: CategoryId) -> Result<AuditReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("audit", %run_id, category_id);

        async move {
            let category = self
                .source
                .category(category_id)
                .await?
                .ok_or(AuditError::CategoryNotFound(category_id))?;

            let mut courses = Vec::new();
            let mut failures = Vec::new();
            let mut skipped_categories = Vec::new();

            for subcategory in self.source.list_audit_categories(category_id).await? {
                let visible = match self.source.list_visible_courses(subcategory.id).await {
                    Ok(visible) => visible,
                    Err(err) => {
                        warn!(category_id = subcategory.id, error = %err, "skipping category");
                        skipped_categories.push(CategoryFailure {
                            category_id: subcategory.id,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };
                for course in visible {
                    match self.audit_course(&subcategory, &course).await {
                        Ok(row) => courses.push(row),
                        Err(err) => {
                            warn!(course_id = course.id, error = %err, "skipping course");
                            failures.push(CourseFailure {
                                course_id: course.id,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }

            info!(
                audited = courses.len(),
                failed = failures.len(),
                skipped_categories = skipped_categories.len(),
                "audit finished for {}",
                category.name
            );

            Ok::<_, AuditError>(AuditReport {
                run_id,
                category,
                courses,
                failures,
                skipped_categories,
            })
        }
        .instrument(span)
        .await
    }

    async fn audit_course(&self, category: &Category, course: &CourseInfo) -> Result<AuditedCourse> {
        let mut record = match self.source.get_course_rating(course.id).await? {
            Some(record) => record,
            None => {
                let record = CourseRating::new(course.id);
                self.source.upsert_course_rating(&record).await?;
                record
            }
        };
        let previous = record.rating;

        let collector = MetricCollector::new(&self.source, self.settings.clone());
        let metrics = collector.collect(course.id, course.start_date).await?;
        let outcome = compute_rating(&metrics);

        record.record_audit(&metrics, outcome.scores, outcome.auto_rating);
        self.source.upsert_course_rating(&record).await?;

        info!(
            course_id = course.id,
            previous_rating = previous.label(),
            auto_rating = outcome.auto_rating.label(),
            "course rated"
        );

        Ok(AuditedCourse {
            course_id: course.id,
            category_id: category.id,
            category: category.name.clone(),
            course: course.full_name.clone(),
            previous_rating: previous.as_str().to_string(),
            auto_rating: outcome.auto_rating.as_str().to_string(),
            suggested_override: suggested_override(previous, outcome.auto_rating, record.override_flag)
                .as_str()
                .to_string(),
        })
    }

    /// Applies reviewed overrides, one course at a time.
    pub async fn apply_overrides(&self, submissions: Vec<OverrideSubmission>) -> Result<OverrideReport> {
        let mut report = OverrideReport::default();

        for submission in submissions {
            match self.apply_override(&submission).await {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(course_id = submission.course_id, error = %err, "override not applied");
                    report.failures.push(CourseFailure {
                        course_id: submission.course_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            applied = report.applied,
            failed = report.failures.len(),
            "overrides processed"
        );
        Ok(report)
    }

    async fn apply_override(&self, submission: &OverrideSubmission) -> Result<()> {
        let mut record = self
            .source
            .get_course_rating(submission.course_id)
            .await?
            .ok_or(AuditError::DataUnavailable {
                course_id: submission.course_id,
            })?;

        let settled = reconcile(submission.auto_rating, submission.choice);
        record.rating = settled.rating;
        record.override_flag = settled.override_flag;
        self.source.upsert_course_rating(&record).await
    }
}
