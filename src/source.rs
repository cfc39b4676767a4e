//! Data-access seam between the audit and the platform database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::filters::{ContentFilter, ContentTable};
use crate::models::{
    Category, CategoryId, CourseId, CourseInfo, CourseRating, ExportRow, RatingTally, UserId,
};

/// Context level of a course in the platform's permission model.
pub const COURSE_CONTEXT_LEVEL: i64 = 50;

/// Context level of a course module.
pub const MODULE_CONTEXT_LEVEL: i64 = 70;

/// Read and write access to everything the audit needs.
///
/// Implementations must be usable concurrently from the collector's
/// parallel counter queries.
#[async_trait]
pub trait AuditSource: Send + Sync {
    async fn category(&self, id: CategoryId) -> Result<Option<Category>>;

    async fn list_top_level_categories(&self) -> Result<Vec<Category>>;

    /// The category and its descendants ordered by path, minus excluded names.
    async fn list_audit_categories(&self, id: CategoryId) -> Result<Vec<Category>>;

    async fn list_visible_courses(&self, category_id: CategoryId) -> Result<Vec<CourseInfo>>;

    async fn course_exists(&self, course_id: CourseId) -> Result<bool>;

    async fn query_role_assigned_users(
        &self,
        course_id: CourseId,
        role_ids: &[i64],
        context_level: i64,
    ) -> Result<Vec<UserId>>;

    /// Log entries for the user in the course strictly after `since`.
    async fn count_recent_activity(
        &self,
        course_id: CourseId,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    async fn count_filtered(
        &self,
        course_id: CourseId,
        table: ContentTable,
        filter: &ContentFilter,
    ) -> Result<i64>;

    /// Submission count of every assignment in the course.
    async fn assignment_submission_counts(&self, course_id: CourseId) -> Result<Vec<i64>>;

    async fn last_content_update(&self, course_id: CourseId) -> Result<Option<DateTime<Utc>>>;

    async fn get_course_rating(&self, course_id: CourseId) -> Result<Option<CourseRating>>;

    /// Inserts or fully overwrites the row for `rating.course_id`.
    async fn upsert_course_rating(&self, rating: &CourseRating) -> Result<()>;

    async fn list_export_rows(&self) -> Result<Vec<ExportRow>>;

    /// Rating counts across the given categories, or the whole site for `None`.
    async fn rating_tally(&self, scope: Option<&[CategoryId]>) -> Result<RatingTally>;
}
