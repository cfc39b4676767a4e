use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::filters::{ContentFilter, ContentTable, HTML_BLOCK_DEFAULTS, RSS_BLOCK_DEFAULTS};
use crate::models::{BronzeCounts, CourseId, CourseMetrics, GoldCounts, SilverCounts};
use crate::source::{AuditSource, COURSE_CONTEXT_LEVEL};

/// Roles counted as enrolled: students and applicants.
pub const DEFAULT_ENROLLED_ROLES: &[i64] = &[5, 14];
pub const DEFAULT_ACTIVITY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub enrolled_roles: Vec<i64>,
    pub activity_window: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enrolled_roles: DEFAULT_ENROLLED_ROLES.to_vec(),
            activity_window: Duration::days(DEFAULT_ACTIVITY_WINDOW_DAYS),
        }
    }
}

/// Gathers the raw counters for a course from an [`AuditSource`].
pub struct MetricCollector<'a, S: AuditSource + ?Sized> {
    source: &'a S,
    settings: CollectorSettings,
}

impl<'a, S: AuditSource + ?Sized> MetricCollector<'a, S> {
    pub fn new(source: &'a S, settings: CollectorSettings) -> Self {
        Self { source, settings }
    }

    pub async fn collect(&self, course_id: CourseId, course_start: DateTime<Utc>) -> Result<CourseMetrics> {
        self.collect_at(course_id, course_start, Utc::now()).await
    }

    /// Collects metrics with activity measured back from `now`.
    pub async fn collect_at(
        &self,
        course_id: CourseId,
        course_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CourseMetrics> {
        if !self.source.course_exists(course_id).await? {
            return Err(AuditError::DataUnavailable { course_id });
        }

        let (enrolled_count, active_count) = self.enrolment(course_id, now).await?;

        let (bronze, silver, gold, last_content_update) = tokio::try_join!(
            self.bronze(course_id, course_start),
            self.silver(course_id, enrolled_count),
            self.gold(course_id, course_start),
            self.source.last_content_update(course_id),
        )?;

        debug!(
            course_id,
            enrolled_count, active_count, "collected course metrics"
        );

        Ok(CourseMetrics {
            course_id,
            enrolled_count,
            active_count,
            last_content_update,
            bronze,
            silver,
            gold,
        })
    }

    async fn enrolment(&self, course_id: CourseId, now: DateTime<Utc>) -> Result<(i64, i64)> {
        let users = self
            .source
            .query_role_assigned_users(course_id, &self.settings.enrolled_roles, COURSE_CONTEXT_LEVEL)
            .await?;

        let since = now - self.settings.activity_window;
        let mut active = 0;
        for user_id in &users {
            if self.source.count_recent_activity(course_id, *user_id, since).await? > 0 {
                active += 1;
            }
        }

        Ok((users.len() as i64, active))
    }

    async fn count(&self, course_id: CourseId, table: ContentTable, filter: ContentFilter) -> Result<i64> {
        self.source.count_filtered(course_id, table, &filter).await
    }

    async fn bronze(&self, course_id: CourseId, course_start: DateTime<Utc>) -> Result<BronzeCounts> {
        use ContentFilter::*;
        use ContentTable::*;

        let rich_media = self.count(course_id, Labels, RichText).await?
            + self.count(course_id, Sections, RichHeading).await?
            + self.count(course_id, Pages, RichText).await?
            + self.count(course_id, BookChapters, RichChapter).await?
            + self.count(course_id, ResourceFiles, MediaFile).await?;

        Ok(BronzeCounts {
            chapters: self.count(course_id, BookChapters, PlainChapter).await?,
            contents_blocks: self.count(course_id, ContentsBlocks, Any).await?,
            files: self.count(course_id, ResourceFiles, DocumentFile).await?,
            folders: self.count(course_id, Folders, Any).await?,
            galleries: self.count(course_id, Galleries, Any).await?,
            headings: self.count(course_id, Sections, PlainHeading).await?,
            html_blocks: self
                .count(course_id, HtmlBlocks, ConfiguredBlock(HTML_BLOCK_DEFAULTS))
                .await?,
            labels: self.count(course_id, Labels, PlainText).await?,
            links: self.count(course_id, Urls, PlainLink).await?,
            rich_media,
            news: self
                .count(course_id, NewsDiscussions, ModifiedSince(course_start))
                .await?,
            pages: self.count(course_id, Pages, PlainText).await?,
            feeds: self
                .count(course_id, RssBlocks, ConfiguredBlock(RSS_BLOCK_DEFAULTS))
                .await?,
        })
    }

    async fn silver(&self, course_id: CourseId, enrolled_count: i64) -> Result<SilverCounts> {
        use ContentFilter::Any;
        use ContentTable::*;

        let submissions = self.source.assignment_submission_counts(course_id).await?;

        Ok(SilverCounts {
            assignments: count_participating_assignments(&submissions, enrolled_count),
            polls: self.count(course_id, Polls, Any).await?,
            self_paced_packages: self.count(course_id, HotPots, Any).await?,
            sco_packages: self.count(course_id, ImsPackages, Any).await?,
            nln_materials: self.count(course_id, NlnMaterials, Any).await?,
            survey_questions: self.count(course_id, SurveyQuestions, Any).await?,
            quiz_questions: self.count(course_id, QuizQuestions, Any).await?,
            scorm_objects: self.count(course_id, ScormPackages, Any).await?,
        })
    }

    async fn gold(&self, course_id: CourseId, course_start: DateTime<Utc>) -> Result<GoldCounts> {
        use ContentFilter::*;
        use ContentTable::*;

        Ok(GoldCounts {
            chats: self.count(course_id, Chats, Any).await?,
            database_entries: self.count(course_id, DatabaseEntries, Any).await?,
            discussions: self
                .count(course_id, ForumDiscussions, ModifiedSince(course_start))
                .await?,
            glossary_entries: self.count(course_id, GlossaryEntries, Any).await?,
            wiki_pages: self.count(course_id, WikiPages, WikiTitle).await?,
        })
    }
}

/// Assignments with submissions from at least half of the enrolled users.
///
/// `submissions >= enrolled / 2` over the reals, so an odd enrolment of 3
/// needs 2 submissions and an empty course counts every assignment.
pub fn count_participating_assignments(submissions: &[i64], enrolled_count: i64) -> i64 {
    submissions
        .iter()
        .filter(|&&submitted| 2 * submitted >= enrolled_count)
        .count() as i64
}
