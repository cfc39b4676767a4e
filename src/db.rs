use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::Result;
use crate::filters::{ContentFilter, ContentRow, ContentTable};
use crate::models::{
    BronzeCounts, Category, CategoryId, CourseId, CourseInfo, CourseRating, ExportRow, GoldCounts,
    Rating, RatingTally, SilverCounts, TierScores, UserId,
};
use crate::rating::{BRONZE_WEIGHTS, GOLD_WEIGHTS, SILVER_WEIGHTS};
use crate::source::{AuditSource, COURSE_CONTEXT_LEVEL, MODULE_CONTEXT_LEVEL};

const RATING_TABLE: &str = "course_audit_rating";

/// [`AuditSource`] backed by the learning platform's Postgres schema.
#[derive(Clone)]
pub struct PostgresSource {
    pool: PgPool,
    prefix: String,
    excluded_categories: Vec<String>,
}

impl PostgresSource {
    pub fn new(pool: PgPool, prefix: &str, excluded_categories: Vec<String>) -> Self {
        Self {
            pool,
            prefix: prefix.to_string(),
            excluded_categories,
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn is_excluded(&self, category_name: &str) -> bool {
        let name = category_name.to_lowercase();
        self.excluded_categories
            .iter()
            .any(|fragment| name.contains(fragment.as_str()))
    }

    /// Creates the rating table if it does not exist yet.
    pub async fn init_db(&self) -> Result<()> {
        let mut columns = vec![
            "id BIGSERIAL PRIMARY KEY".to_string(),
            "course_id BIGINT NOT NULL UNIQUE".to_string(),
            "enrolled_count BIGINT NOT NULL DEFAULT 0".to_string(),
            "active_count BIGINT NOT NULL DEFAULT 0".to_string(),
            "active_percent BIGINT NOT NULL DEFAULT 0".to_string(),
            "last_content_update BIGINT".to_string(),
        ];
        for name in counter_columns() {
            columns.push(format!("{name} BIGINT NOT NULL DEFAULT 0"));
        }
        columns.extend([
            "bronze_score BIGINT NOT NULL DEFAULT 0".to_string(),
            "silver_score BIGINT NOT NULL DEFAULT 0".to_string(),
            "gold_score BIGINT NOT NULL DEFAULT 0".to_string(),
            "auto_rating TEXT NOT NULL DEFAULT ''".to_string(),
            "rating TEXT NOT NULL DEFAULT ''".to_string(),
            "override_flag BOOLEAN NOT NULL DEFAULT FALSE".to_string(),
        ]);

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table(RATING_TABLE),
            columns.join(",\n    ")
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    fn category_from_row(row: &PgRow) -> Category {
        Category {
            id: row.get("id"),
            name: row.get("name"),
            path: row.get("path"),
        }
    }

    /// Candidate rows of a content table for one course.
    ///
    /// Every query yields `name`, `body` and `modified_at` columns, with `$1`
    /// bound to the course id.
    fn content_rows_sql(&self, table: ContentTable) -> String {
        let p = &self.prefix;
        let block = |blockname: &str| {
            format!(
                "SELECT bi.blockname AS name, bi.configdata AS body, NULL::bigint AS modified_at \
                 FROM {p}block_instances bi \
                 JOIN {p}context ctx ON bi.parentcontextid = ctx.id \
                 WHERE ctx.instanceid = $1 AND ctx.contextlevel = {COURSE_CONTEXT_LEVEL} \
                 AND bi.blockname = '{blockname}' AND bi.pagetypepattern LIKE 'course-%'"
            )
        };
        let per_course = |name: &str| {
            format!(
                "SELECT NULL::text AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}{name} WHERE course = $1"
            )
        };
        let body_column = |name: &str, column: &str| {
            format!(
                "SELECT NULL::text AS name, {column}::text AS body, NULL::bigint AS modified_at \
                 FROM {p}{name} WHERE course = $1"
            )
        };
        let discussions = |news: bool| {
            let op = if news { "=" } else { "<>" };
            format!(
                "SELECT NULL::text AS name, NULL::text AS body, fd.timemodified AS modified_at \
                 FROM {p}forum_discussions fd \
                 JOIN {p}forum f ON fd.forum = f.id \
                 WHERE f.course = $1 AND f.type {op} 'news'"
            )
        };

        match table {
            ContentTable::BookChapters => format!(
                "SELECT NULL::text AS name, ch.content AS body, NULL::bigint AS modified_at \
                 FROM {p}book_chapters ch JOIN {p}book b ON ch.bookid = b.id \
                 WHERE b.course = $1"
            ),
            ContentTable::ContentsBlocks => block("course_contents"),
            ContentTable::HtmlBlocks => block("html"),
            ContentTable::RssBlocks => block("rss_client"),
            ContentTable::ResourceFiles => format!(
                "SELECT f.filename AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}files f \
                 JOIN {p}context ctx ON f.contextid = ctx.id \
                 JOIN {p}course_modules cm ON ctx.instanceid = cm.id \
                 WHERE cm.course = $1 AND ctx.contextlevel = {MODULE_CONTEXT_LEVEL} \
                 AND f.component = 'mod_resource'"
            ),
            ContentTable::Folders => per_course("folder"),
            ContentTable::Galleries => per_course("lightboxgallery"),
            ContentTable::Sections => format!(
                "SELECT name, summary AS body, NULL::bigint AS modified_at \
                 FROM {p}course_sections WHERE course = $1"
            ),
            ContentTable::Labels => body_column("label", "intro"),
            ContentTable::Urls => body_column("url", "externalurl"),
            ContentTable::Pages => body_column("page", "content"),
            ContentTable::NewsDiscussions => discussions(true),
            ContentTable::ForumDiscussions => discussions(false),
            ContentTable::Polls => per_course("choice"),
            ContentTable::HotPots => per_course("hotpot"),
            ContentTable::ImsPackages => per_course("imscp"),
            ContentTable::NlnMaterials => per_course("nln"),
            ContentTable::ScormPackages => per_course("scorm"),
            ContentTable::Chats => per_course("chat"),
            ContentTable::SurveyQuestions => format!(
                "SELECT NULL::text AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}questionnaire_question q \
                 JOIN {p}questionnaire_survey s ON q.survey_id = s.id \
                 WHERE q.deleted = 'n' AND s.owner = (CAST($1 AS BIGINT))::text"
            ),
            ContentTable::QuizQuestions => format!(
                "SELECT NULL::text AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}quiz_question_instances qi JOIN {p}quiz q ON qi.quiz = q.id \
                 WHERE q.course = $1"
            ),
            ContentTable::DatabaseEntries => format!(
                "SELECT NULL::text AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}data_records r JOIN {p}data d ON r.dataid = d.id \
                 WHERE d.course = $1"
            ),
            ContentTable::GlossaryEntries => format!(
                "SELECT NULL::text AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}glossary_entries e JOIN {p}glossary g ON e.glossaryid = g.id \
                 WHERE g.course = $1"
            ),
            ContentTable::WikiPages => format!(
                "SELECT DISTINCT wp.title AS name, NULL::text AS body, NULL::bigint AS modified_at \
                 FROM {p}wiki_pages wp \
                 JOIN {p}wiki_subwikis sw ON wp.subwikiid = sw.id \
                 JOIN {p}wiki w ON sw.wikiid = w.id \
                 WHERE w.course = $1"
            ),
        }
    }
}

#[async_trait]
impl AuditSource for PostgresSource {
    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        let query = format!(
            "SELECT id, name, path FROM {} WHERE id = $1",
            self.table("course_categories")
        );
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(Self::category_from_row))
    }

    async fn list_top_level_categories(&self) -> Result<Vec<Category>> {
        let query = format!(
            "SELECT id, name, path FROM {} WHERE depth = 1 ORDER BY name ASC",
            self.table("course_categories")
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::category_from_row).collect())
    }

    async fn list_audit_categories(&self, id: CategoryId) -> Result<Vec<Category>> {
        let query = format!(
            "SELECT id, name, path FROM {} WHERE id = $1 OR path LIKE $2 ORDER BY path",
            self.table("course_categories")
        );
        let rows = sqlx::query(&query)
            .bind(id)
            .bind(format!("%/{id}/%"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(Self::category_from_row)
            .filter(|category| !self.is_excluded(&category.name))
            .collect())
    }

    async fn list_visible_courses(&self, category_id: CategoryId) -> Result<Vec<CourseInfo>> {
        let query = format!(
            "SELECT id, category, fullname, startdate FROM {} \
             WHERE category = $1 AND visible = 1 ORDER BY sortorder ASC",
            self.table("course")
        );
        let rows = sqlx::query(&query)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| CourseInfo {
                id: row.get("id"),
                category_id: row.get("category"),
                full_name: row.get("fullname"),
                start_date: timestamp(row.get("startdate")).unwrap_or_default(),
            })
            .collect())
    }

    async fn course_exists(&self, course_id: CourseId) -> Result<bool> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            self.table("course")
        );
        let exists: bool = sqlx::query_scalar(&query)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn query_role_assigned_users(
        &self,
        course_id: CourseId,
        role_ids: &[i64],
        context_level: i64,
    ) -> Result<Vec<UserId>> {
        let query = format!(
            "SELECT ra.userid FROM {} ra \
             JOIN {} ctx ON ra.contextid = ctx.id \
             WHERE ra.roleid = ANY($1) AND ctx.contextlevel = $2 AND ctx.instanceid = $3",
            self.table("role_assignments"),
            self.table("context")
        );
        let users: Vec<i64> = sqlx::query_scalar(&query)
            .bind(role_ids)
            .bind(context_level)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn count_recent_activity(
        &self,
        course_id: CourseId,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE course = $1 AND userid = $2 AND time > $3",
            self.table("log")
        );
        let count: i64 = sqlx::query_scalar(&query)
            .bind(course_id)
            .bind(user_id)
            .bind(since.timestamp())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_filtered(
        &self,
        course_id: CourseId,
        table: ContentTable,
        filter: &ContentFilter,
    ) -> Result<i64> {
        let rows_sql = self.content_rows_sql(table);

        if *filter == ContentFilter::Any {
            let query = format!("SELECT COUNT(*) FROM ({rows_sql}) candidates");
            let count: i64 = sqlx::query_scalar(&query)
                .bind(course_id)
                .fetch_one(&self.pool)
                .await?;
            return Ok(count);
        }

        let rows: Vec<ContentRow> = sqlx::query(&rows_sql)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| ContentRow {
                name: row.get("name"),
                body: row.get("body"),
                modified_at: row.get::<Option<i64>, _>("modified_at").and_then(timestamp),
            })
            .collect();

        let count = filter.count(&rows);
        debug!(course_id, ?table, fetched = rows.len(), count, "filtered content rows");
        Ok(count)
    }

    async fn assignment_submission_counts(&self, course_id: CourseId) -> Result<Vec<i64>> {
        let query = format!(
            "SELECT COUNT(s.id) FROM {} a \
             LEFT JOIN {} s ON s.assignment = a.id \
             WHERE a.course = $1 GROUP BY a.id",
            self.table("assignment"),
            self.table("assignment_submissions")
        );
        let counts: Vec<i64> = sqlx::query_scalar(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(counts)
    }

    async fn last_content_update(&self, course_id: CourseId) -> Result<Option<DateTime<Utc>>> {
        let query = format!(
            "SELECT MAX(time) FROM {} WHERE course = $1 AND module = 'course' \
             AND action IN ('add mod', 'update mod', 'delete mod')",
            self.table("log")
        );
        let latest: Option<i64> = sqlx::query_scalar(&query)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(latest.and_then(timestamp))
    }

    async fn get_course_rating(&self, course_id: CourseId) -> Result<Option<CourseRating>> {
        let query = format!(
            "SELECT * FROM {} WHERE course_id = $1",
            self.table(RATING_TABLE)
        );
        let row = sqlx::query(&query)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(rating_from_row))
    }

    async fn upsert_course_rating(&self, rating: &CourseRating) -> Result<()> {
        let columns = rating_columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
        let updates: Vec<String> = columns[1..]
            .iter()
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect();

        let query = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (course_id) DO UPDATE SET {}",
            self.table(RATING_TABLE),
            columns.join(", "),
            placeholders.join(", "),
            updates.join(", ")
        );

        let mut statement = sqlx::query(&query)
            .bind(rating.course_id)
            .bind(rating.enrolled_count)
            .bind(rating.active_count)
            .bind(rating.active_percent)
            .bind(rating.last_content_update.map(|at| at.timestamp()));
        for value in rating.bronze.values() {
            statement = statement.bind(value);
        }
        for value in rating.silver.values() {
            statement = statement.bind(value);
        }
        for value in rating.gold.values() {
            statement = statement.bind(value);
        }
        statement
            .bind(rating.scores.bronze)
            .bind(rating.scores.silver)
            .bind(rating.scores.gold)
            .bind(rating.auto_rating.as_str())
            .bind(rating.rating.as_str())
            .bind(rating.override_flag)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_export_rows(&self) -> Result<Vec<ExportRow>> {
        let query = format!(
            "SELECT cr.*, ca.name AS category_name, co.fullname, co.startdate \
             FROM {} cr \
             JOIN {} co ON cr.course_id = co.id \
             JOIN {} ca ON co.category = ca.id \
             ORDER BY co.sortorder ASC",
            self.table(RATING_TABLE),
            self.table("course"),
            self.table("course_categories")
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| ExportRow {
                category: row.get("category_name"),
                course: row.get("fullname"),
                start_date: timestamp(row.get("startdate")).unwrap_or_default(),
                rating: rating_from_row(row),
            })
            .collect())
    }

    async fn rating_tally(&self, scope: Option<&[CategoryId]>) -> Result<RatingTally> {
        let mut ratings_sql = format!(
            "SELECT cr.rating, COUNT(*) AS total FROM {} cr JOIN {} co ON cr.course_id = co.id",
            self.table(RATING_TABLE),
            self.table("course")
        );
        let mut courses_sql = format!(
            "SELECT ca.name, COUNT(co.id) AS total FROM {} co \
             JOIN {} ca ON co.category = ca.id WHERE co.visible = 1",
            self.table("course"),
            self.table("course_categories")
        );
        if scope.is_some() {
            ratings_sql.push_str(" WHERE co.category = ANY($1)");
            courses_sql.push_str(" AND co.category = ANY($1)");
        }
        ratings_sql.push_str(" GROUP BY cr.rating");
        courses_sql.push_str(" GROUP BY ca.name");

        let mut ratings = sqlx::query(&ratings_sql);
        let mut courses = sqlx::query(&courses_sql);
        if let Some(ids) = scope {
            ratings = ratings.bind(ids);
            courses = courses.bind(ids);
        }

        let mut tally = RatingTally::default();
        for row in ratings.fetch_all(&self.pool).await? {
            let total: i64 = row.get("total");
            match Rating::from_stored(row.get("rating")) {
                Rating::Gold => tally.gold += total,
                Rating::Silver => tally.silver += total,
                Rating::Bronze => tally.bronze += total,
                Rating::Excluded => tally.excluded += total,
                Rating::InDevelopment => {}
            }
        }
        for row in courses.fetch_all(&self.pool).await? {
            let name: String = row.get("name");
            if !self.is_excluded(&name) {
                tally.courses += row.get::<i64, _>("total");
            }
        }

        Ok(tally)
    }
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0)
}

fn counter_columns() -> impl Iterator<Item = &'static str> {
    BRONZE_WEIGHTS
        .iter()
        .chain(SILVER_WEIGHTS.iter())
        .chain(GOLD_WEIGHTS.iter())
        .map(|(name, _)| *name)
}

/// Rating table columns in bind order, `course_id` first.
fn rating_columns() -> Vec<&'static str> {
    let mut columns = vec![
        "course_id",
        "enrolled_count",
        "active_count",
        "active_percent",
        "last_content_update",
    ];
    columns.extend(counter_columns());
    columns.extend([
        "bronze_score",
        "silver_score",
        "gold_score",
        "auto_rating",
        "rating",
        "override_flag",
    ]);
    columns
}

fn rating_from_row(row: &PgRow) -> CourseRating {
    CourseRating {
        course_id: row.get("course_id"),
        enrolled_count: row.get("enrolled_count"),
        active_count: row.get("active_count"),
        active_percent: row.get("active_percent"),
        last_content_update: row
            .get::<Option<i64>, _>("last_content_update")
            .and_then(timestamp),
        bronze: BronzeCounts {
            chapters: row.get("chapters"),
            contents_blocks: row.get("contents_blocks"),
            files: row.get("files"),
            folders: row.get("folders"),
            galleries: row.get("galleries"),
            headings: row.get("headings"),
            html_blocks: row.get("html_blocks"),
            labels: row.get("labels"),
            links: row.get("links"),
            rich_media: row.get("rich_media"),
            news: row.get("news"),
            pages: row.get("pages"),
            feeds: row.get("feeds"),
        },
        silver: SilverCounts {
            assignments: row.get("assignments"),
            polls: row.get("polls"),
            self_paced_packages: row.get("self_paced_packages"),
            sco_packages: row.get("sco_packages"),
            nln_materials: row.get("nln_materials"),
            survey_questions: row.get("survey_questions"),
            quiz_questions: row.get("quiz_questions"),
            scorm_objects: row.get("scorm_objects"),
        },
        gold: GoldCounts {
            chats: row.get("chats"),
            database_entries: row.get("database_entries"),
            discussions: row.get("discussions"),
            glossary_entries: row.get("glossary_entries"),
            wiki_pages: row.get("wiki_pages"),
        },
        scores: TierScores {
            bronze: row.get("bronze_score"),
            silver: row.get("silver_score"),
            gold: row.get("gold_score"),
        },
        auto_rating: Rating::from_stored(row.get("auto_rating")),
        rating: Rating::from_stored(row.get("rating")),
        override_flag: row.get("override_flag"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_columns_match_bind_order() {
        let columns = rating_columns();
        assert_eq!(columns.len(), 5 + 13 + 8 + 5 + 6);
        assert_eq!(columns[0], "course_id");
        assert_eq!(columns[5], "chapters");
        assert_eq!(columns[18], "assignments");
        assert_eq!(columns[26], "chats");
        assert_eq!(columns.last(), Some(&"override_flag"));
    }

    #[tokio::test]
    async fn block_rows_use_course_context_level() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/lms")
            .unwrap();
        let source = PostgresSource::new(pool, "mdl_", Vec::new());

        let blocks = source.content_rows_sql(ContentTable::HtmlBlocks);
        assert!(blocks.contains(&format!("ctx.contextlevel = {COURSE_CONTEXT_LEVEL}")));
        assert!(blocks.contains("mdl_block_instances"));

        let files = source.content_rows_sql(ContentTable::ResourceFiles);
        assert!(files.contains(&format!("ctx.contextlevel = {MODULE_CONTEXT_LEVEL}")));
    }

    #[test]
    fn zero_timestamp_means_never() {
        assert_eq!(timestamp(0), None);
        assert!(timestamp(1_790_000_000).is_some());
    }
}
