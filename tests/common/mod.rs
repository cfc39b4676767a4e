use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use course_audit::filters::{ContentFilter, ContentRow, ContentTable};
use course_audit::models::{
    Category, CategoryId, CourseId, CourseInfo, CourseRating, ExportRow, Rating, RatingTally,
    UserId,
};
use course_audit::{AuditError, AuditSource, Result};

/// In-memory platform data for driving the auditor in tests.
#[derive(Default)]
pub struct MemorySource {
    categories: Vec<Category>,
    courses: Vec<CourseInfo>,
    vanished: HashSet<CourseId>,
    unreadable: HashSet<CategoryId>,
    enrolments: HashMap<CourseId, Vec<UserId>>,
    activity: HashMap<(CourseId, UserId), Vec<DateTime<Utc>>>,
    content: HashMap<(CourseId, ContentTable), Vec<ContentRow>>,
    submissions: HashMap<CourseId, Vec<i64>>,
    last_update: HashMap<CourseId, DateTime<Utc>>,
    ratings: Mutex<HashMap<CourseId, CourseRating>>,
}

pub fn course_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap()
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, id: CategoryId, name: &str, path: &str) -> Self {
        self.categories.push(Category {
            id,
            name: name.to_string(),
            path: path.to_string(),
        });
        self
    }

    pub fn course(mut self, id: CourseId, category_id: CategoryId, name: &str) -> Self {
        self.courses.push(CourseInfo {
            id,
            category_id,
            full_name: name.to_string(),
            start_date: course_start(),
        });
        self
    }

    /// Listed as visible but gone by the time metrics are collected.
    pub fn vanished(mut self, id: CourseId) -> Self {
        self.vanished.insert(id);
        self
    }

    /// Course listing for this category fails.
    pub fn unreadable(mut self, id: CategoryId) -> Self {
        self.unreadable.insert(id);
        self
    }

    /// Enrols `total` users of which the first `active` used the course recently.
    pub fn enrol(mut self, course_id: CourseId, total: i64, active: i64) -> Self {
        let users: Vec<UserId> = (1..=total).map(|n| course_id * 1000 + n).collect();
        for user in users.iter().take(active as usize) {
            self.activity
                .entry((course_id, *user))
                .or_default()
                .push(Utc::now() - Duration::days(2));
        }
        for user in users.iter().skip(active as usize) {
            self.activity
                .entry((course_id, *user))
                .or_default()
                .push(Utc::now() - Duration::days(45));
        }
        self.enrolments.insert(course_id, users);
        self
    }

    /// Enrols one user per timestamp, each last seen at that time.
    pub fn seen_at(mut self, course_id: CourseId, times: &[DateTime<Utc>]) -> Self {
        let users = self.enrolments.entry(course_id).or_default();
        for at in times {
            let user = course_id * 1000 + users.len() as i64 + 1;
            users.push(user);
            self.activity.entry((course_id, user)).or_default().push(*at);
        }
        self
    }

    pub fn content(mut self, course_id: CourseId, table: ContentTable, rows: Vec<ContentRow>) -> Self {
        self.content.entry((course_id, table)).or_default().extend(rows);
        self
    }

    pub fn plain_items(self, course_id: CourseId, table: ContentTable, count: usize) -> Self {
        self.content(course_id, table, vec![ContentRow::default(); count])
    }

    pub fn submissions(mut self, course_id: CourseId, counts: Vec<i64>) -> Self {
        self.submissions.insert(course_id, counts);
        self
    }

    pub fn stored(&self, course_id: CourseId) -> Option<CourseRating> {
        self.ratings.lock().unwrap().get(&course_id).cloned()
    }
}

#[async_trait]
impl AuditSource for MemorySource {
    async fn category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_top_level_categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.path.matches('/').count() == 1)
            .cloned()
            .collect())
    }

    async fn list_audit_categories(&self, id: CategoryId) -> Result<Vec<Category>> {
        let marker = format!("/{id}/");
        let mut found: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| c.id == id || c.path.contains(&marker))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    async fn list_visible_courses(&self, category_id: CategoryId) -> Result<Vec<CourseInfo>> {
        if self.unreadable.contains(&category_id) {
            return Err(AuditError::Io(io::Error::other("connection reset")));
        }
        Ok(self
            .courses
            .iter()
            .filter(|c| c.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn course_exists(&self, course_id: CourseId) -> Result<bool> {
        Ok(!self.vanished.contains(&course_id) && self.courses.iter().any(|c| c.id == course_id))
    }

    async fn query_role_assigned_users(
        &self,
        course_id: CourseId,
        _role_ids: &[i64],
        _context_level: i64,
    ) -> Result<Vec<UserId>> {
        Ok(self.enrolments.get(&course_id).cloned().unwrap_or_default())
    }

    async fn count_recent_activity(
        &self,
        course_id: CourseId,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .activity
            .get(&(course_id, user_id))
            .map(|times| times.iter().filter(|at| **at > since).count() as i64)
            .unwrap_or(0))
    }

    async fn count_filtered(
        &self,
        course_id: CourseId,
        table: ContentTable,
        filter: &ContentFilter,
    ) -> Result<i64> {
        Ok(self
            .content
            .get(&(course_id, table))
            .map(|rows| filter.count(rows))
            .unwrap_or(0))
    }

    async fn assignment_submission_counts(&self, course_id: CourseId) -> Result<Vec<i64>> {
        Ok(self.submissions.get(&course_id).cloned().unwrap_or_default())
    }

    async fn last_content_update(&self, course_id: CourseId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.last_update.get(&course_id).copied())
    }

    async fn get_course_rating(&self, course_id: CourseId) -> Result<Option<CourseRating>> {
        Ok(self.stored(course_id))
    }

    async fn upsert_course_rating(&self, rating: &CourseRating) -> Result<()> {
        self.ratings
            .lock()
            .unwrap()
            .insert(rating.course_id, rating.clone());
        Ok(())
    }

    async fn list_export_rows(&self) -> Result<Vec<ExportRow>> {
        let ratings = self.ratings.lock().unwrap();
        Ok(self
            .courses
            .iter()
            .filter_map(|course| {
                let rating = ratings.get(&course.id)?.clone();
                let category = self.categories.iter().find(|c| c.id == course.category_id)?;
                Some(ExportRow {
                    category: category.name.clone(),
                    course: course.full_name.clone(),
                    start_date: course.start_date,
                    rating,
                })
            })
            .collect())
    }

    async fn rating_tally(&self, scope: Option<&[CategoryId]>) -> Result<RatingTally> {
        let ratings = self.ratings.lock().unwrap();
        let mut tally = RatingTally::default();

        for course in &self.courses {
            if scope.is_some_and(|ids| !ids.contains(&course.category_id)) {
                continue;
            }
            tally.courses += 1;
            match ratings.get(&course.id).map(|r| r.rating) {
                Some(Rating::Gold) => tally.gold += 1,
                Some(Rating::Silver) => tally.silver += 1,
                Some(Rating::Bronze) => tally.bronze += 1,
                Some(Rating::Excluded) => tally.excluded += 1,
                _ => {}
            }
        }

        Ok(tally)
    }
}
