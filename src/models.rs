use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CourseId = i64;
pub type CategoryId = i64;
pub type UserId = i64;

/// Quality rating held by a course record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rating {
    /// No tier attained. Stored as an empty string.
    #[default]
    InDevelopment,
    Bronze,
    Silver,
    Gold,
    /// Only reachable through an administrator override.
    Excluded,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::InDevelopment => "",
            Rating::Bronze => "Bronze",
            Rating::Silver => "Silver",
            Rating::Gold => "Gold",
            Rating::Excluded => "Exclude",
        }
    }

    /// Label shown in summaries, where the empty stored value reads badly.
    pub fn label(&self) -> &'static str {
        match self {
            Rating::InDevelopment => "In Dev",
            other => other.as_str(),
        }
    }

    /// Parses a stored rating value. Unknown values read as in development.
    pub fn from_stored(value: &str) -> Rating {
        match value.trim().to_ascii_lowercase().as_str() {
            "bronze" => Rating::Bronze,
            "silver" => Rating::Silver,
            "gold" => Rating::Gold,
            "exclude" | "excluded" => Rating::Excluded,
            _ => Rating::InDevelopment,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct CourseInfo {
    pub id: CourseId,
    pub category_id: CategoryId,
    pub full_name: String,
    pub start_date: DateTime<Utc>,
}

/// Tier-1 content counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BronzeCounts {
    pub chapters: i64,
    pub contents_blocks: i64,
    pub files: i64,
    pub folders: i64,
    pub galleries: i64,
    pub headings: i64,
    pub html_blocks: i64,
    pub labels: i64,
    pub links: i64,
    pub rich_media: i64,
    pub news: i64,
    pub pages: i64,
    pub feeds: i64,
}

/// Tier-2 interactive activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SilverCounts {
    pub assignments: i64,
    pub polls: i64,
    pub self_paced_packages: i64,
    pub sco_packages: i64,
    pub nln_materials: i64,
    pub survey_questions: i64,
    pub quiz_questions: i64,
    pub scorm_objects: i64,
}

/// Tier-3 collaborative activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoldCounts {
    pub chats: i64,
    pub database_entries: i64,
    pub discussions: i64,
    pub glossary_entries: i64,
    pub wiki_pages: i64,
}

/// Raw counters gathered for one course during one audit run.
#[derive(Debug, Clone, Default)]
pub struct CourseMetrics {
    pub course_id: CourseId,
    pub enrolled_count: i64,
    pub active_count: i64,
    pub last_content_update: Option<DateTime<Utc>>,
    pub bronze: BronzeCounts,
    pub silver: SilverCounts,
    pub gold: GoldCounts,
}

impl CourseMetrics {
    /// Share of enrolled users active in the window, rounded half away from zero.
    pub fn active_percent(&self) -> i64 {
        if self.enrolled_count <= 0 || self.active_count <= 0 {
            return 0;
        }
        let percent = self.active_count as f64 / self.enrolled_count as f64 * 100.0;
        (percent.round() as i64).clamp(0, 100)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierScores {
    pub bronze: i64,
    pub silver: i64,
    pub gold: i64,
}

/// Persisted rating row, one per audited course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRating {
    pub course_id: CourseId,
    pub enrolled_count: i64,
    pub active_count: i64,
    pub active_percent: i64,
    pub last_content_update: Option<DateTime<Utc>>,
    pub bronze: BronzeCounts,
    pub silver: SilverCounts,
    pub gold: GoldCounts,
    pub scores: TierScores,
    pub auto_rating: Rating,
    pub rating: Rating,
    pub override_flag: bool,
}

impl CourseRating {
    /// Blank row written the first time an audit encounters a course.
    pub fn new(course_id: CourseId) -> Self {
        Self {
            course_id,
            enrolled_count: 0,
            active_count: 0,
            active_percent: 0,
            last_content_update: None,
            bronze: BronzeCounts::default(),
            silver: SilverCounts::default(),
            gold: GoldCounts::default(),
            scores: TierScores::default(),
            auto_rating: Rating::InDevelopment,
            rating: Rating::InDevelopment,
            override_flag: false,
        }
    }

    /// Mirrors fresh metrics and the computed rating into the row.
    ///
    /// Tier scores are only replaced when scoring ran. The current rating
    /// follows the automatic one unless an administrator override is active.
    pub fn record_audit(&mut self, metrics: &CourseMetrics, scores: Option<TierScores>, auto: Rating) {
        self.enrolled_count = metrics.enrolled_count;
        self.active_count = metrics.active_count;
        self.active_percent = metrics.active_percent();
        self.last_content_update = metrics.last_content_update;
        self.bronze = metrics.bronze;
        self.silver = metrics.silver;
        self.gold = metrics.gold;
        if let Some(scores) = scores {
            self.scores = scores;
        }
        self.auto_rating = auto;
        if !self.override_flag {
            self.rating = auto;
        }
    }
}

/// One line of the display summary produced by an audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditedCourse {
    pub course_id: CourseId,
    pub category_id: CategoryId,
    pub category: String,
    pub course: String,
    pub previous_rating: String,
    pub auto_rating: String,
    /// Override option preselected for the reviewer, empty when none.
    #[serde(rename = "override")]
    pub suggested_override: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFailure {
    pub course_id: CourseId,
    pub reason: String,
}

/// Sub-category whose courses could not be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    pub category_id: CategoryId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub run_id: uuid::Uuid,
    pub category: Category,
    pub courses: Vec<AuditedCourse>,
    pub failures: Vec<CourseFailure>,
    pub skipped_categories: Vec<CategoryFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideReport {
    pub applied: usize,
    pub failures: Vec<CourseFailure>,
}

/// Persisted rating joined with the course details used for export.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub category: String,
    pub course: String,
    pub start_date: DateTime<Utc>,
    pub rating: CourseRating,
}

/// Raw rating counts for a scope of categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingTally {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
    pub excluded: i64,
    /// Visible courses in the scope, excluded ones included.
    pub courses: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(enrolled: i64, active: i64) -> CourseMetrics {
        CourseMetrics {
            course_id: 7,
            enrolled_count: enrolled,
            active_count: active,
            ..CourseMetrics::default()
        }
    }

    #[test]
    fn active_percent_rounds_half_up() {
        assert_eq!(metrics(10, 6).active_percent(), 60);
        assert_eq!(metrics(3, 1).active_percent(), 33);
        assert_eq!(metrics(3, 2).active_percent(), 67);
        assert_eq!(metrics(8, 1).active_percent(), 13);
    }

    #[test]
    fn active_percent_is_zero_without_enrolments() {
        assert_eq!(metrics(0, 0).active_percent(), 0);
        assert_eq!(metrics(0, 4).active_percent(), 0);
    }

    #[test]
    fn stored_ratings_parse_case_insensitively() {
        assert_eq!(Rating::from_stored("gold"), Rating::Gold);
        assert_eq!(Rating::from_stored("Silver "), Rating::Silver);
        assert_eq!(Rating::from_stored("Exclude"), Rating::Excluded);
        assert_eq!(Rating::from_stored(""), Rating::InDevelopment);
        assert_eq!(Rating::from_stored("platinum"), Rating::InDevelopment);
    }

    #[test]
    fn record_audit_keeps_override() {
        let mut row = CourseRating::new(7);
        row.rating = Rating::Excluded;
        row.override_flag = true;

        row.record_audit(&metrics(10, 6), None, Rating::Bronze);
        assert_eq!(row.auto_rating, Rating::Bronze);
        assert_eq!(row.rating, Rating::Excluded);
        assert_eq!(row.active_percent, 60);
    }

    #[test]
    fn record_audit_follows_auto_rating_without_override() {
        let mut row = CourseRating::new(7);
        row.rating = Rating::Gold;

        let scores = TierScores { bronze: 31, silver: 0, gold: 0 };
        row.record_audit(&metrics(10, 6), Some(scores), Rating::Bronze);
        assert_eq!(row.rating, Rating::Bronze);
        assert_eq!(row.scores, scores);
    }
}
