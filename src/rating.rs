use crate::models::{BronzeCounts, CourseMetrics, GoldCounts, Rating, SilverCounts, TierScores};

/// Weight of each bronze counter, in [`BronzeCounts::values`] order.
pub static BRONZE_WEIGHTS: [(&str, i64); 13] = [
    ("chapters", 2),
    ("contents_blocks", 3),
    ("files", 1),
    ("folders", 1),
    ("galleries", 5),
    ("headings", 1),
    ("html_blocks", 2),
    ("labels", 1),
    ("links", 1),
    ("rich_media", 5),
    ("news", 2),
    ("pages", 2),
    ("feeds", 3),
];

/// Weight of each silver counter, in [`SilverCounts::values`] order.
pub static SILVER_WEIGHTS: [(&str, i64); 8] = [
    ("assignments", 10),
    ("polls", 5),
    ("self_paced_packages", 10),
    ("sco_packages", 5),
    ("nln_materials", 5),
    ("survey_questions", 1),
    ("quiz_questions", 2),
    ("scorm_objects", 10),
];

/// Weight of each gold counter, in [`GoldCounts::values`] order.
pub static GOLD_WEIGHTS: [(&str, i64); 5] = [
    ("chats", 5),
    ("database_entries", 5),
    ("discussions", 5),
    ("glossary_entries", 5),
    ("wiki_pages", 5),
];

pub const BRONZE_THRESHOLD: i64 = 30;
pub const SILVER_THRESHOLD: i64 = 30;
pub const GOLD_THRESHOLD: i64 = 60;

/// Minimum active share of enrolled users before a course is scored.
pub const MIN_ACTIVE_PERCENT: i64 = 50;

const BRONZE_DIGIT: u16 = 1;
const SILVER_DIGIT: u16 = 10;
const GOLD_DIGIT: u16 = 100;

impl BronzeCounts {
    pub fn values(&self) -> [i64; 13] {
        [
            self.chapters,
            self.contents_blocks,
            self.files,
            self.folders,
            self.galleries,
            self.headings,
            self.html_blocks,
            self.labels,
            self.links,
            self.rich_media,
            self.news,
            self.pages,
            self.feeds,
        ]
    }

    pub fn score(&self) -> i64 {
        weighted_sum(&BRONZE_WEIGHTS, self.values())
    }
}

impl SilverCounts {
    pub fn values(&self) -> [i64; 8] {
        [
            self.assignments,
            self.polls,
            self.self_paced_packages,
            self.sco_packages,
            self.nln_materials,
            self.survey_questions,
            self.quiz_questions,
            self.scorm_objects,
        ]
    }

    pub fn score(&self) -> i64 {
        weighted_sum(&SILVER_WEIGHTS, self.values())
    }
}

impl GoldCounts {
    pub fn values(&self) -> [i64; 5] {
        [
            self.chats,
            self.database_entries,
            self.discussions,
            self.glossary_entries,
            self.wiki_pages,
        ]
    }

    pub fn score(&self) -> i64 {
        weighted_sum(&GOLD_WEIGHTS, self.values())
    }
}

fn weighted_sum<const N: usize>(weights: &[(&str, i64); N], values: [i64; N]) -> i64 {
    weights
        .iter()
        .zip(values)
        .map(|((_, weight), value)| weight * value)
        .sum()
}

/// Result of rating one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingOutcome {
    /// `None` when the course was not eligible for scoring.
    pub scores: Option<TierScores>,
    pub auto_rating: Rating,
}

/// Whether a course has enough active enrolments to be scored at all.
pub fn is_eligible(metrics: &CourseMetrics) -> bool {
    metrics.enrolled_count > 0 && metrics.active_percent() >= MIN_ACTIVE_PERCENT
}

pub fn score_tiers(metrics: &CourseMetrics) -> TierScores {
    TierScores {
        bronze: metrics.bronze.score(),
        silver: metrics.silver.score(),
        gold: metrics.gold.score(),
    }
}

/// Place-value sum of attained tiers: bronze 1, silver 10, gold 100.
pub fn attainment(scores: &TierScores) -> u16 {
    let mut aggregate = 0;
    if scores.bronze >= BRONZE_THRESHOLD {
        aggregate += BRONZE_DIGIT;
    }
    if scores.silver >= SILVER_THRESHOLD {
        aggregate += SILVER_DIGIT;
    }
    if scores.gold >= GOLD_THRESHOLD {
        aggregate += GOLD_DIGIT;
    }
    aggregate
}

/// Maps a tier aggregate to a rating.
///
/// Any single tier earns Bronze, so a course meeting only the gold criteria
/// still gets a consolation Bronze. Two tiers earn Silver, all three Gold.
pub fn rating_for_aggregate(aggregate: u16) -> Rating {
    match aggregate {
        1 | 10 | 100 => Rating::Bronze,
        11 | 101 | 110 => Rating::Silver,
        111 => Rating::Gold,
        _ => Rating::InDevelopment,
    }
}

/// Scores a course and derives its automatic rating.
pub fn compute_rating(metrics: &CourseMetrics) -> RatingOutcome {
    if !is_eligible(metrics) {
        return RatingOutcome {
            scores: None,
            auto_rating: Rating::InDevelopment,
        };
    }

    let scores = score_tiers(metrics);
    RatingOutcome {
        scores: Some(scores),
        auto_rating: rating_for_aggregate(attainment(&scores)),
    }
}
