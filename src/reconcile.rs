//! Reconciliation of automatic ratings with administrator overrides.

use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::AuditError;
use crate::models::{CategoryId, CourseId, Rating};

/// Override option chosen on the review sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideChoice {
    /// Blank option: drop any override and use the automatic rating.
    Clear,
    InDevelopment,
    Bronze,
    Silver,
    Gold,
    Exclude,
}

impl OverrideChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideChoice::Clear => "",
            OverrideChoice::InDevelopment => "In Dev",
            OverrideChoice::Bronze => "Bronze",
            OverrideChoice::Silver => "Silver",
            OverrideChoice::Gold => "Gold",
            OverrideChoice::Exclude => "Exclude",
        }
    }

    /// Parses a form token, treating anything unrecognised as [`OverrideChoice::Clear`].
    pub fn parse_lenient(token: &str) -> OverrideChoice {
        token.parse().unwrap_or_else(|err: AuditError| {
            warn!(error = %err, "ignoring override input");
            OverrideChoice::Clear
        })
    }
}

impl FromStr for OverrideChoice {
    type Err = AuditError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "" => Ok(OverrideChoice::Clear),
            "in dev" | "in development" => Ok(OverrideChoice::InDevelopment),
            "bronze" => Ok(OverrideChoice::Bronze),
            "silver" => Ok(OverrideChoice::Silver),
            "gold" => Ok(OverrideChoice::Gold),
            "exclude" => Ok(OverrideChoice::Exclude),
            _ => Err(AuditError::MalformedOverrideInput(token.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub rating: Rating,
    pub override_flag: bool,
}

/// Settles the rating in effect for a course.
pub fn reconcile(auto_rating: Rating, choice: OverrideChoice) -> Reconciled {
    let rating = match choice {
        OverrideChoice::Clear => {
            return Reconciled {
                rating: auto_rating,
                override_flag: false,
            }
        }
        OverrideChoice::InDevelopment => Rating::InDevelopment,
        OverrideChoice::Bronze => Rating::Bronze,
        OverrideChoice::Silver => Rating::Silver,
        OverrideChoice::Gold => Rating::Gold,
        OverrideChoice::Exclude => Rating::Excluded,
    };
    Reconciled {
        rating,
        override_flag: true,
    }
}

/// Override option to preselect when a course is shown for review.
///
/// A standing override is only carried forward when it still disagrees with
/// the fresh automatic rating. Exclusions always carry forward.
pub fn suggested_override(previous: Rating, auto_rating: Rating, override_flag: bool) -> OverrideChoice {
    if !override_flag {
        return OverrideChoice::Clear;
    }
    match previous {
        Rating::Excluded => OverrideChoice::Exclude,
        _ if previous == auto_rating => OverrideChoice::Clear,
        Rating::Gold => OverrideChoice::Gold,
        Rating::Silver => OverrideChoice::Silver,
        Rating::Bronze => OverrideChoice::Bronze,
        Rating::InDevelopment => OverrideChoice::InDevelopment,
    }
}

/// Row of a returned review sheet, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRow {
    pub course_id: CourseId,
    pub category_id: CategoryId,
    pub auto_rating: String,
    #[serde(rename = "override", default)]
    pub override_choice: String,
}

/// Validated override submission for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideSubmission {
    pub course_id: CourseId,
    pub category_id: CategoryId,
    /// Automatic rating as displayed when the sheet was produced.
    pub auto_rating: Rating,
    pub choice: OverrideChoice,
}

impl From<ReviewRow> for OverrideSubmission {
    fn from(row: ReviewRow) -> Self {
        Self {
            course_id: row.course_id,
            category_id: row.category_id,
            auto_rating: parse_auto_rating(row.course_id, &row.auto_rating),
            choice: OverrideChoice::parse_lenient(&row.override_choice),
        }
    }
}

/// Reads the automatic rating echoed on a review sheet. Unknown values are
/// logged and read as in development.
fn parse_auto_rating(course_id: CourseId, value: &str) -> Rating {
    let rating = Rating::from_stored(value);
    if rating == Rating::InDevelopment && !value.trim().is_empty() {
        warn!(course_id, auto_rating = value, "unrecognised automatic rating on review sheet");
    }
    rating
}
