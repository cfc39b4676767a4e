//! Flat spreadsheet export of the persisted ratings.

use std::io;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::ExportRow;

type Extractor = fn(&ExportRow) -> String;

/// Export columns in output order.
pub static COLUMNS: &[(&str, Extractor)] = &[
    ("category", |row: &ExportRow| row.category.clone()),
    ("course", |row: &ExportRow| row.course.clone()),
    ("start date", |row: &ExportRow| format_date(row.start_date)),
    ("students", |row: &ExportRow| row.rating.enrolled_count.to_string()),
    ("active", |row: &ExportRow| row.rating.active_count.to_string()),
    ("active %", |row: &ExportRow| row.rating.active_percent.to_string()),
    ("last updated", |row: &ExportRow| {
        row.rating
            .last_content_update
            .map(format_date)
            .unwrap_or_else(|| "Never".to_string())
    }),
    ("links", |row: &ExportRow| row.rating.bronze.links.to_string()),
    ("files", |row: &ExportRow| row.rating.bronze.files.to_string()),
    ("folders", |row: &ExportRow| row.rating.bronze.folders.to_string()),
    ("headings", |row: &ExportRow| row.rating.bronze.headings.to_string()),
    ("labels", |row: &ExportRow| row.rating.bronze.labels.to_string()),
    ("web pages", |row: &ExportRow| row.rating.bronze.pages.to_string()),
    ("contents block", |row: &ExportRow| row.rating.bronze.contents_blocks.to_string()),
    ("html blocks", |row: &ExportRow| row.rating.bronze.html_blocks.to_string()),
    ("rss feeds", |row: &ExportRow| row.rating.bronze.feeds.to_string()),
    ("news threads", |row: &ExportRow| row.rating.bronze.news.to_string()),
    ("book chapters", |row: &ExportRow| row.rating.bronze.chapters.to_string()),
    ("galleries", |row: &ExportRow| row.rating.bronze.galleries.to_string()),
    ("media resources", |row: &ExportRow| row.rating.bronze.rich_media.to_string()),
    ("nln materials", |row: &ExportRow| row.rating.silver.nln_materials.to_string()),
    ("ims packages", |row: &ExportRow| row.rating.silver.sco_packages.to_string()),
    ("scorm objects", |row: &ExportRow| row.rating.silver.scorm_objects.to_string()),
    ("hotpots", |row: &ExportRow| row.rating.silver.self_paced_packages.to_string()),
    ("polls", |row: &ExportRow| row.rating.silver.polls.to_string()),
    ("survey questions", |row: &ExportRow| row.rating.silver.survey_questions.to_string()),
    ("assignments", |row: &ExportRow| row.rating.silver.assignments.to_string()),
    ("quiz questions", |row: &ExportRow| row.rating.silver.quiz_questions.to_string()),
    ("discussions", |row: &ExportRow| row.rating.gold.discussions.to_string()),
    ("chat rooms", |row: &ExportRow| row.rating.gold.chats.to_string()),
    ("glossary entries", |row: &ExportRow| row.rating.gold.glossary_entries.to_string()),
    ("database entries", |row: &ExportRow| row.rating.gold.database_entries.to_string()),
    ("wiki pages", |row: &ExportRow| row.rating.gold.wiki_pages.to_string()),
    ("bronze score", |row: &ExportRow| row.rating.scores.bronze.to_string()),
    ("silver score", |row: &ExportRow| row.rating.scores.silver.to_string()),
    ("gold score", |row: &ExportRow| row.rating.scores.gold.to_string()),
    ("auto rating", |row: &ExportRow| row.rating.auto_rating.as_str().to_string()),
    ("rating", |row: &ExportRow| row.rating.rating.as_str().to_string()),
    ("override", |row: &ExportRow| u8::from(row.rating.override_flag).to_string()),
];

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

/// Default export file name for a given day.
pub fn default_file_name(day: NaiveDate) -> String {
    format!("course_audit_{}.tsv", day.format("%Y%m%d"))
}

/// Writes rows as tab-separated values with a header line.
pub fn write_export<W: io::Write>(writer: W, rows: &[ExportRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(writer);

    writer.write_record(COLUMNS.iter().map(|(label, _)| *label))?;
    for row in rows {
        writer.write_record(COLUMNS.iter().map(|(_, extract)| extract(row)))?;
    }
    writer.flush()?;
    Ok(())
}
