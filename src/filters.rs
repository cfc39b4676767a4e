//! Row-level filters behind the content counters.
//!
//! A data source fetches candidate rows for a [`ContentTable`] and keeps the
//! ones a [`ContentFilter`] accepts. Text matching is case-insensitive.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Audio and video extensions treated as rich media.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "3gp", "aac", "aif", "asf", "avi", "flac", "flv", "m4a", "m4p", "m4v", "mid", "mkv", "mov",
    "mp3", "mp4", "mpe", "mpeg", "mpg", "mts", "ogg", "ogv", "ram", "rm", "swf", "wav", "wma",
    "wmv",
];

/// Serialised configs of HTML blocks that were added but never filled in.
pub const HTML_BLOCK_DEFAULTS: &[&str] = &[
    "Tzo4OiJzdGRDbGFzcyI6MTp7czo0OiJ0ZXh0IjtzOjA6IiI7fQ==",
    "Tzo2OiJvYmplY3QiOjI6e3M6NToidGl0bGUiO3M6MDoiIjtzOjQ6InRleHQiO3M6MDoiIjt9",
];

/// Serialised configs of RSS blocks that were added but never configured.
pub const RSS_BLOCK_DEFAULTS: &[&str] = &[
    "Tzo4OiJzdGRDbGFzcyI6NTp7czoxOToiZGlzcGxheV9kZXNjcmlwdGlvbiI7czoxOiIwIjtzOjE0OiJzaG93bnVtZW50cmllcyI7aTo1O3M6NToidGl0bGUiO3M6MDoiIjtzOjM0OiJibG9ja19yc3NfY2xpZW50X3Nob3dfY2hhbm5lbF9saW5rIjtzOjE6IjAiO3M6MzU6ImJsb2NrX3Jzc19jbGllbnRfc2hvd19jaGFubmVsX2ltYWdlIjtzOjE6IjAiO30=",
    "Tzo4OiJzdGRDbGFzcyI6NTp7czoxOToiZGlzcGxheV9kZXNjcmlwdGlvbiI7czoxOiIwIjtzOjE0OiJzaG93bnVtZW50cmllcyI7czoxOiI1IjtzOjU6InRpdGxlIjtzOjA6IiI7czozNDoiYmxvY2tfcnNzX2NsaWVudF9zaG93X2NoYW5uZWxfbGluayI7czoxOiIwIjtzOjM1OiJibG9ja19yc3NfY2xpZW50X3Nob3dfY2hhbm5lbF9pbWFnZSI7czoxOiIwIjt9",
    "Tzo2OiJvYmplY3QiOjU6e3M6MTk6ImRpc3BsYXlfZGVzY3JpcHRpb24iO3M6MToiMCI7czoxNDoic2hvd251bWVudHJpZXMiO3M6MToiNSI7czo1OiJ0aXRsZSI7czowOiIiO3M6MzQ6ImJsb2NrX3Jzc19jbGllbnRfc2hvd19jaGFubmVsX2xpbmsiO3M6MToiMCI7czozNToiYmxvY2tfcnNzX2NsaWVudF9zaG93X2NoYW5uZWxfaW1hZ2UiO3M6MToiMCI7fQ==",
];

const YOUTUBE_PREFIX: &str = "http://www.youtube.com/";
const WIKI_INTERNAL_PREFIX: &str = "internal://";
const VENDOR_ARTEFACT: &str = "mso";

static EMBEDDED_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)<object|<embed|\.({})""#,
        MEDIA_EXTENSIONS.join("|")
    ))
    .expect("embedded markup pattern is valid")
});

static MEDIA_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\.({})$", MEDIA_EXTENSIONS.join("|")))
        .expect("media file pattern is valid")
});

/// Sources of countable course content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTable {
    BookChapters,
    ContentsBlocks,
    ResourceFiles,
    Folders,
    Galleries,
    Sections,
    HtmlBlocks,
    Labels,
    Urls,
    Pages,
    NewsDiscussions,
    RssBlocks,
    Polls,
    HotPots,
    ImsPackages,
    NlnMaterials,
    SurveyQuestions,
    QuizQuestions,
    ScormPackages,
    Chats,
    DatabaseEntries,
    ForumDiscussions,
    GlossaryEntries,
    WikiPages,
}

/// Candidate row as fetched from a content table.
///
/// `name` carries titles and file names, `body` carries free text, URLs or
/// block configuration depending on the table.
#[derive(Debug, Clone, Default)]
pub struct ContentRow {
    pub name: Option<String>,
    pub body: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl ContentRow {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_body(body: &str) -> Self {
        Self {
            body: Some(body.to_string()),
            ..Self::default()
        }
    }

    pub fn modified(at: DateTime<Utc>) -> Self {
        Self {
            modified_at: Some(at),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentFilter {
    Any,
    PlainText,
    RichText,
    PlainChapter,
    RichChapter,
    PlainHeading,
    RichHeading,
    DocumentFile,
    MediaFile,
    PlainLink,
    ConfiguredBlock(&'static [&'static str]),
    ModifiedSince(DateTime<Utc>),
    WikiTitle,
}

impl ContentFilter {
    pub fn matches(&self, row: &ContentRow) -> bool {
        let body = row.body.as_deref();
        match self {
            ContentFilter::Any => true,
            ContentFilter::PlainText => {
                body.is_some_and(|text| !is_blank(text) && !has_embedded_markup(text) && !has_vendor_artefact(text))
            }
            ContentFilter::RichText => {
                body.is_some_and(|text| has_embedded_markup(text) && !has_vendor_artefact(text))
            }
            ContentFilter::PlainChapter => body.is_some_and(|text| {
                !is_blank(text) && !has_object_or_embed(text) && !has_vendor_artefact(text)
            }),
            ContentFilter::RichChapter => {
                body.is_some_and(|text| has_object_or_embed(text) && !has_vendor_artefact(text))
            }
            ContentFilter::PlainHeading => {
                has_name(row)
                    && body.is_some_and(|summary| {
                        !has_embedded_markup(summary) && !has_vendor_artefact(summary)
                    })
            }
            ContentFilter::RichHeading => {
                has_name(row)
                    && body.is_some_and(|summary| has_embedded_markup(summary) && !has_vendor_artefact(summary))
            }
            ContentFilter::DocumentFile => row
                .name
                .as_deref()
                .is_some_and(|name| name != "." && !MEDIA_FILE.is_match(name)),
            ContentFilter::MediaFile => row
                .name
                .as_deref()
                .is_some_and(|name| name != "." && MEDIA_FILE.is_match(name)),
            ContentFilter::PlainLink => body.is_some_and(|url| {
                !MEDIA_FILE.is_match(url) && !starts_with_ignore_case(url, YOUTUBE_PREFIX)
            }),
            ContentFilter::ConfiguredBlock(defaults) => {
                body.is_some_and(|config| !config.is_empty() && !defaults.contains(&config))
            }
            ContentFilter::ModifiedSince(since) => row.modified_at.is_some_and(|at| at >= *since),
            ContentFilter::WikiTitle => row
                .name
                .as_deref()
                .is_some_and(|title| !starts_with_ignore_case(title, WIKI_INTERNAL_PREFIX)),
        }
    }

    pub fn count(&self, rows: &[ContentRow]) -> i64 {
        rows.iter().filter(|row| self.matches(row)).count() as i64
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn has_name(row: &ContentRow) -> bool {
    row.name.as_deref().is_some_and(|name| !is_blank(name))
}

fn has_embedded_markup(text: &str) -> bool {
    EMBEDDED_MARKUP.is_match(text)
}

fn has_object_or_embed(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("<object") || lower.contains("<embed")
}

fn has_vendor_artefact(text: &str) -> bool {
    text.to_ascii_lowercase().contains(VENDOR_ARTEFACT)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
