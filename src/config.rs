use anyhow::Context;
use chrono::Duration;

use crate::collector::{CollectorSettings, DEFAULT_ACTIVITY_WINDOW_DAYS, DEFAULT_ENROLLED_ROLES};

pub const DEFAULT_TABLE_PREFIX: &str = "mdl_";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_EXCLUDED_CATEGORIES: &[&str] = &["child courses", "staff only", "sandbox", "archive"];

/// Runtime settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub database_url: String,
    pub table_prefix: String,
    pub max_connections: u32,
    pub activity_window_days: i64,
    pub enrolled_roles: Vec<i64>,
    /// Category name fragments skipped during traversal, lowercase.
    pub excluded_categories: Vec<String>,
}

impl AuditConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to the learning platform's Postgres database")?;

        let table_prefix = lookup("AUDIT_TABLE_PREFIX").unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string());

        let max_connections = match lookup("AUDIT_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("AUDIT_MAX_CONNECTIONS is not a number: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let activity_window_days = match lookup("AUDIT_ACTIVITY_WINDOW_DAYS") {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("AUDIT_ACTIVITY_WINDOW_DAYS is not a number: {value}"))?,
            None => DEFAULT_ACTIVITY_WINDOW_DAYS,
        };

        let enrolled_roles = match lookup("AUDIT_ENROLLED_ROLES") {
            Some(value) => split_list(&value)
                .map(|role| {
                    role.parse::<i64>()
                        .with_context(|| format!("invalid role id in AUDIT_ENROLLED_ROLES: {role}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => DEFAULT_ENROLLED_ROLES.to_vec(),
        };

        let excluded_categories = match lookup("AUDIT_EXCLUDED_CATEGORIES") {
            Some(value) => split_list(&value).map(|name| name.to_lowercase()).collect(),
            None => DEFAULT_EXCLUDED_CATEGORIES.iter().map(|name| name.to_string()).collect(),
        };

        Ok(Self {
            database_url,
            table_prefix,
            max_connections,
            activity_window_days,
            enrolled_roles,
            excluded_categories,
        })
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            enrolled_roles: self.enrolled_roles.clone(),
            activity_window: Duration::days(self.activity_window_days.max(1)),
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}
