//! Task entity: the core unit owned by the Task API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

pub const TITLE_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 2000;

/// Priority rank, highest first: critical > high > medium > low > none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Lower rank sorts first; `None` priority ranks last of all.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn from_str_opt(s: &str) -> DomainResult<Self> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(DomainError::ValidationFailed(format!(
                "invalid priority: {other}"
            ))),
        }
    }
}

/// Fixed increment rules for recurring tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn from_str_opt(s: &str) -> DomainResult<Self> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(DomainError::ValidationFailed(format!(
                "invalid recurrence_rule: {other}"
            ))),
        }
    }
}

/// A single to-do item, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Option<Priority>,
    pub tags: BTreeSet<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub recurrence_rule: Option<RecurrenceRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted on creation; validated before a `Task` is built.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTaskFields {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
}

/// Partial update; only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub priority: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub is_recurring: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub recurrence_rule: Option<Option<String>>,
}

/// Distinguishes "field omitted" from "field explicitly set to null" for PUT patches.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

fn validate_title(title: &str) -> DomainResult<()> {
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(DomainError::ValidationFailed(format!(
            "title must be 1..={TITLE_MAX_LEN} chars"
        )));
    }
    Ok(())
}

fn validate_description(description: &Option<String>) -> DomainResult<()> {
    if let Some(d) = description {
        if d.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "description must be <= {DESCRIPTION_MAX_LEN} chars"
            )));
        }
    }
    Ok(())
}

fn validate_recurrence(
    is_recurring: bool,
    recurrence_rule: &Option<RecurrenceRule>,
) -> DomainResult<()> {
    if is_recurring != recurrence_rule.is_some() {
        return Err(DomainError::ValidationFailed(
            "is_recurring must agree with recurrence_rule presence".to_string(),
        ));
    }
    Ok(())
}

impl Task {
    /// Build a new task from validated fields, stamping id and timestamps.
    pub fn new(user_id: String, fields: NewTaskFields) -> DomainResult<Self> {
        validate_title(&fields.title)?;
        validate_description(&fields.description)?;

        let priority = fields.priority.as_deref().map(Priority::from_str_opt).transpose()?;
        let recurrence_rule = fields
            .recurrence_rule
            .as_deref()
            .map(RecurrenceRule::from_str_opt)
            .transpose()?;
        validate_recurrence(fields.is_recurring, &recurrence_rule)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            title: fields.title,
            description: fields.description,
            completed: false,
            priority,
            tags: fields.tags,
            due_at: fields.due_at,
            is_recurring: fields.is_recurring,
            recurrence_rule,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update, re-checking invariants on the merged result.
    pub fn apply_patch(&mut self, patch: TaskPatch) -> DomainResult<()> {
        let mut title = self.title.clone();
        let mut description = self.description.clone();
        let mut priority = self.priority;
        let mut is_recurring = self.is_recurring;
        let mut recurrence_rule = self.recurrence_rule;
        let mut due_at = self.due_at;
        let mut tags = self.tags.clone();

        if let Some(t) = patch.title {
            title = t;
        }
        if let Some(d) = patch.description {
            description = d;
        }
        if let Some(p) = patch.priority {
            priority = p.as_deref().map(Priority::from_str_opt).transpose()?;
        }
        if let Some(t) = patch.tags {
            tags = t;
        }
        if let Some(d) = patch.due_at {
            due_at = d;
        }
        if let Some(r) = patch.is_recurring {
            is_recurring = r;
        }
        if let Some(r) = patch.recurrence_rule {
            recurrence_rule = r.as_deref().map(RecurrenceRule::from_str_opt).transpose()?;
        }

        validate_title(&title)?;
        validate_description(&description)?;
        validate_recurrence(is_recurring, &recurrence_rule)?;

        self.title = title;
        self.description = description;
        self.priority = priority;
        self.tags = tags;
        self.due_at = due_at;
        self.is_recurring = is_recurring;
        self.recurrence_rule = recurrence_rule;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Flip `completed`, bumping `updated_at`. Returns the new value.
    pub fn toggle_complete(&mut self) -> bool {
        self.completed = !self.completed;
        self.updated_at = Utc::now();
        self.completed
    }

    /// Case-insensitive substring match over title, description, and tags.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if self.title.to_lowercase().contains(&needle) {
            return true;
        }
        if let Some(d) = &self.description {
            if d.to_lowercase().contains(&needle) {
                return true;
            }
        }
        self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}
