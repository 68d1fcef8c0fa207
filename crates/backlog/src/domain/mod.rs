//! Domain types for the backlog tracker.
//!
//! Epics own stories; stories carry typed sub-records (tasks, acceptance
//! criteria, comments) and participate in the dependency graph.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for epic and story titles.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Maximum length for descriptions and comment bodies.
pub const MAX_BODY_LENGTH: usize = 20_000;

/// Unique identifier for a story
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoryId(pub String);

impl StoryId {
    /// Create a new story ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an epic
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpicId(pub String);

impl EpicId {
    /// Create a new epic ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EpicId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EpicId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a story.
///
/// `ToDo` is the initial state; `Done` is terminal as far as the scheduler is
/// concerned. Any status may be set to any other via an explicit update; only
/// the scheduler's claim performs the `ToDo -> InProgress` transition
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    /// Not started; the only state the scheduler claims from
    Todo,

    /// Currently being worked on
    InProgress,

    /// Work finished, awaiting review
    Review,

    /// Complete; satisfies dependents
    Done,
}

impl StoryStatus {
    /// Canonical string form, matching the serialized representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoryStatus::Todo => "todo",
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Review => "review",
            StoryStatus::Done => "done",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" | "to_do" | "to-do" => Ok(StoryStatus::Todo),
            "in_progress" | "in-progress" => Ok(StoryStatus::InProgress),
            "review" => Ok(StoryStatus::Review),
            "done" => Ok(StoryStatus::Done),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Status of an epic.
///
/// A separate enumeration from [`StoryStatus`]; epic status never gates story
/// readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    /// Being drafted, not ready for work
    Draft,

    /// Scoped and ready to start
    Ready,

    /// Stories are actively being worked
    InProgress,

    /// All work complete
    Done,

    /// Paused indefinitely
    OnHold,
}

impl EpicStatus {
    /// Canonical string form, matching the serialized representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EpicStatus::Draft => "draft",
            EpicStatus::Ready => "ready",
            EpicStatus::InProgress => "in_progress",
            EpicStatus::Done => "done",
            EpicStatus::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpicStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(EpicStatus::Draft),
            "ready" => Ok(EpicStatus::Ready),
            "in_progress" | "in-progress" => Ok(EpicStatus::InProgress),
            "done" => Ok(EpicStatus::Done),
            "on_hold" | "on-hold" => Ok(EpicStatus::OnHold),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// A checklist task owned by a story.
///
/// Tasks never affect scheduling; they exist for humans and agents to track
/// progress within a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Identifier unique within the owning story
    pub id: String,

    /// Dense 0-based position within the story's task list
    pub order: u32,

    /// What needs doing
    pub description: String,

    /// Whether the task has been completed
    pub done: bool,
}

/// A structured acceptance criterion owned by a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    /// Identifier unique within the owning story
    pub id: String,

    /// Dense 0-based position within the story's criteria list
    pub order: u32,

    /// The criterion text
    pub text: String,

    /// Whether the criterion has been verified
    pub met: bool,
}

/// A comment on a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Identifier unique within the owning story
    pub id: String,

    /// Who wrote the comment
    pub author: String,

    /// Comment body
    pub body: String,

    /// When the comment was added
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A story: the unit of schedulable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Unique identifier
    pub id: StoryId,

    /// The owning epic (required)
    pub epic_id: EpicId,

    /// Story title
    pub title: String,

    /// Story description
    pub description: String,

    /// Current status
    pub status: StoryStatus,

    /// Priority; higher is more urgent, no upper bound, default 0
    pub priority: i32,

    /// Checklist tasks
    #[serde(default)]
    pub tasks: Vec<TaskItem>,

    /// Structured acceptance criteria
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,

    /// Discussion comments
    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Stories this one depends on (mirrors the graph, for serialization)
    #[serde(default)]
    pub depends_on: Vec<StoryId>,

    /// Creation timestamp; set once, never mutated
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// An epic: a parent grouping of stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    /// Unique identifier
    pub id: EpicId,

    /// Epic title
    pub title: String,

    /// Epic description
    pub description: String,

    /// Current status
    pub status: EpicStatus,

    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Data for creating a new epic
#[derive(Debug, Clone)]
pub struct NewEpic {
    /// Epic title
    pub title: String,

    /// Epic description
    pub description: String,
}

impl NewEpic {
    /// Validate input constraints before the epic is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty or over-long title or an
    /// over-long description.
    pub fn validate(&self) -> Result<(), Error> {
        validate_title(&self.title)?;
        validate_body("description", &self.description)
    }
}

/// Data for creating a new story
#[derive(Debug, Clone)]
pub struct NewStory {
    /// The owning epic
    pub epic_id: EpicId,

    /// Story title
    pub title: String,

    /// Story description
    pub description: String,

    /// Priority; higher is more urgent
    pub priority: i32,
}

impl NewStory {
    /// Validate input constraints before the story is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty epic id, an empty or
    /// over-long title, or an over-long description.
    pub fn validate(&self) -> Result<(), Error> {
        if self.epic_id.as_str().is_empty() {
            return Err(Error::Validation("epic_id must not be empty".to_string()));
        }
        validate_title(&self.title)?;
        validate_body("description", &self.description)
    }
}

/// Data for updating an existing story.
///
/// Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default)]
pub struct StoryUpdate {
    /// New title (if updating)
    pub title: Option<String>,

    /// New description (if updating)
    pub description: Option<String>,

    /// New status (if updating)
    pub status: Option<StoryStatus>,

    /// New priority (if updating)
    pub priority: Option<i32>,
}

/// Filter for querying stories
#[derive(Debug, Clone, Default)]
pub struct StoryFilter {
    /// Filter by status
    pub status: Option<StoryStatus>,

    /// Filter by owning epic
    pub epic_id: Option<EpicId>,

    /// Filter by exact priority
    pub priority: Option<i32>,

    /// Limit number of results
    pub limit: Option<usize>,
}

pub(crate) fn validate_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(Error::Validation(format!(
            "title exceeds {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_body(field: &str, body: &str) -> Result<(), Error> {
    if body.len() > MAX_BODY_LENGTH {
        return Err(Error::Validation(format!(
            "{field} exceeds {MAX_BODY_LENGTH} characters"
        )));
    }
    Ok(())
}
