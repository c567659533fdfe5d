//! Response types for the Meshy task API
//!
//! These mirror the JSON the server returns for a task. Unknown fields are
//! ignored on decode so that server-side additions do not break the client.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque, server-assigned task identifier
///
/// The server happens to use k-sortable UUIDs, but callers must not rely on
/// any particular format. It is only ever used as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-side status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Expired,
}

impl Status {
    /// Succeeded, Failed and Expired end the task's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed | Status::Expired)
    }

    /// Ordering used to detect server-reported regressions
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Status::Pending => 0,
            Status::InProgress => 1,
            Status::Succeeded | Status::Failed | Status::Expired => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "PENDING",
            Status::InProgress => "IN_PROGRESS",
            Status::Succeeded => "SUCCEEDED",
            Status::Failed => "FAILED",
            Status::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Downloadable model files produced by a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtl: Option<String>,
}

impl ModelUrls {
    /// True if no format has a non-blank URL
    pub fn is_empty(&self) -> bool {
        [&self.glb, &self.fbx, &self.usdz, &self.obj, &self.mtl]
            .iter()
            .all(|url| url.as_deref().is_none_or(|u| u.trim().is_empty()))
    }
}

/// One set of PBR texture maps produced by a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness: Option<String>,
}

/// Error payload attached to a failed task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    #[serde(default)]
    pub message: String,
}

/// Snapshot of a task as last reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: TaskId,

    pub status: Status,

    /// 0-100; meaningless while `preceding_tasks` is set
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,

    /// Number of tasks queued ahead of this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preceding_tasks: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `preview` or `refine` for v2 text-to-3D tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_urls: Option<ModelUrls>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texture_urls: Vec<TextureUrls>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_error: Option<TaskError>,

    // Echoed request fields, display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_richness: Option<String>,

    /// Unix milliseconds; 0 means "not yet"
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub started_at: i64,
    #[serde(default)]
    pub finished_at: i64,
    #[serde(default)]
    pub expires_at: i64,
}

fn deserialize_progress<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?.unwrap_or(0);
    Ok(value.clamp(0, 100) as u8)
}

/// Unix milliseconds to a timestamp; zero or negative means unset
pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

impl TaskResult {
    /// Prompt to show for this task: `prompt`, or `object_prompt` for
    /// texture and legacy text-to-3D tasks
    pub fn display_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(self.object_prompt.as_deref())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error message of a failed task
    pub fn error_message(&self) -> Option<&str> {
        self.task_error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        from_millis(self.created_at)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        from_millis(self.started_at)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        from_millis(self.finished_at)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        from_millis(self.expires_at)
    }

    /// Lightweight progress view of this snapshot
    pub fn progress_report(&self) -> TaskProgress {
        TaskProgress {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            preceding_tasks: self.preceding_tasks,
        }
    }
}

/// Progress fields of a snapshot, as handed to progress displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub id: TaskId,
    pub status: Status,
    pub progress: u8,
    pub preceding_tasks: Option<u32>,
}

/// How a progress display should present a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressView {
    /// Waiting behind this many other tasks
    Queued(u32),
    /// Running (or finished) at this percentage
    Percent(u8),
}

impl TaskProgress {
    pub fn view(&self) -> ProgressView {
        match self.preceding_tasks {
            Some(ahead) if !self.status.is_terminal() => ProgressView::Queued(ahead),
            _ => ProgressView::Percent(self.progress),
        }
    }
}

impl fmt::Display for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view() {
            ProgressView::Queued(ahead) => {
                write!(f, "[{}] {}: {} ahead in queue", self.id, self.status, ahead)
            }
            ProgressView::Percent(p) => write!(f, "[{}] {}: {}%", self.id, self.status, p),
        }
    }
}

/// Sort direction for task listings, by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Value of the `sortBy` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "+created_at",
            SortOrder::Descending => "-created_at",
        }
    }
}

/// Body of a successful create call
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskResponse {
    #[serde(default)]
    pub result: Option<String>,
}
