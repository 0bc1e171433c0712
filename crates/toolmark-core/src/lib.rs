//! Core catalog model, provenance and sync result types for Toolmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const CRATE_NAME: &str = "toolmark-core";

/// A listing pulled from the external catalog. Lives for one sync call only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProduct {
    pub id: String,
    pub name: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub thumbnail_url: Option<String>,
    pub votes_count: i64,
    pub comments_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub makers: Vec<String>,
    pub topics: Vec<String>,
}

impl ExternalProduct {
    /// Website with empty strings treated as absent.
    pub fn website(&self) -> Option<&str> {
        self.website.as_deref().filter(|w| !w.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Tool,
    Submission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A published tool or a pending submission. Both tables share this shape;
/// `status` is only set for submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub name: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub submitted_by: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub name: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub submitted_by: String,
    pub metadata: JsonValue,
}

/// Fields overwritten on an existing tool during update-existing sync.
/// A `None` category keeps whatever the tool already has.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUpdate {
    pub name: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub category_id: Option<Uuid>,
}

impl ToolUpdate {
    pub fn from_product(product: &ExternalProduct, category_id: Option<Uuid>) -> Self {
        Self {
            name: product.name.clone(),
            description: product.tagline.clone(),
            long_description: product.description.clone(),
            website: product.website.clone(),
            logo_url: product.thumbnail_url.clone(),
            category_id,
        }
    }
}

/// Provenance blob stored in the `metadata` column of synced entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProvenance {
    pub product_hunt_id: String,
    pub votes_count: i64,
    pub comments_count: i64,
    pub makers: Vec<String>,
    pub topics: Vec<String>,
    pub synced_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_sync: Option<bool>,
}

impl SyncProvenance {
    pub fn for_product(product: &ExternalProduct, synced_at: DateTime<Utc>) -> Self {
        Self {
            product_hunt_id: product.id.clone(),
            votes_count: product.votes_count,
            comments_count: product.comments_count,
            makers: product.makers.clone(),
            topics: product.topics.clone(),
            synced_at,
            force_sync: None,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_sync = Some(true);
        self
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    #[default]
    SkipExisting,
    ForceCreate,
    UpdateExisting,
}

impl SyncPolicy {
    /// `force` wins over `update` when both flags are set.
    pub fn from_flags(force: bool, update: bool) -> Self {
        if force {
            Self::ForceCreate
        } else if update {
            Self::UpdateExisting
        } else {
            Self::SkipExisting
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDetails {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

/// Outcome summary of one sync batch. Returned to the caller, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: SyncDetails,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self, label: impl Into<String>) {
        self.created += 1;
        self.details.created.push(label.into());
    }

    pub fn record_skipped(&mut self, label: impl Into<String>) {
        self.skipped += 1;
        self.details.skipped.push(label.into());
    }

    pub fn record_error(&mut self, label: impl Into<String>) {
        self.errors += 1;
        self.details.errors.push(label.into());
    }

    pub fn total(&self) -> usize {
        self.created + self.skipped + self.errors
    }
}
