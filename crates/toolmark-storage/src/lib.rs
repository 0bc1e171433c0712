//! Catalog persistence seam for Toolmark: the repository trait plus
//! in-memory and Postgres implementations.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use toolmark_core::{
    CatalogEntry, Category, EntryKind, NewSubmission, SubmissionStatus, ToolUpdate,
};
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "toolmark-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind:?} {id} not found")]
    NotFound { kind: EntryKind, id: Uuid },
}

/// Narrow view of the catalog tables used by the sync engine.
///
/// Matching in `find_by_name_or_website` is exact and case-sensitive: an entry
/// matches when its name equals `name` OR its website equals `website`. A
/// `None` website only matches on name.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_by_name_or_website(
        &self,
        kind: EntryKind,
        name: &str,
        website: Option<&str>,
    ) -> anyhow::Result<Option<CatalogEntry>>;

    async fn create_submission(&self, submission: NewSubmission) -> anyhow::Result<CatalogEntry>;

    async fn update_tool(&self, id: Uuid, update: ToolUpdate) -> anyhow::Result<CatalogEntry>;

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>>;

    async fn list_tools_without_category(&self) -> anyhow::Result<Vec<CatalogEntry>>;

    async fn set_tool_category(&self, id: Uuid, category_id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: CatalogRepository + ?Sized> CatalogRepository for Arc<T> {
    async fn find_by_name_or_website(
        &self,
        kind: EntryKind,
        name: &str,
        website: Option<&str>,
    ) -> anyhow::Result<Option<CatalogEntry>> {
        (**self).find_by_name_or_website(kind, name, website).await
    }

    async fn create_submission(&self, submission: NewSubmission) -> anyhow::Result<CatalogEntry> {
        (**self).create_submission(submission).await
    }

    async fn update_tool(&self, id: Uuid, update: ToolUpdate) -> anyhow::Result<CatalogEntry> {
        (**self).update_tool(id, update).await
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        (**self).list_categories().await
    }

    async fn list_tools_without_category(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        (**self).list_tools_without_category().await
    }

    async fn set_tool_category(&self, id: Uuid, category_id: Uuid) -> anyhow::Result<()> {
        (**self).set_tool_category(id, category_id).await
    }
}

fn matches_name_or_website(entry: &CatalogEntry, name: &str, website: Option<&str>) -> bool {
    entry.name == name || (website.is_some() && entry.website.as_deref() == website)
}

#[derive(Debug, Default)]
struct InMemoryState {
    categories: Vec<Category>,
    tools: Vec<CatalogEntry>,
    submissions: Vec<CatalogEntry>,
}

/// Process-local catalog used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<InMemoryState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                categories,
                ..Default::default()
            }),
        }
    }

    /// Insert a published tool directly, bypassing the submission flow.
    pub async fn insert_tool(
        &self,
        name: &str,
        website: Option<&str>,
        category_id: Option<Uuid>,
    ) -> CatalogEntry {
        let now = Utc::now();
        let tool = CatalogEntry {
            id: Uuid::new_v4(),
            kind: EntryKind::Tool,
            name: name.to_string(),
            description: None,
            long_description: None,
            website: website.map(str::to_string),
            logo_url: None,
            category_id,
            submitted_by: None,
            status: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.tools.push(tool.clone());
        tool
    }

    pub async fn tools(&self) -> Vec<CatalogEntry> {
        self.state.lock().await.tools.clone()
    }

    pub async fn submissions(&self) -> Vec<CatalogEntry> {
        self.state.lock().await.submissions.clone()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_by_name_or_website(
        &self,
        kind: EntryKind,
        name: &str,
        website: Option<&str>,
    ) -> anyhow::Result<Option<CatalogEntry>> {
        let state = self.state.lock().await;
        let rows = match kind {
            EntryKind::Tool => &state.tools,
            EntryKind::Submission => &state.submissions,
        };
        Ok(rows
            .iter()
            .find(|entry| matches_name_or_website(entry, name, website))
            .cloned())
    }

    async fn create_submission(&self, submission: NewSubmission) -> anyhow::Result<CatalogEntry> {
        let now = Utc::now();
        let entry = CatalogEntry {
            id: Uuid::new_v4(),
            kind: EntryKind::Submission,
            name: submission.name,
            description: submission.description,
            long_description: submission.long_description,
            website: submission.website,
            logo_url: submission.logo_url,
            category_id: submission.category_id,
            submitted_by: Some(submission.submitted_by),
            status: Some(SubmissionStatus::Pending),
            metadata: submission.metadata,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.submissions.push(entry.clone());
        Ok(entry)
    }

    async fn update_tool(&self, id: Uuid, update: ToolUpdate) -> anyhow::Result<CatalogEntry> {
        let mut state = self.state.lock().await;
        let tool = state
            .tools
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StorageError::NotFound {
                kind: EntryKind::Tool,
                id,
            })?;
        tool.name = update.name;
        tool.description = update.description;
        tool.long_description = update.long_description;
        tool.website = update.website;
        tool.logo_url = update.logo_url;
        if let Some(category_id) = update.category_id {
            tool.category_id = Some(category_id);
        }
        tool.updated_at = Utc::now();
        Ok(tool.clone())
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        Ok(self.state.lock().await.categories.clone())
    }

    async fn list_tools_without_category(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .tools
            .iter()
            .filter(|t| t.category_id.is_none())
            .cloned()
            .collect())
    }

    async fn set_tool_category(&self, id: Uuid, category_id: Uuid) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let tool = state
            .tools
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StorageError::NotFound {
                kind: EntryKind::Tool,
                id,
            })?;
        tool.category_id = Some(category_id);
        tool.updated_at = Utc::now();
        Ok(())
    }
}

/// Postgres-backed catalog over the `tools`, `tool_submissions` and
/// `categories` tables created by `migrations/`.
#[derive(Debug, Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

const TOOL_COLUMNS: &str = "id, name, description, long_description, website, logo_url, \
     category_id, submitted_by, NULL::text AS status, metadata, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "id, name, description, long_description, website, logo_url, \
     category_id, submitted_by, status, metadata, created_at, updated_at";

fn table_and_columns(kind: EntryKind) -> (&'static str, &'static str) {
    match kind {
        EntryKind::Tool => ("tools", TOOL_COLUMNS),
        EntryKind::Submission => ("tool_submissions", SUBMISSION_COLUMNS),
    }
}

fn entry_from_row(kind: EntryKind, row: &PgRow) -> anyhow::Result<CatalogEntry> {
    let status: Option<String> = row.try_get("status")?;
    Ok(CatalogEntry {
        id: row.try_get("id")?,
        kind,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        long_description: row.try_get("long_description")?,
        website: row.try_get("website")?,
        logo_url: row.try_get("logo_url")?,
        category_id: row.try_get("category_id")?,
        submitted_by: row.try_get("submitted_by")?,
        status: status.as_deref().and_then(SubmissionStatus::parse),
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("running catalog migrations")
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_by_name_or_website(
        &self,
        kind: EntryKind,
        name: &str,
        website: Option<&str>,
    ) -> anyhow::Result<Option<CatalogEntry>> {
        let (table, columns) = table_and_columns(kind);
        let sql = format!(
            "SELECT {columns} FROM {table} \
              WHERE name = $1 OR ($2::text IS NOT NULL AND website = $2) \
              ORDER BY created_at \
              LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(website)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("looking up {table} by name or website"))?;
        row.map(|r| entry_from_row(kind, &r)).transpose()
    }

    async fn create_submission(&self, submission: NewSubmission) -> anyhow::Result<CatalogEntry> {
        let sql = format!(
            "INSERT INTO tool_submissions \
                 (id, name, description, long_description, website, logo_url, \
                  category_id, submitted_by, status, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) \
             RETURNING {SUBMISSION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&submission.name)
            .bind(&submission.description)
            .bind(&submission.long_description)
            .bind(&submission.website)
            .bind(&submission.logo_url)
            .bind(submission.category_id)
            .bind(&submission.submitted_by)
            .bind(SubmissionStatus::Pending.as_str())
            .bind(&submission.metadata)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("inserting submission {}", submission.name))?;
        debug!(name = %submission.name, "submission inserted");
        entry_from_row(EntryKind::Submission, &row)
    }

    async fn update_tool(&self, id: Uuid, update: ToolUpdate) -> anyhow::Result<CatalogEntry> {
        let sql = format!(
            "UPDATE tools \
                SET name = $2, \
                    description = $3, \
                    long_description = $4, \
                    website = $5, \
                    logo_url = $6, \
                    category_id = COALESCE($7, category_id), \
                    updated_at = NOW() \
              WHERE id = $1 \
             RETURNING {TOOL_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.long_description)
            .bind(&update.website)
            .bind(&update.logo_url)
            .bind(update.category_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("updating tool {id}"))?;
        let row = row.ok_or(StorageError::NotFound {
            kind: EntryKind::Tool,
            id,
        })?;
        entry_from_row(EntryKind::Tool, &row)
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, slug FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("listing categories")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Category {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                slug: row.try_get("slug")?,
            });
        }
        Ok(out)
    }

    async fn list_tools_without_category(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        let sql = format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE category_id IS NULL ORDER BY created_at"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("listing uncategorized tools")?;
        rows.iter()
            .map(|row| entry_from_row(EntryKind::Tool, row))
            .collect()
    }

    async fn set_tool_category(&self, id: Uuid, category_id: Uuid) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tools
               SET category_id = $2,
                   updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(category_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("setting category on tool {id}"))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                kind: EntryKind::Tool,
                id,
            }
            .into());
        }
        Ok(())
    }
}
