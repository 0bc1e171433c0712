//! External catalog adapters: the `ProductSource` contract and the
//! Product Hunt GraphQL client.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use toolmark_core::ExternalProduct;
use tracing::{info, info_span, Instrument};

pub const CRATE_NAME: &str = "toolmark-adapters";

pub const DEFAULT_API_URL: &str = "https://api.producthunt.com/v2/api/graphql";
pub const DEFAULT_LIMIT: usize = 20;

const KNOWN_URL_PREFIXES: &[&str] = &[
    "https://www.producthunt.com/posts/",
    "http://www.producthunt.com/posts/",
    "https://producthunt.com/posts/",
    "http://producthunt.com/posts/",
    "www.producthunt.com/posts/",
    "producthunt.com/posts/",
    "https://www.producthunt.com/products/",
    "http://www.producthunt.com/products/",
    "https://producthunt.com/products/",
    "http://producthunt.com/products/",
    "www.producthunt.com/products/",
    "producthunt.com/products/",
];

const PRODUCT_FIELDS: &str = "id name tagline description website thumbnail { url } \
     votesCount commentsCount createdAt makers { name } topics { edges { node { name } } }";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Product Hunt access token is not configured (set PRODUCT_HUNT_TOKEN)")]
    Configuration,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("Product Hunt API returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Product Hunt GraphQL error (status {status}): {body}")]
    GraphQl { status: u16, body: String },
    #[error("Product Hunt request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected Product Hunt response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. } | Self::GraphQl { .. } | Self::Request(_) | Self::Decode(_)
        )
    }
}

/// Optional `postedAfter` / `postedBefore` bounds for the ranked list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub posted_after: Option<String>,
    pub posted_before: Option<String>,
}

impl DateWindow {
    /// Accepts `YYYY-MM-DD` or RFC 3339 timestamps; blank bounds are ignored.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, FetchError> {
        Ok(Self {
            posted_after: validate_date_bound("startDate", start)?,
            posted_before: validate_date_bound("endDate", end)?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.posted_after.is_none() && self.posted_before.is_none()
    }
}

fn validate_date_bound(label: &str, value: Option<&str>) -> Result<Option<String>, FetchError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let valid = NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(raw).is_ok();
    if !valid {
        return Err(FetchError::InvalidInput(format!(
            "{label} must be an ISO-8601 date, got {raw:?}"
        )));
    }
    Ok(Some(raw.to_string()))
}

/// Derive a Product Hunt slug from a full post URL or a bare slug.
pub fn derive_slug(input: &str) -> Result<String, FetchError> {
    let trimmed = input.trim();
    let stripped = KNOWN_URL_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    if stripped.contains("://") {
        return Err(FetchError::InvalidInput(format!(
            "{input:?} is not a Product Hunt post or product URL"
        )));
    }
    let slug = stripped
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();
    if slug.is_empty() {
        return Err(FetchError::InvalidInput(format!(
            "could not derive a Product Hunt slug from {input:?}"
        )));
    }
    Ok(slug.to_string())
}

pub fn product_by_slug_query() -> String {
    format!("query GetProductBySlug($slug: String!) {{ post(slug: $slug) {{ {PRODUCT_FIELDS} }} }}")
}

/// Ranked posts query. Date bounds are interpolated into the query text.
pub fn ranked_posts_query(window: &DateWindow) -> String {
    let mut args = String::from("first: $first, order: VOTES");
    if let Some(after) = &window.posted_after {
        args.push_str(&format!(", postedAfter: \"{after}\""));
    }
    if let Some(before) = &window.posted_before {
        args.push_str(&format!(", postedBefore: \"{before}\""));
    }
    format!(
        "query GetTopProducts($first: Int!) {{ posts({args}) {{ edges {{ node {{ {PRODUCT_FIELDS} }} }} }} }}"
    )
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    post: Option<WirePost>,
}

#[derive(Debug, Deserialize)]
struct PostsData {
    posts: Connection<WirePost>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePost {
    id: String,
    name: String,
    tagline: Option<String>,
    description: Option<String>,
    website: Option<String>,
    thumbnail: Option<Thumbnail>,
    #[serde(default)]
    votes_count: Option<i64>,
    #[serde(default)]
    comments_count: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    makers: Option<Vec<Named>>,
    #[serde(default)]
    topics: Option<Connection<Named>>,
}

impl From<WirePost> for ExternalProduct {
    fn from(post: WirePost) -> Self {
        Self {
            id: post.id,
            name: post.name,
            tagline: post.tagline,
            description: post.description,
            website: post.website,
            thumbnail_url: post.thumbnail.and_then(|t| t.url),
            votes_count: post.votes_count.unwrap_or(0),
            comments_count: post.comments_count.unwrap_or(0),
            created_at: post.created_at,
            makers: post
                .makers
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.name)
                .collect(),
            topics: post
                .topics
                .map(|c| c.edges.into_iter().map(|e| e.node.name).collect())
                .unwrap_or_default(),
        }
    }
}

/// Read side of an external catalog.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// `Ok(None)` when the slug resolves to no post.
    async fn get_product_by_url(&self, url: &str) -> Result<Option<ExternalProduct>, FetchError>;

    async fn get_top_products(&self, limit: usize) -> Result<Vec<ExternalProduct>, FetchError>;

    async fn get_products_by_date(
        &self,
        limit: usize,
        window: &DateWindow,
    ) -> Result<Vec<ExternalProduct>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ProductHuntConfig {
    pub api_url: String,
    pub token: Option<String>,
    /// Client-level request timeout. `None` keeps reqwest's default (no timeout).
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for ProductHuntConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: None,
            user_agent: None,
        }
    }
}

#[derive(Clone)]
pub struct ProductHuntClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl fmt::Debug for ProductHuntClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductHuntClient")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProductHuntClient {
    pub fn new(config: ProductHuntConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let http = builder.build().context("building reqwest client")?;
        Ok(Self {
            http,
            api_url: config.api_url,
            token: config.token,
        })
    }

    fn token(&self) -> Result<&str, FetchError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(FetchError::Configuration)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: String,
        variables: JsonValue,
    ) -> Result<T, FetchError> {
        let token = self.token()?;
        let span = info_span!("product_hunt_graphql", operation, url = %self.api_url);

        async move {
            let resp = self
                .http
                .post(&self.api_url)
                .bearer_auth(token)
                .json(&json!({ "query": query, "variables": variables }))
                .send()
                .await?;

            let status = resp.status();
            let body = resp.text().await?;
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: GraphQlResponse<T> = serde_json::from_str(&body)
                .map_err(|e| FetchError::Decode(format!("{e}: {body}")))?;
            if !parsed.errors.is_empty() {
                return Err(FetchError::GraphQl {
                    status: status.as_u16(),
                    body,
                });
            }
            let data = parsed
                .data
                .ok_or_else(|| FetchError::Decode(format!("response has no data: {body}")))?;
            info!(status = status.as_u16(), "graphql call ok");
            Ok(data)
        }
        .instrument(span)
        .await
    }

    async fn ranked(&self, limit: usize, window: &DateWindow) -> Result<Vec<ExternalProduct>, FetchError> {
        let data: PostsData = self
            .execute(
                "GetTopProducts",
                ranked_posts_query(window),
                json!({ "first": limit }),
            )
            .await?;
        Ok(data
            .posts
            .edges
            .into_iter()
            .map(|e| ExternalProduct::from(e.node))
            .collect())
    }
}

#[async_trait]
impl ProductSource for ProductHuntClient {
    async fn get_product_by_url(&self, url: &str) -> Result<Option<ExternalProduct>, FetchError> {
        self.token()?;
        let slug = derive_slug(url)?;
        let data: PostData = self
            .execute("GetProductBySlug", product_by_slug_query(), json!({ "slug": slug }))
            .await?;
        Ok(data.post.map(ExternalProduct::from))
    }

    async fn get_top_products(&self, limit: usize) -> Result<Vec<ExternalProduct>, FetchError> {
        self.ranked(limit, &DateWindow::default()).await
    }

    async fn get_products_by_date(
        &self,
        limit: usize,
        window: &DateWindow,
    ) -> Result<Vec<ExternalProduct>, FetchError> {
        if window.is_unbounded() {
            return self.get_top_products(limit).await;
        }
        self.ranked(limit, window).await
    }
}
