use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::RepoError;
use crate::model::{Comment, NewComment, Page, Post};

/// microCMS caps `limit` at 100; enough for one post's comment thread.
const COMMENT_LIMIT: usize = 100;

/// One fetched batch handed to the feed loader.
#[derive(Debug, Clone)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

/// Paginated read access, the seam the feed loader is built against.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<FeedPage<Self::Item>, RepoError>;
}

/// Comment read/write access, the seam behind the comment synchronizer.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Creates the comment and returns its new id.
    async fn create(&self, comment: NewComment) -> Result<String, RepoError>;

    /// All comments for one parent post, newest first (repository-ordered).
    async fn comments_for(&self, parent_id: &str) -> Result<Vec<Comment>, RepoError>;
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub offset: usize,
    pub limit: usize,
    pub filters: Option<String>,
    pub orders: Option<String>,
    pub fields: Option<String>,
}

impl ListQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(filters) = &self.filters {
            pairs.push(("filters", filters.clone()));
        }
        if let Some(orders) = &self.orders {
            pairs.push(("orders", orders.clone()));
        }
        if let Some(fields) = &self.fields {
            pairs.push(("fields", fields.clone()));
        }
        pairs
    }
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Thin client for one microCMS service, configured with a single API key.
/// Read-only and write-capable access are two separate instances.
#[derive(Debug, Clone)]
pub struct MicrocmsClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
}

impl MicrocmsClient {
    pub fn new(http: reqwest::Client, base: Url, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base,
            api_key: api_key.into(),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, RepoError> {
        self.base.join(endpoint).map_err(|e| RepoError::Rejected {
            status: 0,
            message: format!("invalid endpoint {}: {}", endpoint, e),
        })
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &ListQuery,
    ) -> Result<Page<T>, RepoError> {
        let response = self
            .http
            .get(self.endpoint_url(endpoint)?)
            .header("X-MICROCMS-API-KEY", &self.api_key)
            .query(&query.to_pairs())
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        id: &str,
    ) -> Result<T, RepoError> {
        let url = self.endpoint_url(&format!("{}/{}", endpoint, id))?;
        let response = self
            .http
            .get(url)
            .header("X-MICROCMS-API-KEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// POST to a write-capable endpoint. Returns the id the repository
    /// assigned to the new content.
    pub async fn create<B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, RepoError> {
        let response = self
            .http
            .post(self.endpoint_url(endpoint)?)
            .header("X-MICROCMS-API-KEY", &self.api_key)
            .json(body)
            .send()
            .await?;
        let created: Created = Self::decode(response).await?;
        Ok(created.id)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RepoError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoError::Rejected {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                RepoError::Decode(e)
            } else {
                RepoError::Network(e)
            }
        })
    }
}

/// microCMS error bodies are `{"message": "..."}`; fall back to the raw body.
fn extract_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => err.message,
        Err(_) => body.trim().to_string(),
    }
}

/// The `blog` collection as a pageable feed, optionally narrowed to one
/// category (the category page of the site).
pub struct BlogFeedSource {
    client: MicrocmsClient,
    category: Option<String>,
}

impl BlogFeedSource {
    pub fn new(client: MicrocmsClient, category: Option<String>) -> Self {
        Self { client, category }
    }
}

#[async_trait]
impl PageSource for BlogFeedSource {
    type Item = Post;

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<FeedPage<Post>, RepoError> {
        let query = ListQuery {
            offset,
            limit,
            filters: self
                .category
                .as_ref()
                .map(|id| format!("category[equals]{}", id)),
            orders: Some("-publishedAt".to_string()),
            fields: Some("id,title,publishedAt,category,eyecatch,excerpt".to_string()),
        };
        let page = self.client.list::<Post>("blog", &query).await?;
        Ok(FeedPage {
            items: page.contents,
            total_count: page.total_count,
        })
    }
}

/// The `comments` collection. Reads go through the read-only client,
/// creates through the write-capable one.
pub struct CmsCommentStore {
    read: MicrocmsClient,
    write: Option<MicrocmsClient>,
}

impl CmsCommentStore {
    pub fn new(read: MicrocmsClient, write: MicrocmsClient) -> Self {
        Self {
            read,
            write: Some(write),
        }
    }

    /// A store that can list comments but has no write credential.
    pub fn read_only(read: MicrocmsClient) -> Self {
        Self { read, write: None }
    }
}

#[async_trait]
impl CommentStore for CmsCommentStore {
    async fn create(&self, comment: NewComment) -> Result<String, RepoError> {
        let Some(write) = &self.write else {
            return Err(RepoError::Rejected {
                status: 401,
                message: "write access is not configured".to_string(),
            });
        };
        write.create("comments", &comment).await
    }

    async fn comments_for(&self, parent_id: &str) -> Result<Vec<Comment>, RepoError> {
        let query = ListQuery {
            offset: 0,
            limit: COMMENT_LIMIT,
            filters: Some(format!("parentId[equals]{}", parent_id)),
            orders: Some("-postedAt".to_string()),
            fields: None,
        };
        let page = self.read.list::<Comment>("comments", &query).await?;
        Ok(page.contents)
    }
}
