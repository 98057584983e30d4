//! Qdrant REST client implementing the vector store seam.
//!
//! Talks to Qdrant's HTTP API directly so the knowledge layer can probe
//! collection schemas and run dense/sparse retrievals as separate ranked
//! lists (fusion happens client-side in domains/knowledge).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use super::{BaseVectorStore, CollectionSchema, IndexPoint, PayloadFilter, ScoredPoint, SparseVector};

/// Named vector slots used for hybrid collections.
pub const DENSE_VECTOR_NAME: &str = "dense";
pub const SPARSE_VECTOR_NAME: &str = "sparse";

#[derive(Clone)]
pub struct QdrantHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl QdrantHttpClient {
    /// Build a client for a Qdrant instance.
    ///
    /// `api_key` is optional for local/unsecured deployments.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self> {
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Qdrant URL must be an http(s) URL"
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim()).context("invalid Qdrant API key")?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build Qdrant HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Qdrant {} failed ({}): {}", what, status, body);
        }
        Ok(response)
    }

    async fn run_query(&self, collection: &str, body: serde_json::Value) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points/query", collection)))
            .json(&body)
            .send()
            .await
            .context("Qdrant query request failed")?;
        let response = Self::check(response, "query").await?;
        let payload: QueryResponse = response
            .json()
            .await
            .context("failed to parse Qdrant query response")?;
        Ok(payload
            .result
            .points
            .into_iter()
            .map(|p| ScoredPoint {
                id: p.id,
                score: p.score.unwrap_or(0.0),
                payload: p.payload.unwrap_or_else(|| json!({})),
            })
            .collect())
    }
}

fn filter_json(filter: Option<&PayloadFilter>) -> Option<serde_json::Value> {
    let filter = filter?;
    if filter.must.is_empty() {
        return None;
    }
    let must: Vec<serde_json::Value> = filter
        .must
        .iter()
        .map(|(key, value)| json!({"key": key, "match": {"value": value}}))
        .collect();
    Some(json!({ "must": must }))
}

#[async_trait]
impl BaseVectorStore for QdrantHttpClient {
    async fn collection_schema(&self, collection: &str) -> Result<CollectionSchema> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{}", collection)))
            .send()
            .await
            .context("Qdrant collection info request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(CollectionSchema::Missing);
        }
        let response = Self::check(response, "collection info").await?;
        let info: CollectionInfoResponse = response
            .json()
            .await
            .context("failed to parse Qdrant collection info")?;

        let params = info.result.config.params;
        let has_named_dense = params
            .vectors
            .as_ref()
            .map(|v| v.get(DENSE_VECTOR_NAME).is_some())
            .unwrap_or(false);
        let has_sparse = params
            .sparse_vectors
            .as_ref()
            .map(|v| v.get(SPARSE_VECTOR_NAME).is_some())
            .unwrap_or(false);

        if has_named_dense && has_sparse {
            Ok(CollectionSchema::Hybrid)
        } else {
            Ok(CollectionSchema::DenseOnly)
        }
    }

    async fn create_hybrid_collection(&self, collection: &str, dense_size: usize) -> Result<()> {
        let body = json!({
            "vectors": {
                DENSE_VECTOR_NAME: { "size": dense_size, "distance": "Cosine" }
            },
            "sparse_vectors": {
                SPARSE_VECTOR_NAME: {}
            }
        });
        let response = self
            .client
            .put(self.url(&format!("/collections/{}", collection)))
            .json(&body)
            .send()
            .await
            .context("Qdrant create collection request failed")?;
        Self::check(response, "create collection").await?;
        tracing::info!(collection, dense_size, "Created hybrid Qdrant collection");
        Ok(())
    }

    async fn create_payload_indexes(&self, collection: &str, fields: &[&str]) -> Result<()> {
        for field in fields {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            let response = self
                .client
                .put(self.url(&format!("/collections/{}/index", collection)))
                .json(&body)
                .send()
                .await
                .context("Qdrant payload index request failed")?;
            // Index creation races with itself on restart; existing indexes are fine.
            if let Err(e) = Self::check(response, "create payload index").await {
                tracing::warn!(collection, field, error = %e, "Payload index creation (may already exist)");
            } else {
                tracing::info!(collection, field, "Created payload index");
            }
        }
        Ok(())
    }

    async fn upsert_point(&self, collection: &str, point: IndexPoint) -> Result<()> {
        let vector = match &point.sparse {
            Some(sparse) => json!({
                DENSE_VECTOR_NAME: point.dense,
                SPARSE_VECTOR_NAME: { "indices": sparse.indices, "values": sparse.values },
            }),
            // Legacy dense-only collections use an unnamed vector slot.
            None => json!(point.dense),
        };
        let body = json!({
            "points": [{ "id": point.id, "vector": vector, "payload": point.payload }]
        });
        let response = self
            .client
            .put(self.url(&format!("/collections/{}/points?wait=true", collection)))
            .json(&body)
            .send()
            .await
            .context("Qdrant upsert request failed")?;
        Self::check(response, "upsert").await?;
        Ok(())
    }

    async fn query_dense(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "query": vector,
            "using": DENSE_VECTOR_NAME,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(f) = filter_json(filter) {
            body["filter"] = f;
        }
        match self.run_query(collection, body.clone()).await {
            Ok(points) => Ok(points),
            Err(e) => {
                // Legacy collections have no named vectors; retry unnamed.
                tracing::debug!(collection, error = %e, "Named dense query failed, retrying unnamed");
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("using");
                }
                self.run_query(collection, body).await
            }
        }
    }

    async fn query_sparse(
        &self,
        collection: &str,
        vector: &SparseVector,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "query": { "indices": vector.indices, "values": vector.values },
            "using": SPARSE_VECTOR_NAME,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(f) = filter_json(filter) {
            body["filter"] = f;
        }
        self.run_query(collection, body).await
    }

    async fn delete_points(&self, collection: &str, ids: &[u64]) -> Result<()> {
        let body = json!({ "points": ids });
        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points/delete?wait=true", collection)))
            .json(&body)
            .send()
            .await
            .context("Qdrant delete request failed")?;
        Self::check(response, "delete points").await?;
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<()> {
        let body = json!({ "filter": filter_json(Some(filter)).unwrap_or_else(|| json!({})) });
        let response = self
            .client
            .post(self.url(&format!("/collections/{}/points/delete?wait=true", collection)))
            .json(&body)
            .send()
            .await
            .context("Qdrant delete-by-filter request failed")?;
        Self::check(response, "delete by filter").await?;
        Ok(())
    }
}

// =============================================================================
// Response payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    #[serde(default)]
    vectors: Option<serde_json::Value>,
    #[serde(default)]
    sparse_vectors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<QueryPoint>,
}

#[derive(Debug, Deserialize)]
struct QueryPoint {
    id: u64,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}
