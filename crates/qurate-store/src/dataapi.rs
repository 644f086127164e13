//! HTTP adapter for a JSON-command document API with vector search.
//!
//! One endpoint per collection; every operation is a POST carrying a
//! single command object (`find`, `findOne`, `insertOne`, ...). Vector
//! search is a `find` sorted by `$vector` with `includeSimilarity`, and
//! the similarity threshold is applied client-side because the API has
//! no score cutoff. Transient transport failures are retried with
//! exponential backoff before surfacing as `ProviderUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use qurate_core::error::{Error, Result};
use qurate_core::model::QaRecord;
use qurate_core::store::{DocumentStore, Neighbor, RecordFilter, RecordPage, RecordPatch};

const SOURCE: &str = "data api";

/// Connection settings for a [`DataApiStore`].
#[derive(Debug, Clone)]
pub struct DataApiSettings {
    /// Base URL of the API, e.g. `https://db-region.apps.example.com`.
    pub endpoint: String,
    /// Application token, sent as the `Token` header.
    pub token: String,
    pub keyspace: String,
    pub collection: String,
    pub request_timeout: Duration,
    /// Transient-failure retries per request, beyond the first attempt.
    pub max_retries: usize,
}

// ---------------------------------------------------------------------------
// API response types (private -- only the fields we consume)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    status: Option<ApiStatus>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    documents: Vec<Value>,
    #[serde(default, deserialize_with = "present_value")]
    document: Option<Value>,
    #[serde(default, rename = "nextPageState")]
    next_page_state: Option<String>,
}

/// Keep an explicit `"document": null` as `Some(Value::Null)` instead of
/// folding it into `None`, so it stays distinct from an absent field.
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default, rename = "matchedCount")]
    matched_count: Option<u64>,
    #[serde(default, rename = "deletedCount")]
    deleted_count: Option<u64>,
    #[serde(default, rename = "insertedIds")]
    inserted_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "errorCode")]
    error_code: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match &self.error_code {
            Some(code) => format!("{} ({})", self.message, code),
            None => self.message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// `DocumentStore` over the JSON-command document API.
#[derive(Debug, Clone)]
pub struct DataApiStore {
    http: Client,
    url: String,
    token: String,
    max_retries: usize,
}

impl DataApiStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: DataApiSettings) -> Result<Self> {
        let url = format!(
            "{}/api/json/v1/{}/{}",
            settings.endpoint.trim_end_matches('/'),
            settings.keyspace,
            settings.collection
        );
        let http = Client::builder()
            .user_agent("qurate/0.1.0 (https://github.com/oxur/qurate)")
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::provider(SOURCE, e.to_string()))?;
        Ok(Self {
            http,
            url,
            token: settings.token,
            max_retries: settings.max_retries,
        })
    }

    /// Cheap connectivity probe used by the status command.
    pub async fn ping(&self) -> Result<()> {
        let body = json!({ "findOne": { "filter": {}, "projection": { "_id": 1 } } });
        self.command(&body).await.map(|_| ())
    }

    /// POST one command, retrying transient transport failures.
    async fn command(&self, body: &Value) -> Result<ApiResponse> {
        let send = || async { self.send_command(body).await };
        send.retry(ExponentialBuilder::default().with_max_times(self.max_retries))
            .when(Error::is_transient)
            .notify(|err: &Error, wait: Duration| {
                log::warn!("Data API call failed, retrying in {:?}: {}", wait, err);
            })
            .await
    }

    async fn send_command(&self, body: &Value) -> Result<ApiResponse> {
        let response = self
            .http
            .post(&self.url)
            .header("Token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::provider(SOURCE, e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::provider(SOURCE, format!("HTTP {status}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                source_name: SOURCE,
                status: status.as_u16(),
                message,
            });
        }

        let api: ApiResponse = response.json().await.map_err(|e| Error::Api {
            source_name: SOURCE,
            status: status.as_u16(),
            message: format!("invalid response body: {e}"),
        })?;

        if !api.errors.is_empty() {
            let message = api
                .errors
                .iter()
                .map(ApiError::describe)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Api {
                source_name: SOURCE,
                status: status.as_u16(),
                message,
            });
        }

        Ok(api)
    }
}

#[async_trait]
impl DocumentStore for DataApiStore {
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        limit: usize,
        page_state: Option<String>,
    ) -> Result<RecordPage> {
        let mut options = json!({ "limit": limit });
        if let Some(state) = page_state {
            options["pageState"] = json!(state);
        }
        let body = json!({
            "find": {
                "filter": filter_to_json(filter, None),
                "options": options,
            }
        });

        let api = self.command(&body).await?;
        let data = api.data.unwrap_or_default();
        let records = data
            .documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<QaRecord>, _>>()?;

        log::debug!(
            "Fetched {} record(s){}",
            records.len(),
            if data.next_page_state.is_some() {
                " (more pages remain)"
            } else {
                ""
            }
        );
        Ok(RecordPage {
            records,
            next_page_state: data.next_page_state,
        })
    }

    async fn vector_neighbors(
        &self,
        vector: &[f32],
        threshold: f64,
        limit: usize,
        exclude_id: Option<&str>,
        scope: &RecordFilter,
    ) -> Result<Vec<Neighbor>> {
        let body = json!({
            "find": {
                "filter": filter_to_json(scope, exclude_id),
                "sort": { "$vector": vector },
                "options": { "limit": limit, "includeSimilarity": true },
            }
        });

        let api = self.command(&body).await?;
        let documents = api.data.unwrap_or_default().documents;

        let mut neighbors = Vec::new();
        for doc in documents {
            let (record, score) = neighbor_from_document(doc)?;
            if score >= threshold {
                neighbors.push(Neighbor { record, score });
            }
        }
        Ok(neighbors)
    }

    async fn get(&self, id: &str) -> Result<Option<QaRecord>> {
        let body = json!({ "findOne": { "filter": { "_id": id } } });
        let api = self.command(&body).await?;
        match api.data.and_then(|d| d.document) {
            None | Some(Value::Null) => Ok(None),
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        }
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<bool> {
        // Read-modify-write keeps version semantics identical across
        // backends; the API's $set path cannot bump the counter for us.
        let Some(mut record) = self.get(id).await? else {
            return Ok(false);
        };
        patch.apply_to(&mut record);
        self.replace(&record).await
    }

    async fn replace(&self, record: &QaRecord) -> Result<bool> {
        let replacement = serde_json::to_value(record)?;
        let body = json!({
            "findOneAndReplace": {
                "filter": { "_id": record.id },
                "replacement": replacement,
            }
        });
        let api = self.command(&body).await?;

        let matched = match api.status.as_ref().and_then(|s| s.matched_count) {
            Some(count) => count > 0,
            // Older servers omit the count; fall back to the returned document
            None => api
                .data
                .as_ref()
                .is_some_and(|d| d.document.as_ref().is_some_and(|v| !v.is_null())),
        };
        Ok(matched)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let body = json!({ "deleteOne": { "filter": { "_id": id } } });
        let api = self.command(&body).await?;
        Ok(api.status.and_then(|s| s.deleted_count).unwrap_or(0) > 0)
    }

    async fn insert(&self, record: &QaRecord) -> Result<()> {
        let document = serde_json::to_value(record)?;
        let body = json!({ "insertOne": { "document": document } });
        let api = self.command(&body).await?;

        let inserted = api.status.is_some_and(|s| !s.inserted_ids.is_empty());
        if inserted {
            Ok(())
        } else {
            Err(Error::Api {
                source_name: SOURCE,
                status: 200,
                message: format!("insert of {} reported no inserted ids", record.id),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Command assembly helpers
// ---------------------------------------------------------------------------

/// Render a `RecordFilter` (plus optional id exclusion) as an API filter
/// object. Must agree with `RecordFilter::matches`.
fn filter_to_json(filter: &RecordFilter, exclude_id: Option<&str>) -> Value {
    let mut obj = serde_json::Map::new();
    if let Some(category) = &filter.category {
        obj.insert("category".to_string(), json!(category));
    }
    if let Some(source) = &filter.source_file {
        obj.insert("source_file".to_string(), json!(source));
    }
    if filter.date_from.is_some() || filter.date_to.is_some() {
        // ISO dates compare correctly as strings
        let mut range = serde_json::Map::new();
        if let Some(from) = filter.date_from {
            range.insert("$gte".to_string(), json!(from));
        }
        if let Some(to) = filter.date_to {
            range.insert("$lte".to_string(), json!(to));
        }
        obj.insert("document_date".to_string(), Value::Object(range));
    }
    if let Some(answer) = &filter.answer {
        obj.insert("answer".to_string(), json!(answer));
    }
    if let Some(id) = exclude_id {
        obj.insert("_id".to_string(), json!({ "$ne": id }));
    }
    Value::Object(obj)
}

/// Split a similarity-search document into the record and its score.
fn neighbor_from_document(mut doc: Value) -> Result<(QaRecord, f64)> {
    let score = match doc.as_object_mut() {
        Some(map) => map
            .remove("$similarity")
            .as_ref()
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        None => 0.0,
    };
    let record: QaRecord = serde_json::from_value(doc)?;
    Ok((record, score))
}
