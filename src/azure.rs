//! Azure AI Search REST client.
//!
//! Implements [`SearchBackend`] against the data-plane API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | search | `POST {endpoint}/indexes/{index}/docs/search?api-version=…` |
//! | fetch  | `GET {endpoint}/indexes/{index}/docs/{key}?api-version=…` |
//!
//! Authentication is the admin or query key in the `api-key` header.
//! Failures are returned as-is; there is no retry here.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;

use crate::backend::{Document, SearchBackend, SearchMode, SearchRequest};
use crate::config::SearchConfig;

pub struct AzureSearchClient {
    http: reqwest::Client,
    base: Url,
    index_name: String,
    api_key: String,
    api_version: String,
    semantic_configuration: Option<String>,
    vector_fields: Option<String>,
}

impl AzureSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base = Url::parse(&config.endpoint)
            .with_context(|| format!("invalid search endpoint: {}", config.endpoint))?;

        Ok(Self {
            http,
            base,
            index_name: config.index_name.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            semantic_configuration: config.semantic_configuration.clone(),
            vector_fields: config.vector_fields.clone(),
        })
    }

    /// `{endpoint}/indexes/{index}/docs[/{segments}]?api-version=…`
    fn docs_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("search endpoint cannot be a base URL: {}", self.base))?;
            path.pop_if_empty()
                .push("indexes")
                .push(&self.index_name)
                .push("docs")
                .extend(segments);
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Builds the JSON body for `docs/search`.
    pub fn search_body(&self, request: &SearchRequest) -> Value {
        let mut body = json!({
            "search": request.query,
            "top": request.top,
            "queryType": "simple",
        });

        match request.mode {
            SearchMode::Text => {}
            SearchMode::Semantic => match &self.semantic_configuration {
                Some(name) => {
                    body["queryType"] = json!("semantic");
                    body["semanticConfiguration"] = json!(name);
                }
                None => {
                    tracing::debug!("no semantic configuration set; using simple query");
                }
            },
            SearchMode::Hybrid => match &self.vector_fields {
                Some(fields) => {
                    body["vectorQueries"] = json!([{
                        "kind": "text",
                        "text": request.query,
                        "fields": fields,
                        "k": request.top,
                    }]);
                }
                None => {
                    tracing::debug!("no vector fields set; hybrid search sends the text leg only");
                }
            },
        }

        if let Some(filter) = &request.filter {
            body["filter"] = json!(filter);
        }

        body
    }
}

#[async_trait]
impl SearchBackend for AzureSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        let url = self.docs_url(&["search"])?;
        let body = self.search_body(request);

        tracing::debug!(mode = ?request.mode, top = request.top, "azure search");

        let response = self
            .http
            .post(url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Azure AI Search error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        parse_search_response(json)
    }

    async fn fetch(&self, document_id: &str) -> Result<Document> {
        let url = self.docs_url(&[document_id])?;

        let response = self
            .http
            .get(url)
            .header("api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            bail!("document not found: {}", document_id);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Azure AI Search error {}: {}", status, body_text);
        }

        match response.json().await? {
            Value::Object(doc) => Ok(doc),
            other => bail!("unexpected document payload: {}", other),
        }
    }
}

/// Extracts the `value` array, keeping order and every field.
fn parse_search_response(json: Value) -> Result<Vec<Document>> {
    let Value::Object(mut root) = json else {
        bail!("unexpected search response: not a JSON object");
    };
    let Some(Value::Array(values)) = root.remove("value") else {
        bail!("unexpected search response: missing 'value' array");
    };

    values
        .into_iter()
        .map(|v| match v {
            Value::Object(doc) => Ok(doc),
            other => Err(anyhow!("unexpected search hit: {}", other)),
        })
        .collect()
}
