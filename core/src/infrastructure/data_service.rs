// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Hosted Data Service REST Adapter
//
// Speaks the PostgREST dialect exposed under `{url}/rest/v1/{table}`:
// - equality filters as `column=eq.value`, `order=column.asc|desc`, `limit=n`
// - single-object reads with `Accept: application/vnd.pgrst.object+json`;
//   error code PGRST116 ("0 rows") maps to `None`
// - upserts via POST `?on_conflict=` with `Prefer: resolution=merge-duplicates`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::domain::config::DataServiceConfig;
use crate::domain::records::Table;
use crate::domain::repository::{DataError, DataService, SortOrder, TableQuery};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NOT_FOUND_CODE: &str = "PGRST116";

pub struct PostgrestClient {
    client: reqwest::Client,
    base_url: Url,
    anon_key: String,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl PostgrestClient {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self, DataError> {
        let base_url = Url::parse(url)
            .map_err(|e| DataError::NotConfigured(format!("invalid data service URL '{}': {}", url, e)))?;
        let anon_key = anon_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&anon_key)
                .map_err(|e| DataError::NotConfigured(format!("invalid access key: {}", e)))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", anon_key))
                .map_err(|e| DataError::NotConfigured(format!("invalid access key: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DataError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    pub fn from_config(config: &DataServiceConfig) -> Result<Self, DataError> {
        Self::new(&config.url, config.anon_key.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    fn table_url(&self, table: Table) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}/rest/v1/{}", self.base_url.path().trim_end_matches('/'), table);
        url.set_path(&path);
        url.set_query(None);
        url
    }

    /// Full request URL for a query.
    pub fn query_url(&self, query: &TableQuery) -> Url {
        let mut url = self.table_url(query.table);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            for (column, value) in &query.filters {
                pairs.append_pair(column, &format!("eq.{}", value));
            }
            if let Some((column, order)) = &query.order {
                let direction = match order {
                    SortOrder::Ascending => "asc",
                    SortOrder::Descending => "desc",
                };
                pairs.append_pair("order", &format!("{}.{}", column, direction));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        url
    }

    async fn error_from(response: reqwest::Response) -> DataError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.details)
            .unwrap_or_else(|| body.clone());
        DataError::Status {
            status,
            code: parsed.code,
            message,
        }
    }
}

#[async_trait]
impl DataService for PostgrestClient {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DataError> {
        let url = self.query_url(query);
        debug!(%url, "Selecting rows");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| DataError::Decode(e.to_string()))
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Option<Value>, DataError> {
        let url = self.query_url(query);
        debug!(%url, "Selecting single row");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return match Self::error_from(response).await {
                DataError::Status { code: Some(code), .. } if code == NOT_FOUND_CODE => Ok(None),
                other => Err(other),
            };
        }

        response
            .json::<Value>()
            .await
            .map(Some)
            .map_err(|e| DataError::Decode(e.to_string()))
    }

    async fn upsert(&self, table: Table, row: Value, on_conflict: &str) -> Result<Value, DataError> {
        let mut url = self.table_url(table);
        url.query_pairs_mut()
            .append_pair("on_conflict", on_conflict)
            .append_pair("select", "*");
        debug!(%url, "Upserting row");

        let response = self
            .client
            .post(url)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| DataError::Decode(e.to_string()))
    }
}
