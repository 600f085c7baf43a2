//! Algolia-compatible REST client.
//!
//! Reads go to `https://{app_id}-dsn.algolia.net`, writes to
//! `https://{app_id}.algolia.net`; `index.host` replaces both (useful for
//! proxies and local mock servers). Every request carries the application id
//! and admin key headers and is bounded by `index.timeout_secs`.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | settings | `PUT /1/indexes/{name}/settings` |
//! | search | `POST /1/indexes/{name}/query` |
//! | browse | `POST /1/indexes/{name}/browse` (cursor) |
//! | upsert | `POST /1/indexes/{name}/batch` (`updateObject`) |
//! | delete | `POST /1/indexes/{name}/batch` (`deleteObject`) |
//! | stats | `GET /1/indexes?page=N` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{Credentials, IndexConfig, IndexSettings};
use crate::error::{IndexError, SyncError};
use crate::models::{IndexRecord, IndexStats};

use super::{BrowsePage, SearchIndex, SearchPage};

/// Client for one named index on an Algolia application.
pub struct AlgoliaIndex {
    client: Client,
    name: String,
    credentials: Credentials,
    read_base: Url,
    write_base: Url,
}

impl AlgoliaIndex {
    /// Builds a client from config, resolving credentials from the environment.
    ///
    /// Missing credentials surface as [`SyncError::Config`] before any
    /// network call is attempted.
    pub fn from_config(config: &IndexConfig) -> Result<Self, SyncError> {
        let credentials = config.credentials()?;
        Ok(Self::new(config, credentials)?)
    }

    /// Builds a client with explicit credentials.
    pub fn new(config: &IndexConfig, credentials: Credentials) -> Result<Self, IndexError> {
        let (read_base, write_base) = match &config.host {
            Some(host) => {
                let url = parse_base(host)?;
                (url.clone(), url)
            }
            None => (
                parse_base(&format!("https://{}-dsn.algolia.net", credentials.app_id))?,
                parse_base(&format!("https://{}.algolia.net", credentials.app_id))?,
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            name: config.name.clone(),
            credentials,
            read_base,
            write_base,
        })
    }

    /// `{base}/1/indexes/{name}/{tail...}`, with the index name escaped.
    fn index_url(&self, base: &Url, tail: &[&str]) -> Result<Url, IndexError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::Invalid(format!("cannot use {} as a base URL", base)))?
            .pop_if_empty()
            .extend(["1", "indexes", self.name.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, IndexError> {
        let mut request = self
            .client
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.credentials.app_id)
            .header("X-Algolia-API-Key", &self.credentials.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            return Err(IndexError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))
    }

    async fn batch(&self, requests: Vec<Value>) -> Result<Value, IndexError> {
        let url = self.index_url(&self.write_base, &["batch"])?;
        self.send(Method::POST, url, Some(json!({ "requests": requests })))
            .await
    }
}

fn parse_base(raw: &str) -> Result<Url, IndexError> {
    Url::parse(raw).map_err(|e| IndexError::Invalid(format!("invalid host '{}': {}", raw, e)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    hits: Vec<Hit>,
    #[serde(default)]
    page: usize,
    #[serde(default)]
    nb_pages: usize,
}

#[derive(Deserialize)]
struct BrowseResponse {
    hits: Vec<Hit>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    #[serde(default, rename = "objectIDs")]
    object_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIndicesResponse {
    #[serde(default)]
    items: Vec<IndexEntry>,
    #[serde(default)]
    nb_pages: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    name: String,
    #[serde(default)]
    entries: u64,
    #[serde(default)]
    data_size: Option<u64>,
    #[serde(default)]
    updated_at: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, IndexError> {
    serde_json::from_value(value).map_err(|e| IndexError::Decode(e.to_string()))
}

#[async_trait]
impl SearchIndex for AlgoliaIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply_settings(&self, settings: &IndexSettings) -> Result<(), IndexError> {
        let url = self.index_url(&self.write_base, &["settings"])?;
        let body = json!({
            "searchableAttributes": settings.searchable_attributes,
            "attributesForFaceting": settings.attributes_for_faceting,
            "customRanking": settings.custom_ranking,
        });
        self.send(Method::PUT, url, Some(body)).await?;
        Ok(())
    }

    async fn search_page(
        &self,
        query: &str,
        page: usize,
        hits_per_page: usize,
    ) -> Result<SearchPage, IndexError> {
        let url = self.index_url(&self.read_base, &["query"])?;
        let body = json!({
            "query": query,
            "page": page,
            "hitsPerPage": hits_per_page,
            "attributesToRetrieve": ["objectID"],
        });
        let response: QueryResponse = decode(self.send(Method::POST, url, Some(body)).await?)?;
        Ok(SearchPage {
            ids: response.hits.into_iter().map(|h| h.object_id).collect(),
            page: response.page,
            nb_pages: response.nb_pages,
        })
    }

    /// Uses the browse endpoint, which is not subject to `paginationLimitedTo`.
    async fn browse_page(
        &self,
        cursor: Option<String>,
        hits_per_page: usize,
    ) -> Result<BrowsePage, IndexError> {
        let url = self.index_url(&self.read_base, &["browse"])?;
        let mut body = json!({
            "hitsPerPage": hits_per_page,
            "attributesToRetrieve": ["objectID"],
        });
        if let Some(cursor) = cursor {
            body["cursor"] = Value::String(cursor);
        }
        let response: BrowseResponse = decode(self.send(Method::POST, url, Some(body)).await?)?;
        Ok(BrowsePage {
            ids: response.hits.into_iter().map(|h| h.object_id).collect(),
            cursor: response.cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn save_objects(&self, records: &[IndexRecord]) -> Result<Vec<String>, IndexError> {
        let requests = records
            .iter()
            .map(|record| {
                serde_json::to_value(record)
                    .map(|body| json!({ "action": "updateObject", "body": body }))
                    .map_err(|e| IndexError::Invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let response: BatchResponse = decode(self.batch(requests).await?)?;
        Ok(response.object_ids)
    }

    async fn delete_objects(&self, ids: &[String]) -> Result<(), IndexError> {
        let requests = ids
            .iter()
            .map(|id| json!({ "action": "deleteObject", "body": { "objectID": id } }))
            .collect();
        self.batch(requests).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        let mut page = 0;
        loop {
            let mut url = self.read_base.clone();
            url.path_segments_mut()
                .map_err(|_| IndexError::Invalid("cannot use host as a base URL".to_string()))?
                .pop_if_empty()
                .extend(["1", "indexes"]);
            url.query_pairs_mut().append_pair("page", &page.to_string());

            let response: ListIndicesResponse = decode(self.send(Method::GET, url, None).await?)?;
            if let Some(entry) = response.items.into_iter().find(|e| e.name == self.name) {
                return Ok(IndexStats {
                    number_of_records: entry.entries,
                    data_size: entry.data_size,
                    last_build_time_utc: entry.updated_at,
                });
            }

            page += 1;
            if page >= response.nb_pages {
                return Err(IndexError::Status {
                    status: 404,
                    message: format!("index '{}' does not exist", self.name),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(host: Option<&str>) -> AlgoliaIndex {
        let config = IndexConfig {
            name: "dev content".to_string(),
            host: host.map(String::from),
            ..IndexConfig::default()
        };
        AlgoliaIndex::new(
            &config,
            Credentials {
                app_id: "APP42".to_string(),
                api_key: "secret".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn default_hosts_derive_from_app_id() {
        let index = index(None);
        assert_eq!(index.read_base.as_str(), "https://app42-dsn.algolia.net/");
        assert_eq!(index.write_base.as_str(), "https://app42.algolia.net/");
    }

    #[test]
    fn index_name_is_escaped() {
        let index = index(Some("http://127.0.0.1:9000"));
        let url = index.index_url(&index.write_base, &["batch"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/1/indexes/dev%20content/batch");
    }

    #[test]
    fn bad_host_is_rejected() {
        let config = IndexConfig {
            host: Some("not a url".to_string()),
            ..IndexConfig::default()
        };
        let result = AlgoliaIndex::new(
            &config,
            Credentials {
                app_id: "A".to_string(),
                api_key: "k".to_string(),
            },
        );
        assert!(matches!(result, Err(IndexError::Invalid(_))));
    }

    #[test]
    fn query_response_decodes() {
        let value = json!({
            "hits": [{ "objectID": "mcpx_a" }, { "objectID": "mcpx_b" }],
            "page": 0,
            "nbPages": 2,
            "nbHits": 3
        });
        let response: QueryResponse = decode(value).unwrap();
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.nb_pages, 2);
    }

    #[test]
    fn browse_response_ends_without_cursor() {
        let more: BrowseResponse = decode(json!({
            "hits": [{ "objectID": "mcpx_a" }],
            "cursor": "AgA="
        }))
        .unwrap();
        assert_eq!(more.cursor.as_deref(), Some("AgA="));

        let last: BrowseResponse = decode(json!({ "hits": [], "page": 0 })).unwrap();
        assert!(last.cursor.is_none());
    }
}
