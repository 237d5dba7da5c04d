use std::sync::Arc;

use config::shared::SourceConfig;
use engine::bail;
use engine::error::{ErrorKind, SyncError, SyncResult};
use engine::source::TabularSource;
use engine::sync_error;
use engine::types::SourceRecord;
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

/// One page of records returned by the source API.
#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<SourceRecord>,
    /// Cursor of the next page, absent on the last one.
    #[serde(default)]
    offset: Option<String>,
}

/// Tabular source reading records over HTTP.
///
/// Every table is exposed at `{base_url}/{table}` and paginated with an opaque `offset`
/// cursor. The API has no table listing, so each configured table is looked up with a
/// one-record request and only the ones that answer are reported.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    page_size: u32,
    tables: Arc<Vec<String>>,
}

impl HttpSource {
    pub fn new(config: &SourceConfig, tables: Vec<String>) -> SyncResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            sync_error!(
                ErrorKind::ConfigError,
                "Invalid source base url",
                format!("{}: {err}", config.base_url)
            )
        })?;

        let client = reqwest::Client::builder().build().map_err(|err| {
            sync_error!(
                ErrorKind::SourceError,
                "Failed to build the source http client",
                err.to_string()
            )
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            page_size: config.page_size,
            tables: Arc::new(tables),
        })
    }

    fn table_url(&self, table: &str) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(table);
            }
            Err(()) => bail!(
                ErrorKind::ConfigError,
                "Source base url cannot have path segments",
                self.base_url.as_str()
            ),
        }

        Ok(url)
    }

    /// Returns whether `table` exists. A `404` means it does not, other rejections are errors.
    async fn table_exists(&self, table: &str) -> SyncResult<bool> {
        let url = self.table_url(table)?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("pageSize", "1")])
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            bail!(
                classify_status(status),
                "Source table lookup was rejected",
                format!("{url} answered {status}")
            );
        }

        Ok(true)
    }

    async fn fetch_page(&self, url: &Url, offset: Option<&str>) -> SyncResult<RecordPage> {
        let mut request = self
            .client
            .get(url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .query(&[("pageSize", self.page_size.to_string())]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(sync_error!(
                classify_status(status),
                "Source request was rejected",
                format!("{url} answered {status}: {body}")
            ));
        }

        let body = response.text().await.map_err(classify_request_error)?;

        parse_page(&body)
    }
}

fn parse_page(body: &str) -> SyncResult<RecordPage> {
    Ok(serde_json::from_str(body)?)
}

fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::AuthenticationError,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::SourceTimeout,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::SourceConnectionFailed,
        status if status.is_server_error() => ErrorKind::SourceConnectionFailed,
        _ => ErrorKind::SourceQueryFailed,
    }
}

fn classify_request_error(err: reqwest::Error) -> SyncError {
    let kind = if err.is_timeout() {
        ErrorKind::SourceTimeout
    } else if err.is_connect() || err.is_request() {
        ErrorKind::SourceConnectionFailed
    } else if err.is_decode() {
        ErrorKind::DeserializationError
    } else {
        ErrorKind::SourceError
    };

    sync_error!(kind, "Source request failed", err.to_string())
}

impl TabularSource for HttpSource {
    fn name() -> &'static str {
        "http"
    }

    async fn list_tables(&self) -> SyncResult<Vec<String>> {
        let mut tables = Vec::with_capacity(self.tables.len());
        for table in self.tables.iter() {
            if self.table_exists(table).await? {
                tables.push(table.clone());
            } else {
                warn!(table, "configured table was not found in the source");
            }
        }

        Ok(tables)
    }

    async fn list_records(&self, table: &str) -> SyncResult<Vec<SourceRecord>> {
        let url = self.table_url(table)?;

        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let page = self.fetch_page(&url, offset.as_deref()).await?;
            debug!(table, records = page.records.len(), "fetched source page");
            records.extend(page.records);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use config::shared::SyncConfig;
    use engine::log::memory::MemorySyncLog;
    use engine::orchestrator::SyncOrchestrator;
    use engine::store::memory::MemoryRelationalStore;
    use engine::types::Value;
    use mockito::{Matcher, Server};

    use super::*;

    fn source_with_tables(base_url: &str, tables: &[&str]) -> HttpSource {
        let config = SourceConfig {
            base_url: base_url.to_string(),
            api_key: SecretString::new("key".to_string()),
            page_size: 100,
        };

        HttpSource::new(&config, tables.iter().map(|t| t.to_string()).collect()).unwrap()
    }

    fn source(base_url: &str) -> HttpSource {
        source_with_tables(base_url, &["Artists"])
    }

    #[test]
    fn page_with_cursor_is_parsed() {
        let page = parse_page(
            r#"{
                "records": [
                    {"id": "rec1", "fields": {"Name": "Ann", "Age": 30}},
                    {"id": "rec2"}
                ],
                "offset": "itr2"
            }"#,
        )
        .unwrap();

        assert_eq!(page.offset.as_deref(), Some("itr2"));
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].fields.get("Name"), Some(&Value::from("Ann")));
        assert!(page.records[1].fields.is_empty());
    }

    #[test]
    fn malformed_page_is_a_deserialization_error() {
        let err = parse_page(r#"{"records": "nope"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn table_names_are_escaped_into_the_path() {
        let source = source("https://api.example.com/v0/app123/");

        let url = source.table_url("Art Works").unwrap();

        assert_eq!(url.as_str(), "https://api.example.com/v0/app123/Art%20Works");
    }

    #[test]
    fn statuses_are_classified_for_retries() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ErrorKind::AuthenticationError
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorKind::SourceConnectionFailed
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::SourceConnectionFailed
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            ErrorKind::SourceQueryFailed
        );
    }

    #[tokio::test]
    async fn only_existing_tables_are_listed() {
        let mut server = Server::new_async().await;
        let _artists = server
            .mock("GET", "/app123/Artists")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"records": []}"#)
            .create_async()
            .await;
        let _ghosts = server
            .mock("GET", "/app123/Ghosts")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let source = source_with_tables(
            &format!("{}/app123", server.url()),
            &["Artists", "Ghosts"],
        );

        assert_eq!(source.list_tables().await.unwrap(), vec!["Artists"]);
    }

    #[tokio::test]
    async fn rejected_table_lookup_is_an_error() {
        let mut server = Server::new_async().await;
        let _artists = server
            .mock("GET", "/app123/Artists")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let source = source_with_tables(&format!("{}/app123", server.url()), &["Artists"]);

        let err = source.list_tables().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn missing_configured_table_fails_start() {
        let mut server = Server::new_async().await;
        let _artists = server
            .mock("GET", "/app123/Artists")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"records": []}"#)
            .create_async()
            .await;
        let _ghosts = server
            .mock("GET", "/app123/Ghosts")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let source = source_with_tables(
            &format!("{}/app123", server.url()),
            &["Artists", "Ghosts"],
        );
        let store = MemoryRelationalStore::new();
        let mut orchestrator = SyncOrchestrator::new(
            SyncConfig::new(["Artists", "Ghosts"]),
            source,
            store.clone(),
            MemorySyncLog::new(),
        );

        let err = orchestrator.start().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.detail(), Some("Ghosts"));
        assert!(store.executed_ddl().await.is_empty());
        assert!(!orchestrator.is_running());
    }
}
