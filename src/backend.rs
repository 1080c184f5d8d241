use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{join_url, Config};

/// The only failure the widget distinguishes. Every transport, status and
/// decoding problem collapses into it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("chat backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl ChatError {
    pub fn unavailable(reason: impl ToString) -> Self {
        ChatError::BackendUnavailable(reason.to_string())
    }
}

/// A retrieval hit the backend used to build its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Successful answer to one turn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ChatReply {
    #[cfg(test)]
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, message: &str) -> Result<ChatReply, ChatError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct TrainRequest<'a> {
    table_name: &'a str,
}

#[derive(Serialize)]
struct TrainSqlRequest<'a> {
    sql_query: &'a str,
    source_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TrainSummary {
    pub message: String,
    pub processed_rows: u64,
}

#[derive(Debug, Deserialize)]
pub struct SqlTrainSummary {
    pub message: String,
    pub count: u64,
}

#[derive(Deserialize)]
struct TablesResponse {
    tables: Vec<String>,
}

#[derive(Deserialize)]
struct ColumnsResponse {
    columns: Vec<String>,
}

/// FastAPI style error body.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

const TABLES_PATH: &str = "/api/tables";
const TRAIN_SQL_PATH: &str = "/api/train-sql";

#[derive(Clone, Debug)]
pub struct HttpChatBackend {
    client: Client,
    endpoint: String,
    chat_url: String,
    train_url: String,
}

impl HttpChatBackend {
    pub fn new(endpoint: &str, chat_path: &str, train_path: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            chat_url: join_url(endpoint, chat_path),
            train_url: join_url(endpoint, train_path),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.endpoint,
            &config.chat_path,
            &config.train_path,
            config.request_timeout(),
        )
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Ask the backend to index a database table.
    pub async fn train(&self, table_name: &str) -> Result<TrainSummary> {
        let response = self
            .client
            .post(&self.train_url)
            .json(&TrainRequest { table_name })
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.train_url))?;

        let response = checked(response, "training request").await?;
        let summary: TrainSummary = response.json().await?;
        Ok(summary)
    }

    /// Index the rows returned by an arbitrary SQL query under `source_name`.
    pub async fn train_sql(&self, sql_query: &str, source_name: &str) -> Result<SqlTrainSummary> {
        let url = join_url(&self.endpoint, TRAIN_SQL_PATH);
        let response = self
            .client
            .post(&url)
            .json(&TrainSqlRequest { sql_query, source_name })
            .send()
            .await
            .with_context(|| format!("could not reach {url}"))?;

        let response = checked(response, "SQL training request").await?;
        let summary: SqlTrainSummary = response.json().await?;
        Ok(summary)
    }

    pub async fn tables(&self) -> Result<Vec<String>> {
        let url = join_url(&self.endpoint, TABLES_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("could not reach {url}"))?;

        let response = checked(response, "table listing").await?;
        let body: TablesResponse = response.json().await?;
        Ok(body.tables)
    }

    pub async fn columns(&self, table_name: &str) -> Result<Vec<String>> {
        let mut url = Url::parse(&join_url(&self.endpoint, TABLES_PATH))
            .with_context(|| format!("invalid endpoint {}", self.endpoint))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("endpoint {} cannot take a path", self.endpoint))?
            .push(table_name)
            .push("columns");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("could not reach {url}"))?;

        let response = checked(response, "column listing").await?;
        let body: ColumnsResponse = response.json().await?;
        Ok(body.columns)
    }
}

/// Turn a non-2xx response into an error carrying the server's `detail`.
async fn checked(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => Err(anyhow!("{what} failed with status {status}: {}", body.detail)),
        Err(_) => Err(anyhow!("{what} failed with status {status}")),
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send_chat(&self, message: &str) -> Result<ChatReply, ChatError> {
        let response = self
            .client
            .post(&self.chat_url)
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(ChatError::unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::unavailable(format!("status {status}")));
        }

        response.json::<ChatReply>().await.map_err(ChatError::unavailable)
    }
}
