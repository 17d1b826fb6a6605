//! REST backend for a PostgREST-style table endpoint (e.g. Supabase).
//!
//! `reqwest::Client` is internally pooled and safe to share, so no extra
//! locking is needed here.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::SampleStore;
use crate::error::StoreError;
use crate::sample::{decode_records, Sample, SampleRecord, SampleWindow};

pub struct RestStore {
    client: Client,
    table_url: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        table: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            table_url: table_url(base_url, table),
            api_key,
        })
    }

    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("apikey", key).bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn fetch_rows(&self, query: &[(&str, String)]) -> Result<Vec<Sample>, StoreError> {
        let response = self.send(self.client.get(&self.table_url).query(query)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        decode_records(&body)
    }
}

/// `{base}/rest/v1/{table}` without doubled slashes
pub fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Map a non-success HTTP status onto the store error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> StoreError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::AuthFailure(detail),
        _ => StoreError::Unavailable(detail),
    }
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl SampleStore for RestStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let record = SampleRecord::from(sample);
        let req = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=minimal")
            .json(&record);
        self.send(req).await?;
        debug!("Appended sample at {}", format_timestamp(sample.timestamp));
        Ok(())
    }

    async fn query_latest(&self, n: usize) -> Result<SampleWindow, StoreError> {
        if n == 0 {
            return Ok(SampleWindow::empty());
        }
        let rows = self
            .fetch_rows(&[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", n.to_string()),
            ])
            .await?;
        // Ascending sort plus the bound guards against a server ignoring `limit`
        Ok(SampleWindow::new(rows).truncate_to_latest(n))
    }

    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SampleWindow, StoreError> {
        let rows = self
            .fetch_rows(&[
                ("select", "*".to_string()),
                ("created_at", format!("gte.{}", format_timestamp(from))),
                ("created_at", format!("lte.{}", format_timestamp(to))),
                ("order", "created_at.asc".to_string()),
            ])
            .await?;
        Ok(SampleWindow::new(rows))
    }

    async fn query_since(&self, from: DateTime<Utc>) -> Result<SampleWindow, StoreError> {
        let rows = self
            .fetch_rows(&[
                ("select", "*".to_string()),
                ("created_at", format!("gte.{}", format_timestamp(from))),
                ("order", "created_at.asc".to_string()),
            ])
            .await?;
        Ok(SampleWindow::new(rows))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let req = self
            .client
            .head(&self.table_url)
            .query(&[("select", "created_at")])
            .header("Prefer", "count=exact");
        let response = self.send(req).await?;
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| StoreError::MalformedResponse("missing Content-Range total".to_string()))
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
