use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use url::Url;

use crate::config::FetchConfig;
use crate::executor::{ToolError, ToolResult, truncate_head};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// HTTP or HTTPS URL to fetch
    pub url: String,
}

/// Plain HTTP(S) GET with a size cap on the returned body.
#[derive(Debug)]
pub struct FetchExecutor {
    client: reqwest::Client,
    max_chars: usize,
}

impl FetchExecutor {
    #[must_use]
    pub fn new(config: &FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("kestrel/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_chars: config.max_chars,
        }
    }

    /// # Errors
    ///
    /// Returns `ToolError::InvalidParams` for a malformed or non-HTTP URL,
    /// `ToolError::HttpStatus` for non-2xx responses, and `ToolError::Http`
    /// for transport failures.
    pub async fn fetch(&self, raw: &str) -> Result<ToolResult, ToolError> {
        let url = validate_url(raw)?;
        tracing::info!(%url, "fetching");

        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await?;
        let truncated = body.len() > self.max_chars;

        let mut result = ToolResult::ok(truncate_head(&body, self.max_chars))
            .with_detail("status", status.as_u16())
            .with_detail("truncated", truncated);
        if let Some(ct) = content_type {
            result = result.with_detail("content_type", ct);
        }
        Ok(result)
    }
}

fn validate_url(raw: &str) -> Result<Url, ToolError> {
    let parsed =
        Url::parse(raw).map_err(|e| ToolError::invalid("fetch_url", format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ToolError::invalid(
            "fetch_url",
            format!("scheme not allowed: {other}"),
        )),
    }
}
