use crate::constants::USER_AGENT;
use crate::error::{Result, SpecsError};
use crate::types::SourceKind;
use reqwest::Client;
use tracing::{debug, instrument};

/// Thin wrapper around a shared reqwest client that turns every failure mode
/// of a page fetch into a `SpecsError::Fetch`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// GET `url` with `query` and return the body.
    ///
    /// Non-2xx statuses and empty bodies are fetch errors.
    #[instrument(skip(self, query))]
    pub async fn get_text(
        &self,
        source: SourceKind,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| SpecsError::fetch(source.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpecsError::fetch(
                source.as_str(),
                format!("{url} responded with status {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SpecsError::fetch(source.as_str(), e.to_string()))?;

        if text.trim().is_empty() {
            return Err(SpecsError::fetch(
                source.as_str(),
                format!("{url} returned an empty body"),
            ));
        }

        debug!("Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }
}
