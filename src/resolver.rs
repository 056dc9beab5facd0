//! Metadata resolution: the seam between the pipeline and whatever turns a post URL
//! into a media document.

use crate::config::ResolverConfig;
use crate::error::{Error, ResolveError};
use crate::types::MediaRecord;

/// Abstraction over metadata resolution, enabling testability.
///
/// Implementations report failures as [`ResolveError`]; free-form upstream messages should
/// go through [`ResolveError::from_message`] so authorization problems and permanently
/// invalid links are recognised.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve one post URL to its metadata document
    async fn resolve(&self, url: &str) -> Result<MediaRecord, ResolveError>;
}

/// Production [`Resolver`] backed by an HTTP endpoint.
///
/// Issues `GET <endpoint>?url=<post url>` and expects the metadata document as a JSON body.
/// A 401 maps to [`ResolveError::Unauthorized`]; other non-success statuses carry the
/// response body so it can be classified.
pub struct HttpResolver {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpResolver {
    /// Build a resolver from configuration
    pub fn new(config: &ResolverConfig) -> crate::Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint).map_err(|e| {
            Error::config(
                format!("invalid resolver endpoint '{}': {}", config.endpoint, e),
                "resolver.endpoint",
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait::async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, url: &str) -> Result<MediaRecord, ResolveError> {
        let mut request_url = self.endpoint.clone();
        request_url.query_pairs_mut().append_pair("url", url);

        let response = self.client.get(request_url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::from_status(status, body));
        }

        let body = response.bytes().await?;
        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ResolveError::Decode(e.to_string()))?;

        // Some resolvers report failures in a 200 body
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(ResolveError::from_message(message));
        }

        let record = MediaRecord::from_value(value);
        if record.is_unreadable() {
            return Err(ResolveError::Decode(
                "response is not a metadata document".to_string(),
            ));
        }
        Ok(record)
    }
}
