//! Fetching the `/.well-known/402.json` discovery manifest.
//!
//! The manifest is read with a plain `reqwest` client, outside the payment
//! middleware: a discovery request is never paid for.

use cash402::discovery::{DiscoveryManifest, WELL_KNOWN_PATH};
use reqwest::StatusCode;
use url::Url;

/// Errors that can occur while fetching a discovery manifest.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// Resolves the manifest URL for the origin of `base`.
///
/// Any path, query or fragment on `base` is dropped.
///
/// # Errors
///
/// Returns [`DiscoveryError::UrlParse`] if `base` is not an absolute URL.
pub fn manifest_url(base: &str) -> Result<Url, DiscoveryError> {
    let context = "Failed to resolve discovery URL";
    Url::parse(base)
        .and_then(|base| base.join(WELL_KNOWN_PATH))
        .map_err(|source| DiscoveryError::UrlParse { context, source })
}

/// Fetches and decodes the discovery manifest published by the origin of `base`.
///
/// # Errors
///
/// Returns [`DiscoveryError`] if the URL is invalid, the request fails, the
/// server answers anything but `200 OK`, or the body is not a manifest.
#[cfg_attr(
    feature = "telemetry",
    tracing::instrument(name = "x402.discovery.fetch", skip(client), err)
)]
pub async fn fetch_manifest(
    client: &reqwest::Client,
    base: &str,
) -> Result<DiscoveryManifest, DiscoveryError> {
    let context = "GET /.well-known/402.json";
    let url = manifest_url(base)?;
    let http_response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DiscoveryError::Http { context, source: e })?;

    if http_response.status() == StatusCode::OK {
        http_response
            .json::<DiscoveryManifest>()
            .await
            .map_err(|e| DiscoveryError::JsonDeserialization { context, source: e })
    } else {
        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| DiscoveryError::ResponseBodyRead { context, source: e })?;
        Err(DiscoveryError::HttpStatus {
            context,
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_manifest_url_uses_origin() {
        let url = manifest_url("http://localhost:3000/api/data?x=1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/.well-known/402.json");
        assert!(matches!(
            manifest_url("not a url"),
            Err(DiscoveryError::UrlParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_manifest() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/402.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "CashApi",
                "protocol_version": "x402-bch-v2",
                "endpoints": [{"path": "/data", "method": "GET", "amount": 546, "asset": "bch"}],
                "network": "chipnet"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let manifest = fetch_manifest(&reqwest::Client::new(), &mock_server.uri())
            .await
            .unwrap();
        assert_eq!(manifest.name.as_deref(), Some("CashApi"));
        assert_eq!(manifest.price_of("GET", "/data").unwrap().amount, 546);
    }

    #[tokio::test]
    async fn test_fetch_manifest_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&mock_server)
            .await;

        let err = fetch_manifest(&reqwest::Client::new(), &mock_server.uri())
            .await
            .unwrap_err();
        match err {
            DiscoveryError::HttpStatus { status, body, .. } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_manifest_bad_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = fetch_manifest(&reqwest::Client::new(), &mock_server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::JsonDeserialization { .. }));
    }
}
