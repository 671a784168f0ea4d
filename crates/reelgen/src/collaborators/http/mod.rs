//! reqwest-backed collaborators.

mod aligner;
mod images;
mod openai;
mod stitcher;
mod stock;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};

use super::{CollaboratorError, Collaborators};
use crate::config::{Config, SecretRef, TimeoutConfig};
use crate::error::ConfigError;

pub use aligner::AlignerClient;
pub use images::DiffusionClient;
pub use openai::OpenAiClient;
pub use stitcher::StitcherClient;
pub use stock::StockSearchClient;

/// Creates an HTTP client with the configured timeouts.
pub fn create_http_client(timeouts: &TimeoutConfig) -> Result<Client, ConfigError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_timeout_secs))
        .timeout(Duration::from_secs(timeouts.call_timeout_secs))
        .build()
        .map_err(|e| ConfigError::Validation {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Builds every collaborator against its configured endpoint.
pub fn collaborators(config: &Config) -> Result<Collaborators, ConfigError> {
    let client = create_http_client(&config.timeouts)?;
    let services = &config.services;

    let openai = Arc::new(OpenAiClient::new(
        client.clone(),
        &services.openai,
        required_key("openai", &services.openai.api_key)?,
    ));
    let stock = StockSearchClient::new(
        client.clone(),
        &services.stock.url,
        required_key("stock", &services.stock.api_key)?,
        config.stock.overfetch_factor,
    );
    let images = DiffusionClient::new(
        client.clone(),
        &services.images,
        required_key("images", &services.images.api_key)?,
    );

    Ok(Collaborators {
        script: openai.clone(),
        speech: openai.clone(),
        prompts: openai,
        aligner: Arc::new(AlignerClient::new(client.clone(), &services.aligner.url)),
        stock: Arc::new(stock),
        images: Arc::new(images),
        stitcher: Arc::new(StitcherClient::new(client, &services.stitcher.url)),
    })
}

fn required_key(
    service: &'static str,
    key: &SecretRef,
) -> Result<secrecy::SecretString, ConfigError> {
    key.resolve().map_err(|e| ConfigError::MissingService {
        service,
        reason: e.to_string(),
    })
}

/// Sends the request, then turns transport failures and non-success
/// statuses into collaborator errors.
pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Response, CollaboratorError> {
    let response = request
        .send()
        .await
        .map_err(|e| CollaboratorError::Request { service, source: e })?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::Status {
            service,
            status,
            body: truncate(&body, 512),
        });
    }
    Ok(response)
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, CollaboratorError> {
    response
        .json()
        .await
        .map_err(|e| CollaboratorError::invalid(service, e.to_string()))
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    #[serial]
    fn test_missing_key_names_service() {
        std::env::remove_var("REELGEN_TEST_UNSET_OPENAI");
        let mut config = Config::default();
        config.services.openai.api_key = SecretRef::from_env("REELGEN_TEST_UNSET_OPENAI");

        let err = collaborators(&config).err().unwrap();
        assert!(matches!(
            err,
            ConfigError::MissingService { service: "openai", .. }
        ));
    }

    #[test]
    fn test_inline_keys_build() {
        let mut config = Config::default();
        for key in [
            &mut config.services.openai.api_key,
            &mut config.services.stock.api_key,
            &mut config.services.images.api_key,
        ] {
            key.value = Some("test-key".into());
        }
        assert!(collaborators(&config).is_ok());
    }
}
