use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use oci_spec::image::{Digest, ImageConfiguration, ImageIndex, ImageManifest, Os, Platform};
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::{ImageError, ImageResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const MANIFEST_LIST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, application/vnd.docker.distribution.manifest.list.v2+json";
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";
const CONFIG_ACCEPT: &str = "application/vnd.oci.image.config.v1+json, application/vnd.docker.container.image.v1+json";

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A client for the OCI Distribution v2 API: the collaborator an image
/// cache needs to turn a [`crate::Reference`] into manifests and layer
/// bytes. Abstracted as a trait so tests can substitute a fixture registry
/// without a network.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetches the manifest (or manifest list / image index) named by
    /// `selector`, which is either a tag or a digest string.
    async fn fetch_index(&self, registry: &str, repository: &str, selector: &str)
        -> ImageResult<ImageIndex>;

    /// Fetches a single-platform manifest by digest.
    async fn fetch_manifest(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
    ) -> ImageResult<ImageManifest>;

    /// Fetches an image configuration blob by digest.
    async fn fetch_config(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
    ) -> ImageResult<ImageConfiguration>;

    /// Streams a layer blob, resuming from `start_offset` bytes in (zero
    /// for a fresh download).
    async fn fetch_blob(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
        start_offset: u64,
    ) -> ImageResult<BoxStream<'static, ImageResult<Bytes>>>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A minimal, anonymous-or-bearer-token OCI Distribution v2 client.
///
/// Authentication follows the distribution spec's challenge-response
/// flow: a request that gets back `401` with a `WWW-Authenticate: Bearer
/// realm="...",service="...",scope="..."` header is retried against the
/// realm to obtain a token, which is then sent as `Authorization: Bearer`
/// on the real request. No credential helpers or mirror configuration —
/// anonymous pulls, or a bearer token supplied via [`DistributionClient::with_bearer_token`].
#[derive(Debug)]
pub struct DistributionClient {
    client: ClientWithMiddleware,
    bearer_token: Option<String>,
}

impl DistributionClient {
    /// Builds a client with retrying middleware and no static credentials.
    pub fn new() -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self {
            client,
            bearer_token: None,
        }
    }

    /// Supplies a static bearer token to use instead of performing the
    /// anonymous auth-challenge handshake.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    async fn authenticated_get(
        &self,
        registry: &str,
        repository: &str,
        path: &str,
        accept: &str,
    ) -> ImageResult<reqwest::Response> {
        let url = format!("https://{registry}/v2/{repository}/{path}");

        let send = |token: Option<&str>| {
            let mut request = self.client.get(&url).header("Accept", accept);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request.send()
        };

        if let Some(token) = &self.bearer_token {
            return Ok(send(Some(token)).await?);
        }

        let response = send(None).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get("WWW-Authenticate")
            .ok_or_else(|| {
                ImageError::UnsupportedAuthChallenge("missing WWW-Authenticate header".into())
            })?
            .to_str()
            .map_err(|e| ImageError::UnsupportedAuthChallenge(e.to_string()))?
            .to_string();

        let (realm, service, scope) = parse_bearer_challenge(&challenge)?;
        let mut token_request = self.client.get(&realm);
        if let Some(service) = &service {
            token_request = token_request.query(&[("service", service.as_str())]);
        }
        if let Some(scope) = &scope {
            token_request = token_request.query(&[("scope", scope.as_str())]);
        }

        let token_response: TokenResponse = token_request.send().await?.json().await?;
        Ok(send(Some(&token_response.token)).await?)
    }
}

impl Default for DistributionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
}

fn parse_bearer_challenge(
    challenge: &str,
) -> ImageResult<(String, Option<String>, Option<String>)> {
    let rest = challenge
        .strip_prefix("Bearer ")
        .ok_or_else(|| ImageError::UnsupportedAuthChallenge(challenge.to_string()))?;

    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    for part in split_challenge_params(rest) {
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"').to_string();
            match key {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }
    }

    let realm = realm
        .ok_or_else(|| ImageError::UnsupportedAuthChallenge("missing realm".to_string()))?;
    Ok((realm, service, scope))
}

fn split_challenge_params(s: &str) -> Vec<&str> {
    s.split(',').map(str::trim).collect()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Registry for DistributionClient {
    async fn fetch_index(
        &self,
        registry: &str,
        repository: &str,
        selector: &str,
    ) -> ImageResult<ImageIndex> {
        let response = self
            .authenticated_get(
                registry,
                repository,
                &format!("manifests/{selector}"),
                MANIFEST_LIST_ACCEPT,
            )
            .await?;
        ensure_success(response.status(), repository)?;
        Ok(response.json().await?)
    }

    async fn fetch_manifest(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
    ) -> ImageResult<ImageManifest> {
        let response = self
            .authenticated_get(
                registry,
                repository,
                &format!("manifests/{digest}"),
                MANIFEST_ACCEPT,
            )
            .await?;
        ensure_success(response.status(), repository)?;
        Ok(response.json().await?)
    }

    async fn fetch_config(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
    ) -> ImageResult<ImageConfiguration> {
        let response = self
            .authenticated_get(
                registry,
                repository,
                &format!("blobs/{digest}"),
                CONFIG_ACCEPT,
            )
            .await?;
        ensure_success(response.status(), repository)?;
        Ok(response.json().await?)
    }

    async fn fetch_blob(
        &self,
        registry: &str,
        repository: &str,
        digest: &Digest,
        start_offset: u64,
    ) -> ImageResult<BoxStream<'static, ImageResult<Bytes>>> {
        let url = format!("https://{registry}/v2/{repository}/blobs/{digest}");
        let mut request = self.client.get(&url);
        if start_offset > 0 {
            request = request.header("Range", format!("bytes={start_offset}-"));
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        ensure_success(response.status(), repository)?;

        use futures::StreamExt;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ImageError::from));
        Ok(Box::pin(stream))
    }
}

fn ensure_success(status: StatusCode, repository: &str) -> ImageResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ImageError::Registry(format!(
            "{repository}: registry responded with {status}"
        )))
    }
}

/// Picks the manifest descriptor in `index` matching the current
/// platform, preferring a `linux` match on architecture and skipping
/// attestation-only entries with no matching manifest content.
pub fn select_platform_manifest(index: &ImageIndex) -> Option<&oci_spec::image::Descriptor> {
    let platform = Platform::default();
    index
        .manifests()
        .iter()
        .find(|m| {
            m.platform()
                .as_ref()
                .map(|p| matches!(p.os(), Os::Linux) && p.architecture() == platform.architecture())
                .unwrap_or(false)
        })
        .or_else(|| {
            index.manifests().iter().find(|m| {
                m.platform()
                    .as_ref()
                    .map(|p| p.architecture() == platform.architecture())
                    .unwrap_or(false)
            })
        })
}
