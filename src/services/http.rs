// Thin reqwest wrapper shared by the adapters: one client with a bounded
// timeout, status mapping into SourceError, and the shared retry policy.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::error::SourceError;
use crate::models::ImagePayload;

const USER_AGENT: &str = concat!("cinefetch/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    max_image_bytes: usize,
}

/// True for http(s) URLs whose host is not loopback, private, link-local
/// or otherwise internal. Hostnames are not resolved.
pub fn is_public_url(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => is_public_ipv4(ip),
        Ok(IpAddr::V6(ip)) => is_public_ipv6(ip),
        Err(_) => is_public_domain(host),
    }
}

fn is_public_domain(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    !(host.is_empty()
        || host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host.ends_with(".internal"))
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    // 0.0.0.0/8 and the 100.64.0.0/10 carrier-grade NAT range
    let reserved = a == 0 || (a == 100 && (b & 0xc0) == 64);
    !(reserved
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast())
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(v4);
    }
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

/// Redirects are only followed to public hosts
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if is_public_url(attempt.url()) {
            attempt.follow()
        } else {
            tracing::warn!("Not following redirect to {}", attempt.url());
            attempt.stop()
        }
    })
}

impl HttpClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect_policy())
            .build()?;

        Ok(Self {
            client,
            retry,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes.max(1);
        self
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, label: &str, url: &str) -> Result<T, SourceError> {
        match self.get_optional_json(label, url).await? {
            Some(value) => Ok(value),
            None => Err(SourceError::Rejected(StatusCode::NOT_FOUND.as_u16())),
        }
    }

    /// GET a JSON document, `Ok(None)` when the upstream answers 404
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        label: &str,
        url: &str,
    ) -> Result<Option<T>, SourceError> {
        let client = &self.client;
        let body = self
            .retry
            .run(label, || async move {
                let response = client
                    .get(url)
                    .header(ACCEPT, "application/json")
                    .send()
                    .await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let response = check_status(response)?;
                Ok(Some(response.bytes().await?))
            })
            .await?;

        match body {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// GET an image. Anything that does not answer with an `image/*`
    /// content type, or whose body exceeds the size cap, is rejected as
    /// malformed.
    pub async fn get_image(&self, label: &str, url: &str) -> Result<ImagePayload, SourceError> {
        let client = &self.client;
        let max_bytes = self.max_image_bytes;
        self.retry
            .run(label, || async move {
                let mut response = check_status(client.get(url).send().await?)?;
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim().to_ascii_lowercase());

                match content_type {
                    Some(ref ct) if ct.starts_with("image/") => {}
                    other => {
                        return Err(SourceError::Malformed(format!(
                            "expected an image, got {}",
                            other.as_deref().unwrap_or("no content type")
                        )))
                    }
                }

                if let Some(length) = response.content_length() {
                    if length > max_bytes as u64 {
                        return Err(too_large(max_bytes));
                    }
                }

                let final_url = response.url().to_string();
                let mut bytes = Vec::new();
                while let Some(chunk) = response.chunk().await? {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(too_large(max_bytes));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if bytes.is_empty() {
                    return Err(SourceError::Malformed("empty image body".to_string()));
                }

                Ok(ImagePayload {
                    url: final_url,
                    bytes: Some(bytes),
                    content_type,
                })
            })
            .await
    }
}

fn too_large(max_bytes: usize) -> SourceError {
    SourceError::Malformed(format!("image larger than {} bytes", max_bytes))
}

fn check_status(response: Response) -> Result<Response, SourceError> {
    match SourceError::from_status(response.status()) {
        Some(err) => {
            tracing::debug!("{} answered {}", response.url(), response.status());
            Err(err)
        }
        None => Ok(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    /// Serve `app` on an ephemeral loopback port, returning its base URL
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn image_server() -> Router {
        Router::new()
            .route(
                "/small.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![7u8; 16]) }),
            )
            .route(
                "/huge.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![7u8; 4096]) }),
            )
            .route("/page", get(|| async { "<html></html>" }))
            .route("/hop", get(|| async { Redirect::temporary("/small.png") }))
    }

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(2), RetryPolicy::none())
            .unwrap()
            .with_max_image_bytes(1024)
    }

    #[test]
    fn test_public_hosts() {
        assert!(is_public_url(&url("https://image.tmdb.org/t/p/w500/a.jpg")));
        assert!(is_public_url(&url("http://8.8.8.8/a.jpg")));
        assert!(is_public_url(&url("https://[2606:4700::1111]/a.jpg")));

        assert!(!is_public_url(&url("http://localhost/a.jpg")));
        assert!(!is_public_url(&url("http://api.localhost/a.jpg")));
        assert!(!is_public_url(&url("http://printer.local/a.jpg")));
        assert!(!is_public_url(&url("http://127.0.0.1:8787/cache/stats")));
        assert!(!is_public_url(&url("http://2130706433/")));
        assert!(!is_public_url(&url("http://10.1.2.3/a.jpg")));
        assert!(!is_public_url(&url("http://192.168.0.10/a.jpg")));
        assert!(!is_public_url(&url("http://169.254.169.254/latest/meta-data")));
        assert!(!is_public_url(&url("http://100.64.0.1/a.jpg")));
        assert!(!is_public_url(&url("http://0.0.0.0/a.jpg")));
        assert!(!is_public_url(&url("http://[::1]/a.jpg")));
        assert!(!is_public_url(&url("http://[fd00::1]/a.jpg")));
        assert!(!is_public_url(&url("http://[fe80::1]/a.jpg")));
        assert!(!is_public_url(&url("http://[::ffff:127.0.0.1]/a.jpg")));
        assert!(!is_public_url(&url("ftp://example.com/a.jpg")));
    }

    #[tokio::test]
    async fn test_get_image_reads_small_body() {
        let base = serve(image_server()).await;
        let payload = client()
            .get_image("test", &format!("{}/small.png", base))
            .await
            .unwrap();

        assert_eq!(payload.bytes, Some(vec![7u8; 16]));
        assert_eq!(payload.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_image_rejects_oversized_and_non_images() {
        let base = serve(image_server()).await;
        let http = client();

        assert!(matches!(
            http.get_image("test", &format!("{}/huge.png", base)).await,
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            http.get_image("test", &format!("{}/page", base)).await,
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_redirect_to_internal_host_is_not_followed() {
        let base = serve(image_server()).await;
        assert_eq!(
            client().get_image("test", &format!("{}/hop", base)).await,
            Err(SourceError::Rejected(307))
        );
    }
}
