pub mod cookie;
pub mod objects;

use std::collections::HashMap;
use std::{fs, io};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use reqwest::{Certificate, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::time::current_timestamp;
use crate::types::credential::{CredentialBundle, CredentialQuery};
use crate::types::healthz::HealthzResponse;
use crate::types::response::ResourceResponse;

/// Cached credentials are refetched once they get this close to expiry.
pub const REFRESH_MARGIN_SECS: u64 = 10 * 60;

/// Fetches credentials from a broker and keeps them until they are about to
/// expire.
pub struct CredentialClient {
    url: String,
    client: reqwest::Client,
    cookie: String,
    duration_secs: Option<u64>,

    cache: CredentialCache,
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(#[from] anyhow::Error),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Server error: code {code}, {message}")]
    Server {
        code: u16,
        kind: Option<String>,
        message: String,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(&'static str),

    #[error("Server returned invalid json: {0:?}")]
    InvalidJson(String),
}

impl CredentialClient {
    pub fn new(url: &str, cert_path: &str, cookie: String) -> Result<Self> {
        let url = url.trim_end_matches('/');
        let parsed = match Url::parse(url) {
            Ok(url) => url,
            Err(_) => bail!("invalid server url '{url}'"),
        };
        match parsed.scheme() {
            "http" | "https" => {}
            _ => bail!(
                "invalid url scheme, expect 'http' or 'https', not '{}'",
                parsed.scheme()
            ),
        }

        if parsed.path() != "/" {
            bail!(
                "invalid server url, path should be '/', not '{}'",
                parsed.path()
            );
        }

        let client = if cert_path.is_empty() || parsed.scheme() == "http" {
            reqwest::Client::new()
        } else {
            match fs::read(cert_path) {
                Ok(data) => {
                    let cert = Certificate::from_pem(&data).context("load cert file")?;
                    reqwest::Client::builder()
                        .add_root_certificate(cert)
                        .build()
                        .context("build broker client")?
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => reqwest::Client::new(),
                Err(err) => return Err(err).context("read cert file"),
            }
        };

        Ok(Self {
            url: url.to_string(),
            client,
            cookie,
            duration_secs: None,
            cache: CredentialCache::new(),
        })
    }

    /// Lifetime to ask for; the broker clamps it to its own bounds.
    pub fn set_duration_secs(&mut self, duration_secs: u64) {
        self.duration_secs = Some(duration_secs);
    }

    pub async fn healthz(&self) -> Result<HealthzResponse, RequestError> {
        self.do_request_data(Method::GET, "healthz", None::<&()>).await
    }

    /// Credentials for `service`, narrowed to `resource` when given. Served
    /// from the cache while they stay valid for more than
    /// [`REFRESH_MARGIN_SECS`].
    pub async fn credentials(
        &self,
        service: &str,
        resource: Option<&str>,
    ) -> Result<CredentialBundle, RequestError> {
        let key = CacheKey::new(service, resource);
        if let Some(bundle) = self.cache.get(&key, current_timestamp()).await {
            debug!("Use cached credentials for {key}");
            return Ok(bundle);
        }

        let query = CredentialQuery {
            service: service.to_string(),
            resource: resource.map(String::from),
            prefix: None,
            duration: self.duration_secs,
        };
        let bundle: CredentialBundle = self
            .do_request_data(Method::GET, "credentials", Some(&query))
            .await?;
        info!(
            "Fetched credentials for {key}, expire at {}",
            bundle.expiration.to_rfc3339()
        );

        self.cache.put(key, bundle.clone()).await;
        Ok(bundle)
    }

    /// Forces the next call of [`Self::credentials`] to hit the broker.
    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }

    async fn do_request_data<T, Q>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
    ) -> Result<T, RequestError>
    where
        T: Serialize + DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.url, path);
        let mut req = self
            .client
            .request(method, &url)
            .header("Accept", "application/json")
            .header("Cookie", &self.cookie);
        if let Some(query) = query {
            req = req.query(query);
        }

        let req = match req.build() {
            Ok(req) => req,
            Err(e) => return Err(RequestError::Client(format!("build request failed: {e:#}"))),
        };

        let resp = match self.client.execute(req).await {
            Ok(resp) => resp,
            Err(e) => return Err(RequestError::Network(e.into())),
        };
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return Err(RequestError::Network(e.into())),
        };

        let resp: ResourceResponse<T> = match serde_json::from_str(&text) {
            Ok(resp) => resp,
            Err(_) => return Err(RequestError::InvalidJson(text)),
        };
        if resp.code != StatusCode::OK {
            return Err(RequestError::Server {
                code: resp.code,
                kind: resp.kind,
                message: resp.message.unwrap_or_default(),
            });
        }
        match resp.data {
            Some(data) => Ok(data),
            None => Err(RequestError::Unexpected(
                "server didn't return data in json",
            )),
        }
    }
}

impl RequestError {
    /// The broker's rejection tag, if the broker rejected the request.
    pub fn kind(&self) -> Option<&str> {
        match self {
            RequestError::Server { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    service: String,
    resource: Option<String>,
}

impl CacheKey {
    fn new(service: &str, resource: Option<&str>) -> Self {
        Self {
            service: service.to_string(),
            resource: resource.map(String::from),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resource {
            Some(ref resource) => write!(f, "{}/{resource}", self.service),
            None => write!(f, "{}", self.service),
        }
    }
}

struct CredentialCache {
    entries: Mutex<HashMap<CacheKey, CredentialBundle>>,
}

impl CredentialCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &CacheKey, now: u64) -> Option<CredentialBundle> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(bundle) if bundle.expires_in(now) > REFRESH_MARGIN_SECS => Some(bundle.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: CacheKey, bundle: CredentialBundle) {
        self.entries.lock().await.insert(key, bundle);
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
