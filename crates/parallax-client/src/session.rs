use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use url::Url;

use crate::config::{ClusterConfig, API_KEY_HEADER};
use crate::error::ConnectError;

const STATUS_PATH: &str = "/api/status";

/// Subset of the status document a healthy cluster returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterMeta {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// An authenticated session against a hosted cluster.
///
/// Creating one proves the whole path works: config was valid, the cluster
/// answered the status probe, the credentials were accepted, and the gRPC
/// channel (when configured) opened within the deadline.
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    channel: Option<Channel>,
    meta: ClusterMeta,
    cluster_url: Url,
}

impl Session {
    /// Establishes a session: validate the config, probe the status API
    /// with the auth headers attached, then open the gRPC channel if one
    /// is configured. Each leg is bounded by `config.connect_timeout`.
    pub async fn connect(config: &ClusterConfig) -> Result<Self, ConnectError> {
        config.validate()?;
        let headers = auth_headers(config)?;
        tracing::debug!(
            url = %config.cluster_url,
            auth_headers = ?config.auth_header_names(),
            "establishing cluster session"
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("parallax-client/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout)
            .build()
            .map_err(|source| ConnectError::Network { source })?;

        let meta = probe_status(&http, config).await?;

        let channel = match &config.grpc_url {
            Some(grpc_url) => Some(open_channel(grpc_url, config.connect_timeout).await?),
            None => None,
        };

        tracing::debug!(
            status = %meta.status,
            grpc = channel.is_some(),
            "cluster session established"
        );

        Ok(Self {
            http,
            channel,
            meta,
            cluster_url: config.cluster_url.clone(),
        })
    }

    /// What the cluster reported about itself during the probe.
    pub fn meta(&self) -> &ClusterMeta {
        &self.meta
    }

    pub fn cluster_url(&self) -> &Url {
        &self.cluster_url
    }

    pub fn has_grpc_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Tears the session down. Connections are returned to the runtime
    /// here; a dropped `Session` releases them too, this just makes the
    /// teardown explicit at call sites.
    pub fn close(self) {
        drop(self.channel);
        drop(self.http);
        tracing::debug!(url = %self.cluster_url, "session closed");
    }
}

fn auth_headers(config: &ClusterConfig) -> Result<HeaderMap, ConnectError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(API_KEY_HEADER),
        sensitive_value(config.api_key.expose(), API_KEY_HEADER)?,
    );
    if let Some(cred) = &config.embed_credential {
        let name = cred.provider.header_name();
        headers.insert(
            HeaderName::from_static(name),
            sensitive_value(cred.api_key.expose(), name)?,
        );
    }
    Ok(headers)
}

fn sensitive_value(raw: &str, header: &str) -> Result<HeaderValue, ConnectError> {
    // The key itself must not appear in the error.
    let mut value = HeaderValue::from_str(raw).map_err(|_| {
        ConnectError::InvalidConfig(format!(
            "value for header '{header}' contains bytes not allowed in HTTP headers"
        ))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

async fn probe_status(
    http: &reqwest::Client,
    config: &ClusterConfig,
) -> Result<ClusterMeta, ConnectError> {
    let status_url = config.cluster_url.join(STATUS_PATH).map_err(|e| {
        ConnectError::InvalidConfig(format!(
            "cannot derive status URL from '{}': {e}",
            config.cluster_url
        ))
    })?;

    let response = http
        .get(status_url)
        .send()
        .await
        .map_err(|e| ConnectError::from_http(e, config.connect_timeout))?;

    let status = response.status();
    match status {
        s if s.is_success() => {}
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(ConnectError::AuthRejected {
                status: status.as_u16(),
            })
        }
        s => return Err(ConnectError::Protocol(format!("cluster returned HTTP {s}"))),
    }

    response.json::<ClusterMeta>().await.map_err(|e| {
        if e.is_timeout() {
            ConnectError::Timeout {
                limit: config.connect_timeout,
            }
        } else if e.is_decode() {
            ConnectError::Protocol(format!("undecodable status document: {e}"))
        } else {
            ConnectError::Network { source: e }
        }
    })
}

async fn open_channel(grpc_url: &Url, limit: Duration) -> Result<Channel, ConnectError> {
    let mut endpoint = Endpoint::from_shared(grpc_url.to_string()).map_err(|e| {
        ConnectError::InvalidConfig(format!("'{grpc_url}' is not a valid gRPC endpoint: {e}"))
    })?;
    endpoint = endpoint.connect_timeout(limit);
    if grpc_url.scheme() == "https" {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new())
            .map_err(|source| ConnectError::Grpc { source })?;
    }

    // The endpoint's own connect_timeout covers TCP setup only, so keep an
    // outer deadline around the whole handshake.
    match tokio::time::timeout(limit, endpoint.connect()).await {
        Ok(Ok(channel)) => Ok(channel),
        Ok(Err(source)) => Err(ConnectError::Grpc { source }),
        Err(_) => Err(ConnectError::Timeout { limit }),
    }
}
