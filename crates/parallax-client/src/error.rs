use std::time::Duration;

use thiserror::Error;

/// Why a session could not be established.
///
/// Callers that only need pass/fail can treat any variant as failure; the
/// variants exist so diagnostics can say whether the problem was the
/// caller's configuration, the network path, the credentials, or the
/// cluster itself.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configuration was rejected before any traffic was sent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP leg failed below the application layer: DNS, TCP, TLS.
    #[error("network error")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    /// The gRPC channel could not be opened.
    #[error("grpc transport error")]
    Grpc {
        #[source]
        source: tonic::transport::Error,
    },

    /// The cluster answered but refused the presented credentials.
    #[error("authentication rejected by cluster (HTTP {status})")]
    AuthRejected { status: u16 },

    /// The deadline elapsed before the cluster answered.
    #[error("timed out after {limit:?} waiting for the cluster")]
    Timeout { limit: Duration },

    /// The cluster answered with something a healthy cluster never sends.
    #[error("unexpected response from cluster: {0}")]
    Protocol(String),
}

impl ConnectError {
    /// Folds reqwest's own timeout signal into the [`ConnectError::Timeout`]
    /// variant so both probe legs report deadlines the same way.
    pub(crate) fn from_http(err: reqwest::Error, limit: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { limit }
        } else {
            Self::Network { source: err }
        }
    }
}
