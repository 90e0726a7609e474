use std::time::Duration;

use url::Url;

use crate::credentials::ApiKey;
use crate::error::ConnectError;

/// Header carrying the cluster API key, as expected by the Parallax Cloud
/// status API.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Deadline applied to each probe leg unless overridden.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_CLUSTER_URL: &str = "PARALLAX_CLUSTER_URL";
pub const ENV_API_KEY: &str = "PARALLAX_API_KEY";
pub const ENV_GRPC_URL: &str = "PARALLAX_GRPC_URL";
pub const ENV_EMBED_PROVIDER: &str = "PARALLAX_EMBED_PROVIDER";
pub const ENV_EMBED_API_KEY: &str = "PARALLAX_EMBED_API_KEY";
pub const ENV_CONNECT_TIMEOUT: &str = "PARALLAX_CONNECT_TIMEOUT_SECS";

/// Embedding providers whose keys a cluster forwards for server-side
/// vectorization. Each maps to one auxiliary request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedProvider {
    OpenAI,
    Cohere,
    Voyage,
    Mistral,
}

impl EmbedProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "cohere" => Some(Self::Cohere),
            "voyage" => Some(Self::Voyage),
            "mistral" => Some(Self::Mistral),
            _ => None,
        }
    }

    pub fn header_name(self) -> &'static str {
        match self {
            Self::OpenAI => "x-openai-api-key",
            Self::Cohere => "x-cohere-api-key",
            Self::Voyage => "x-voyage-api-key",
            Self::Mistral => "x-mistral-api-key",
        }
    }
}

/// A provider key sent to the cluster alongside the primary API key.
#[derive(Debug, Clone)]
pub struct EmbedCredential {
    pub provider: EmbedProvider,
    pub api_key: ApiKey,
}

/// Everything needed to open a session against a hosted cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// HTTP endpoint of the cluster, e.g. `https://demo.parallax.cloud`.
    pub cluster_url: Url,
    pub api_key: ApiKey,
    /// Optional gRPC endpoint; when set, connecting also opens the channel.
    pub grpc_url: Option<Url>,
    /// Optional embedding-provider credential sent as an auxiliary header.
    pub embed_credential: Option<EmbedCredential>,
    /// Deadline for each probe leg.
    pub connect_timeout: Duration,
}

impl ClusterConfig {
    pub fn new(cluster_url: Url, api_key: ApiKey) -> Self {
        Self {
            cluster_url,
            api_key,
            grpc_url: None,
            embed_credential: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Reads the `PARALLAX_*` environment variables.
    ///
    /// Only variables that are present but unparseable fail here; emptiness
    /// of credentials is caught by [`ClusterConfig::validate`] so that a
    /// missing and an empty key produce the same diagnostic.
    pub fn from_env() -> Result<Self, ConnectError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ClusterConfig::from_env`], but reading through an arbitrary
    /// lookup. Callers layering CLI flags over the environment pass a
    /// closure that consults the flags first.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConnectError> {
        let raw_url = lookup(ENV_CLUSTER_URL)
            .ok_or_else(|| ConnectError::InvalidConfig(format!("{ENV_CLUSTER_URL} is not set")))?;
        let cluster_url = parse_endpoint(&raw_url)?;

        let api_key = ApiKey::new(lookup(ENV_API_KEY).unwrap_or_default());

        let grpc_url = match lookup(ENV_GRPC_URL) {
            Some(raw) => Some(parse_endpoint(&raw)?),
            None => None,
        };

        let embed_credential = match lookup(ENV_EMBED_PROVIDER) {
            Some(raw) => {
                let provider = EmbedProvider::from_str(&raw).ok_or_else(|| {
                    ConnectError::InvalidConfig(format!(
                        "unknown embedding provider '{raw}' in {ENV_EMBED_PROVIDER} \
                         (expected openai, cohere, voyage or mistral)"
                    ))
                })?;
                let api_key = ApiKey::new(lookup(ENV_EMBED_API_KEY).unwrap_or_default());
                Some(EmbedCredential { provider, api_key })
            }
            None => None,
        };

        let connect_timeout = match lookup(ENV_CONNECT_TIMEOUT) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ConnectError::InvalidConfig(format!(
                        "{ENV_CONNECT_TIMEOUT} must be a whole number of seconds, got '{raw}'"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        Ok(Self {
            cluster_url,
            api_key,
            grpc_url,
            embed_credential,
            connect_timeout,
        })
    }

    /// Checks the input constraints before any network traffic happens.
    pub fn validate(&self) -> Result<(), ConnectError> {
        check_endpoint(&self.cluster_url)?;
        if let Some(grpc) = &self.grpc_url {
            check_endpoint(grpc)?;
        }
        if self.api_key.is_empty() {
            return Err(ConnectError::InvalidConfig(format!(
                "cluster API key is empty (set {ENV_API_KEY})"
            )));
        }
        if let Some(cred) = &self.embed_credential {
            if cred.api_key.is_empty() {
                return Err(ConnectError::InvalidConfig(format!(
                    "embedding-provider key for {:?} is empty (set {ENV_EMBED_API_KEY})",
                    cred.provider
                )));
            }
        }
        if self.connect_timeout.is_zero() {
            return Err(ConnectError::InvalidConfig(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of the auth headers a connect will send. Values never appear
    /// here.
    pub fn auth_header_names(&self) -> Vec<&'static str> {
        let mut names = vec![API_KEY_HEADER];
        if let Some(cred) = &self.embed_credential {
            names.push(cred.provider.header_name());
        }
        names
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConnectError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConnectError::InvalidConfig(format!("'{raw}' is not a valid URL: {e}")))?;
    check_endpoint(&url)?;
    Ok(url)
}

fn check_endpoint(url: &Url) -> Result<(), ConnectError> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConnectError::InvalidConfig(format!(
                "unsupported scheme '{other}' in '{url}' (expected http or https)"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(ConnectError::InvalidConfig(format!("'{url}' has no host")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn loads_minimal_environment() {
        let lookup = lookup_from(&[
            (ENV_CLUSTER_URL, "https://demo.parallax.cloud"),
            (ENV_API_KEY, "key-123"),
        ]);
        let config = ClusterConfig::from_lookup(lookup).unwrap();

        assert_eq!(config.cluster_url.as_str(), "https://demo.parallax.cloud/");
        assert_eq!(config.api_key.expose(), "key-123");
        assert!(config.grpc_url.is_none());
        assert!(config.embed_credential.is_none());
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        config.validate().unwrap();
    }

    #[test]
    fn loads_full_environment() {
        let lookup = lookup_from(&[
            (ENV_CLUSTER_URL, "https://demo.parallax.cloud"),
            (ENV_API_KEY, "key-123"),
            (ENV_GRPC_URL, "https://grpc.demo.parallax.cloud"),
            (ENV_EMBED_PROVIDER, "OpenAI"),
            (ENV_EMBED_API_KEY, "sk-embed"),
            (ENV_CONNECT_TIMEOUT, "9"),
        ]);
        let config = ClusterConfig::from_lookup(lookup).unwrap();

        assert!(config.grpc_url.is_some());
        let cred = config.embed_credential.as_ref().unwrap();
        assert_eq!(cred.provider, EmbedProvider::OpenAI);
        assert_eq!(cred.api_key.expose(), "sk-embed");
        assert_eq!(config.connect_timeout, Duration::from_secs(9));
        config.validate().unwrap();
    }

    #[test]
    fn missing_cluster_url_is_rejected() {
        let err = ClusterConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
        assert!(err.to_string().contains(ENV_CLUSTER_URL));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let lookup = lookup_from(&[
            (ENV_CLUSTER_URL, "ftp://demo.parallax.cloud"),
            (ENV_API_KEY, "key-123"),
        ]);
        let err = ClusterConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let lookup = lookup_from(&[
            (ENV_CLUSTER_URL, "https://demo.parallax.cloud"),
            (ENV_API_KEY, "key-123"),
            (ENV_EMBED_PROVIDER, "acme"),
        ]);
        let err = ClusterConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn garbled_timeout_is_rejected() {
        let lookup = lookup_from(&[
            (ENV_CLUSTER_URL, "https://demo.parallax.cloud"),
            (ENV_API_KEY, "key-123"),
            (ENV_CONNECT_TIMEOUT, "soon"),
        ]);
        let err = ClusterConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains(ENV_CONNECT_TIMEOUT));
    }

    #[test]
    fn empty_api_key_fails_validation() {
        let lookup = lookup_from(&[(ENV_CLUSTER_URL, "https://demo.parallax.cloud")]);
        let config = ClusterConfig::from_lookup(lookup).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let url = Url::parse("https://demo.parallax.cloud").unwrap();
        let mut config = ClusterConfig::new(url, ApiKey::new("key-123"));
        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!(EmbedProvider::from_str("OPENAI"), Some(EmbedProvider::OpenAI));
        assert_eq!(EmbedProvider::from_str("cohere"), Some(EmbedProvider::Cohere));
        assert_eq!(EmbedProvider::from_str("Voyage"), Some(EmbedProvider::Voyage));
        assert_eq!(EmbedProvider::from_str("mistral"), Some(EmbedProvider::Mistral));
        assert_eq!(EmbedProvider::from_str("local"), None);
    }

    #[test]
    fn auth_header_names_follow_the_credential_set() {
        let url = Url::parse("https://demo.parallax.cloud").unwrap();
        let mut config = ClusterConfig::new(url, ApiKey::new("key-123"));
        assert_eq!(config.auth_header_names(), vec![API_KEY_HEADER]);

        config.embed_credential = Some(EmbedCredential {
            provider: EmbedProvider::Cohere,
            api_key: ApiKey::new("co-key"),
        });
        assert_eq!(
            config.auth_header_names(),
            vec![API_KEY_HEADER, "x-cohere-api-key"]
        );
    }
}
