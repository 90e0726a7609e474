mod report;

use clap::Parser;
use parallax_client::config::{ENV_CLUSTER_URL, ENV_CONNECT_TIMEOUT, ENV_GRPC_URL};
use parallax_client::{ClusterConfig, ConnectError, Session};
use tracing_subscriber::EnvFilter;

use crate::report::{failure_line, success_line, FAILURE_EXIT, SUCCESS_EXIT};

/// Checks that a Parallax Cloud cluster is reachable with the credentials
/// in the environment.
///
/// Settings come from the PARALLAX_* environment variables (a .env file is
/// honored); the flags below override the matching variable. Secrets are
/// environment-only.
#[derive(Parser, Debug)]
#[command(name = "parallax-doctor", version)]
struct Args {
    /// Cluster URL, overrides PARALLAX_CLUSTER_URL.
    #[arg(long)]
    cluster_url: Option<String>,

    /// gRPC endpoint to probe as well, overrides PARALLAX_GRPC_URL.
    #[arg(long)]
    grpc_url: Option<String>,

    /// Per-leg connect deadline in seconds, overrides
    /// PARALLAX_CONNECT_TIMEOUT_SECS.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn flag_overrides(args: &Args, name: &str) -> Option<String> {
    match name {
        ENV_CLUSTER_URL => args.cluster_url.clone(),
        ENV_GRPC_URL => args.grpc_url.clone(),
        ENV_CONNECT_TIMEOUT => args.timeout_secs.map(|s| s.to_string()),
        _ => None,
    }
}

fn resolve(args: &Args) -> Result<ClusterConfig, ConnectError> {
    resolve_with(args, |name| std::env::var(name).ok())
}

fn resolve_with(
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClusterConfig, ConnectError> {
    ClusterConfig::from_lookup(|name| flag_overrides(args, name).or_else(|| env(name)))
}

async fn run(args: &Args) -> i32 {
    let config = match resolve(args) {
        Ok(config) => config,
        Err(err) => {
            println!("{}", failure_line(err));
            return FAILURE_EXIT;
        }
    };

    tracing::debug!(
        timeout = ?config.connect_timeout,
        grpc = config.grpc_url.is_some(),
        "resolved configuration"
    );
    println!(
        "Attempting to connect to Parallax Cloud at: {}",
        config.cluster_url
    );
    println!(
        "Auth headers to send: {}",
        config.auth_header_names().join(", ")
    );

    match Session::connect(&config).await {
        Ok(session) => {
            println!("{}", success_line(session.meta()));
            session.close();
            println!("✅ Connection closed");
            SUCCESS_EXIT
        }
        Err(err) => {
            println!("{}", failure_line(err));
            FAILURE_EXIT
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("parallax_doctor=info,parallax_client=info")
        }))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    std::process::exit(run(&args).await);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_client::config::ENV_API_KEY;
    use std::time::Duration;

    fn args(cluster_url: Option<&str>, timeout_secs: Option<u64>) -> Args {
        Args {
            cluster_url: cluster_url.map(str::to_string),
            grpc_url: None,
            timeout_secs,
        }
    }

    #[test]
    fn flags_map_onto_their_variables() {
        let args = args(Some("https://flagged.parallax.cloud"), Some(7));
        assert_eq!(
            flag_overrides(&args, ENV_CLUSTER_URL).as_deref(),
            Some("https://flagged.parallax.cloud")
        );
        assert_eq!(flag_overrides(&args, ENV_GRPC_URL), None);
        assert_eq!(flag_overrides(&args, ENV_CONNECT_TIMEOUT).as_deref(), Some("7"));
        assert_eq!(flag_overrides(&args, ENV_API_KEY), None);
    }

    #[test]
    fn flags_override_the_environment() {
        let args = args(Some("https://flagged.parallax.cloud"), Some(7));
        let env = |name: &str| match name {
            ENV_CLUSTER_URL => Some("https://env.parallax.cloud".to_string()),
            ENV_API_KEY => Some("env-key".to_string()),
            _ => None,
        };
        let config = resolve_with(&args, env).unwrap();
        assert_eq!(config.cluster_url.as_str(), "https://flagged.parallax.cloud/");
        assert_eq!(config.connect_timeout, Duration::from_secs(7));
        assert_eq!(config.api_key.expose(), "env-key");
    }

    #[test]
    fn environment_fills_unflagged_settings() {
        let args = args(None, None);
        let env = |name: &str| match name {
            ENV_CLUSTER_URL => Some("https://env.parallax.cloud".to_string()),
            ENV_API_KEY => Some("env-key".to_string()),
            _ => None,
        };
        let config = resolve_with(&args, env).unwrap();
        assert_eq!(config.cluster_url.as_str(), "https://env.parallax.cloud/");
        assert_eq!(config.api_key.expose(), "env-key");
    }
}
