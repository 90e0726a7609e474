pub mod config;
pub mod credentials;
pub mod error;
pub mod session;

pub use config::{ClusterConfig, EmbedCredential, EmbedProvider, API_KEY_HEADER};
pub use credentials::ApiKey;
pub use error::ConnectError;
pub use session::{ClusterMeta, Session};
