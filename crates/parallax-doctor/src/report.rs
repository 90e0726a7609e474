use parallax_client::{ClusterMeta, ConnectError};

pub const SUCCESS_EXIT: i32 = 0;
/// Every failure maps to the same non-zero code; the printed line, not the
/// exit code, carries the failure class.
pub const FAILURE_EXIT: i32 = 1;

pub fn success_line(meta: &ClusterMeta) -> String {
    match &meta.version {
        Some(version) => format!(
            "✅ Successfully connected to Parallax Cloud (status: {}, server {version})",
            meta.status
        ),
        None => format!(
            "✅ Successfully connected to Parallax Cloud (status: {})",
            meta.status
        ),
    }
}

/// Renders the full error chain so DNS and TCP details from the transport
/// stack reach the operator.
pub fn failure_line(err: ConnectError) -> String {
    format!(
        "❌ Failed to connect to Parallax Cloud: {:#}",
        anyhow::Error::new(err)
    )
}
