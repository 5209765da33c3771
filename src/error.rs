use thiserror::Error;

/// Top-level error surfaced from `main`. Internal plumbing keeps using
/// `anyhow::Result`, matching the reference netlink layer; this type only
/// exists at the boundary so the process can pick an exit code.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("netlink error: {0}")]
    Netlink(#[from] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown route metric name: {0}")]
    UnknownMetric(String),
}

impl DaemonError {
    /// Process exit code for this failure, per the CLI surface contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Netlink(_) => 1,
            DaemonError::Config(_) | DaemonError::UnknownMetric(_) => 2,
        }
    }
}
