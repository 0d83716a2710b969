//! Command line flags common to every binary.

use clap::Args;
use log::warn;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{flag} is set but {} is not readable: {source}", .path.display())]
    Unreadable {
        flag: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("--tls-cert and --tls-key must be given together")]
    IncompleteTls,

    #[error("--network-tick-divider must be at least 1")]
    ZeroDivider,
}

/// Flattened into each binary's argument struct.
#[derive(Args, Debug, Clone, Default)]
pub struct NetFlags {
    /// Allow running without TLS material (local testing only)
    #[arg(long)]
    pub test: bool,

    /// Certificate used by the TLS terminator in front of this process
    #[arg(long, value_name = "PATH")]
    pub tls_cert: Option<PathBuf>,

    /// Private key used by the TLS terminator in front of this process
    #[arg(long, value_name = "PATH")]
    pub tls_key: Option<PathBuf>,
}

fn check_readable(flag: &'static str, path: &Path) -> Result<(), ConfigError> {
    std::fs::File::open(path)
        .map(|_| ())
        .map_err(|source| ConfigError::Unreadable {
            flag,
            path: path.to_path_buf(),
            source,
        })
}

impl NetFlags {
    /// Checks that configured TLS files exist and can be read.
    ///
    /// The files are only consumed by whatever terminates TLS in front of
    /// this process; they are never parsed here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => {
                check_readable("--tls-cert", cert)?;
                check_readable("--tls-key", key)?;
            }
            (None, None) => {
                if !self.test {
                    warn!("No TLS material configured; pass --test to silence this for local runs");
                }
            }
            _ => return Err(ConfigError::IncompleteTls),
        }
        Ok(())
    }
}

/// Rejects a zero broadcast divider.
pub fn check_divider(divider: u16) -> Result<u16, ConfigError> {
    if divider == 0 {
        Err(ConfigError::ZeroDivider)
    } else {
        Ok(divider)
    }
}
