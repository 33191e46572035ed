// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy shared by descriptors, the compose aggregator and the
//! virtualization drivers.
//!
//! Only two paths retry internally (compose `up` and VM address polling);
//! every other failure propagates straight to the caller with context.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::config_handler::ConfigError;
use crate::domain::shell::ShellError;

#[derive(Debug, Error)]
pub enum StackError {
    /// Structured configuration section is absent. Descriptors usually
    /// tolerate this by producing no fragment.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid address '{0}': expected 'localhost' or an IPv4 address")]
    InvalidAddress(String),

    #[error("{0}")]
    NotFound(String),

    /// A configuration persist call failed; the collaborator error is kept verbatim.
    #[error("Failed to persist '{key}'")]
    ExternalWrite {
        key: String,
        #[source]
        source: ConfigError,
    },

    #[error("{context}")]
    ExternalCommand {
        context: String,
        #[source]
        source: ShellError,
    },

    #[error("Failed to {stage} {}", path.display())]
    Filesystem {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StackError {
    pub fn write(key: impl Into<String>, source: ConfigError) -> Self {
        Self::ExternalWrite { key: key.into(), source }
    }

    pub fn command(context: impl Into<String>, source: ShellError) -> Self {
        Self::ExternalCommand { context: context.into(), source }
    }

    pub fn filesystem(stage: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem { stage, path: path.into(), source }
    }

    /// Returns true for the validation class (bad names, addresses, port specs).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidAddress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_error_names_stage_and_path() {
        let err = StackError::filesystem(
            "create directory",
            "/tmp/state",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to create directory /tmp/state");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_address_is_validation_class() {
        assert!(StackError::InvalidAddress("nope".into()).is_validation());
        assert!(!StackError::NotFound("x".into()).is_validation());
    }
}
