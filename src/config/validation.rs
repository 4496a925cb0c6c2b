//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and value ranges are usable
//! - Check that TLS file paths come in pairs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Longest lifetime accepted for a generated certificate (10 years).
pub const MAX_EPHEMERAL_VALIDITY_HOURS: u64 = 10 * 365 * 24;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("quic.alpn must not be empty")]
    EmptyAlpn,

    #[error("tls.cert_path and tls.key_path must be set together")]
    IncompleteTlsPair,

    #[error("tls.subject_alt_names must not be empty")]
    NoSubjectAltNames,

    #[error("client.server_name must not be empty")]
    EmptyServerName,

    #[error("client.ca_cert_path is required unless client.insecure_skip_verify is set")]
    MissingCaCert,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let addresses = [
        ("server.quic_bind_address", &config.server.quic_bind_address),
        ("server.tcp_bind_address", &config.server.tcp_bind_address),
        ("client.quic_address", &config.client.quic_address),
        ("client.tcp_address", &config.client.tcp_address),
    ];
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    if config.quic.alpn.is_empty() {
        errors.push(ValidationError::EmptyAlpn);
    }
    if config.quic.idle_timeout_secs == 0 {
        errors.push(ValidationError::Zero("quic.idle_timeout_secs"));
    }
    if config.quic.stream_accept_timeout_secs == Some(0) {
        errors.push(ValidationError::Zero("quic.stream_accept_timeout_secs"));
    }
    if config.quic.keep_alive_secs == Some(0) {
        errors.push(ValidationError::Zero("quic.keep_alive_secs"));
    }

    if config.tls.cert_path.is_some() != config.tls.key_path.is_some() {
        errors.push(ValidationError::IncompleteTlsPair);
    }
    if config.tls.cert_path.is_none() {
        if config.tls.subject_alt_names.is_empty() {
            errors.push(ValidationError::NoSubjectAltNames);
        }
        if config.tls.ephemeral_validity_hours == 0 {
            errors.push(ValidationError::Zero("tls.ephemeral_validity_hours"));
        }
        if config.tls.ephemeral_validity_hours > MAX_EPHEMERAL_VALIDITY_HOURS {
            errors.push(ValidationError::TooLarge {
                field: "tls.ephemeral_validity_hours",
                max: MAX_EPHEMERAL_VALIDITY_HOURS,
            });
        }
    }

    if config.client.server_name.is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }
    if !config.client.insecure_skip_verify && config.client.ca_cert_path.is_none() {
        errors.push(ValidationError::MissingCaCert);
    }

    if config.server.max_message_bytes == 0 {
        errors.push(ValidationError::Zero("server.max_message_bytes"));
    }
    if config.bench.payload_size == 0 {
        errors.push(ValidationError::Zero("bench.payload_size"));
    }
    if config.bench.iterations == 0 {
        errors.push(ValidationError::Zero("bench.iterations"));
    }
    if config.bench.calls_per_iteration == 0 {
        errors.push(ValidationError::Zero("bench.calls_per_iteration"));
    }
    if config.bench.timeout_secs == 0 {
        errors.push(ValidationError::Zero("bench.timeout_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = AppConfig::default();
        config.server.quic_bind_address = "not-an-address".into();
        config.quic.alpn.clear();
        config.tls.cert_path = Some("cert.pem".into());
        config.bench.iterations = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::EmptyAlpn));
        assert!(errors.contains(&ValidationError::IncompleteTlsPair));
        assert!(errors.contains(&ValidationError::Zero("bench.iterations")));
    }

    #[test]
    fn certificate_lifetime_is_bounded() {
        let mut config = AppConfig::default();
        config.tls.ephemeral_validity_hours = 1_000_000_000_000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::TooLarge {
                field: "tls.ephemeral_validity_hours",
                max: MAX_EPHEMERAL_VALIDITY_HOURS,
            }]
        );

        config.tls.ephemeral_validity_hours = MAX_EPHEMERAL_VALIDITY_HOURS;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn pem_pair_skips_ephemeral_checks() {
        let mut config = AppConfig::default();
        config.tls.cert_path = Some("cert.pem".into());
        config.tls.key_path = Some("key.pem".into());
        config.tls.subject_alt_names.clear();

        assert_eq!(validate_config(&config), Ok(()));
    }
}
