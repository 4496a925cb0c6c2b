//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Load a PEM certificate chain and key, or mint an ephemeral self-signed
//!   certificate when none is configured
//! - Build TLS 1.3 server and client configs for QUIC endpoints
//! - Provide the opt-in "skip verification" verifier for development setups

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair,
    KeyUsagePurpose,
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("Certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("No certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("Certificate validity {0:?} is out of range")]
    ValidityOutOfRange(Duration),

    #[error("TLS config lacks a QUIC initial cipher suite: {0}")]
    NoInitialCipherSuite(#[from] quinn::crypto::rustls::NoInitialCipherSuite),
}

/// A certificate chain and its private key.
#[derive(Debug)]
pub struct CertificateMaterial {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl CertificateMaterial {
    /// Self-signed ECDSA P-256 certificate for `subject_alt_names`, valid from
    /// now for `validity`.
    pub fn ephemeral(subject_alt_names: &[String], validity: Duration) -> Result<Self, TlsError> {
        let key_pair = KeyPair::generate()?;

        let mut params = CertificateParams::new(subject_alt_names.to_vec())?;
        let mut name = DistinguishedName::new();
        name.push(DnType::OrganizationName, "rpc-over-quic");
        params.distinguished_name = name;

        let now = OffsetDateTime::now_utc();
        let not_after = time::Duration::try_from(validity)
            .ok()
            .and_then(|validity| now.checked_add(validity))
            .ok_or(TlsError::ValidityOutOfRange(validity))?;
        params.not_before = now;
        params.not_after = not_after;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let cert = params.self_signed(&key_pair)?;
        Ok(Self {
            cert_chain: vec![cert.der().clone()],
            key: PrivatePkcs8KeyDer::from(key_pair.serialize_der()).into(),
        })
    }

    /// Load a PEM certificate chain and private key.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        if !key_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Private key file not found: {:?}", key_path),
            )
            .into());
        }

        let cert_chain = load_certs(cert_path)?;
        let mut reader = BufReader::new(File::open(key_path)?);
        let key = rustls_pemfile::private_key(&mut reader)?
            .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

        Ok(Self { cert_chain, key })
    }

    /// PEM files when both paths are configured, otherwise an ephemeral
    /// certificate.
    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => {
                tracing::info!(cert_path = %cert, "Loading TLS certificate");
                Self::from_pem_files(Path::new(cert), Path::new(key))
            }
            _ => {
                tracing::info!(
                    subject_alt_names = ?config.subject_alt_names,
                    validity_hours = config.ephemeral_validity_hours,
                    "Generating ephemeral self-signed certificate"
                );
                let validity = config
                    .ephemeral_validity_hours
                    .checked_mul(3600)
                    .map(Duration::from_secs)
                    .ok_or(TlsError::ValidityOutOfRange(Duration::MAX))?;
                Self::ephemeral(&config.subject_alt_names, validity)
            }
        }
    }
}

/// Load every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", path),
        )
        .into());
    }

    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// How a client authenticates the server.
#[derive(Debug, Clone)]
pub enum ServerVerification {
    /// Accept any certificate. Development only.
    Insecure,
    /// Verify against these trust anchors.
    TrustedRoots(Vec<CertificateDer<'static>>),
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// TLS 1.3 server config advertising `alpn`.
pub fn server_crypto(
    material: CertificateMaterial,
    alpn: &str,
) -> Result<rustls::ServerConfig, TlsError> {
    let mut config = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(material.cert_chain, material.key)?;
    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];
    Ok(config)
}

/// TLS 1.3 client config requesting `alpn`.
pub fn client_crypto(
    alpn: &str,
    verification: ServerVerification,
) -> Result<rustls::ClientConfig, TlsError> {
    let provider = provider();
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])?;

    let mut config = match verification {
        ServerVerification::Insecure => {
            tracing::warn!("Server certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
                .with_no_client_auth()
        }
        ServerVerification::TrustedRoots(certs) => {
            let mut roots = RootCertStore::empty();
            for cert in certs {
                roots.add(cert)?;
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];
    Ok(config)
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ephemeral_certificate_builds_server_config() {
        let material =
            CertificateMaterial::ephemeral(&["127.0.0.1".to_string()], Duration::from_secs(3600))
                .unwrap();
        assert_eq!(material.cert_chain.len(), 1);

        let config = server_crypto(material, "h3").unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h3".to_vec()]);
    }

    #[test]
    fn client_trusts_generated_certificate() {
        let material =
            CertificateMaterial::ephemeral(&["localhost".to_string()], Duration::from_secs(60))
                .unwrap();
        let roots = ServerVerification::TrustedRoots(material.cert_chain.clone());
        let config = client_crypto("h3", roots).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h3".to_vec()]);
    }

    #[test]
    fn missing_files_are_not_found() {
        let err = load_certs(Path::new("/nonexistent/cert.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();

        let err = load_certs(file.path()).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }

    #[test]
    fn huge_validity_is_an_error() {
        let err = CertificateMaterial::ephemeral(&["127.0.0.1".to_string()], Duration::MAX)
            .unwrap_err();
        assert!(matches!(err, TlsError::ValidityOutOfRange(_)));

        let config = TlsConfig {
            ephemeral_validity_hours: u64::MAX,
            ..TlsConfig::default()
        };
        assert!(matches!(
            CertificateMaterial::from_config(&config),
            Err(TlsError::ValidityOutOfRange(_))
        ));
    }

    #[test]
    fn config_without_paths_generates_certificate() {
        let material = CertificateMaterial::from_config(&TlsConfig::default()).unwrap();
        assert!(!material.cert_chain.is_empty());
    }
}
