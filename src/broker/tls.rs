//! TLS client configuration for the broker session

use crate::types::TlsMode;
use rumqttc::tokio_rustls::rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use rumqttc::TlsConfiguration;
use std::sync::Arc;

/// Accepts any server certificate; used when verification is switched off
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// rustls configuration that skips certificate verification
fn insecure_client_config() -> ClientConfig {
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth()
}

/// TLS configuration for a mode, or `None` when TLS is off
///
/// `Verified` uses the platform root certificates.
pub fn tls_configuration(mode: TlsMode) -> Option<TlsConfiguration> {
    match mode {
        TlsMode::Off => None,
        TlsMode::Insecure => Some(TlsConfiguration::Rustls(Arc::new(insecure_client_config()))),
        TlsMode::Verified => Some(TlsConfiguration::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_has_no_tls() {
        assert!(tls_configuration(TlsMode::Off).is_none());
    }

    #[test]
    fn test_insecure_builds_rustls_config() {
        assert!(matches!(
            tls_configuration(TlsMode::Insecure),
            Some(TlsConfiguration::Rustls(_))
        ));
    }

    #[test]
    fn test_verifier_accepts_anything() {
        let verifier = AcceptAnyServerCert;
        let cert = CertificateDer::from(vec![0u8; 4]);
        let name = ServerName::try_from("broker.local").unwrap();

        assert!(verifier
            .verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
            .is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
