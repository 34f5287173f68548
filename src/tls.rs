//! Client-side TLS configuration and trust anchors.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::client::Flags;
use crate::error::HttpError;

/// PEM bundle consulted by `Flags::USE_EXTERNAL_CERT_FILE` when the client
/// was not configured with an explicit path.
pub const DEFAULT_CA_FILE: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Build the client config for one request.
///
/// With `VERIFY_HOST_CERT` the trust chain comes from the compiled-in webpki
/// roots, or from a PEM bundle on disk when `USE_EXTERNAL_CERT_FILE` is also
/// set. Without it, certificate verification is disabled entirely.
pub(crate) fn client_config(
    flags: Flags,
    ca_file: Option<&Path>,
) -> Result<Arc<ClientConfig>, HttpError> {
    if flags.contains(Flags::VERIFY_HOST_CERT) {
        let mut roots = RootCertStore::empty();
        if flags.contains(Flags::USE_EXTERNAL_CERT_FILE) {
            let path = ca_file.unwrap_or_else(|| Path::new(DEFAULT_CA_FILE));
            load_ca_bundle(&mut roots, path)?;
        } else {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Arc::new(config))
    } else {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification { provider }))
            .with_no_client_auth();
        Ok(Arc::new(config))
    }
}

fn load_ca_bundle(roots: &mut RootCertStore, path: &Path) -> Result<(), HttpError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| HttpError::CaCert(format!("{}: {e}", path.display())))?;

    let mut added = 0usize;
    for cert in certs {
        let cert = cert.map_err(|e| HttpError::CaCert(format!("{}: {e}", path.display())))?;
        roots
            .add(cert)
            .map_err(|e| HttpError::CaCert(e.to_string()))?;
        added += 1;
    }
    if added == 0 {
        return Err(HttpError::CaCert(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(())
}

/// Accepts any server certificate. Signatures over the handshake are still
/// checked against the presented key.
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerification {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
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
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webpki_roots_config_builds() {
        let config = client_config(Flags::VERIFY_HOST_CERT, None).unwrap();
        assert!(Arc::strong_count(&config) >= 1);
    }

    #[test]
    fn verify_none_config_builds() {
        assert!(client_config(Flags::NONE, None).is_ok());
    }

    #[test]
    fn missing_bundle_file_is_an_error() {
        let err = client_config(
            Flags::VERIFY_HOST_CERT | Flags::USE_EXTERNAL_CERT_FILE,
            Some(Path::new("/nonexistent/bundle.pem")),
        )
        .unwrap_err();
        assert!(matches!(err, HttpError::CaCert(_)));
    }
}
