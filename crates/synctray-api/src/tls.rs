// ── Self-signed certificate pinning ──
//
// A local daemon serves its GUI/REST API with a self-signed certificate.
// Instead of disabling verification we pin that one certificate and
// tolerate a fixed set of validation failures for it. Any other
// certificate, or any other failure, is rejected as usual.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::debug;

use crate::error::Error;

/// Validation failures that may be tolerated for a pinned certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TlsErrorKind {
    UnableToGetLocalIssuerCertificate,
    UnableToVerifyFirstCertificate,
    SelfSignedCertificate,
    HostNameMismatch,
}

impl TlsErrorKind {
    /// The four kinds a self-signed daemon certificate produces.
    pub const SELF_SIGNED: [Self; 4] = [
        Self::UnableToGetLocalIssuerCertificate,
        Self::UnableToVerifyFirstCertificate,
        Self::SelfSignedCertificate,
        Self::HostNameMismatch,
    ];

    /// Map a rustls verification error onto the kinds it can stand for.
    fn from_rustls(err: &rustls::Error) -> &'static [Self] {
        match err {
            rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer) => &[
                Self::UnableToGetLocalIssuerCertificate,
                Self::UnableToVerifyFirstCertificate,
                Self::SelfSignedCertificate,
            ],
            rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            ) => &[Self::HostNameMismatch],
            _ => &[],
        }
    }
}

/// One certificate plus the validation failures accepted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedCertificate {
    certificate: CertificateDer<'static>,
    tolerated: Vec<TlsErrorKind>,
}

impl PinnedCertificate {
    pub fn new(certificate: CertificateDer<'static>, tolerated: Vec<TlsErrorKind>) -> Self {
        Self {
            certificate,
            tolerated,
        }
    }

    /// Pin a self-signed certificate, tolerating exactly
    /// [`TlsErrorKind::SELF_SIGNED`].
    pub fn self_signed(certificate: CertificateDer<'static>) -> Self {
        Self::new(certificate, TlsErrorKind::SELF_SIGNED.to_vec())
    }

    /// Load the first certificate of a PEM file.
    pub fn load_pem(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::Tls(format!("unable to open {}: {e}", path.display())))?;
        let mut reader = BufReader::new(file);
        let certificate = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| Error::Tls(format!("no certificate found in {}", path.display())))?
            .map_err(|e| Error::Tls(format!("unable to parse {}: {e}", path.display())))?;
        Ok(Self::self_signed(certificate))
    }

    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificate
    }

    pub fn tolerated(&self) -> &[TlsErrorKind] {
        &self.tolerated
    }

    /// Build a rustls client config that trusts the pinned certificate.
    pub fn client_config(&self) -> Result<rustls::ClientConfig, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        let (added, _) = roots.add_parsable_certificates([self.certificate.clone()]);
        if added == 0 {
            return Err(Error::Tls("pinned certificate is not usable as a trust anchor".into()));
        }

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()
            .map_err(|e| Error::Tls(format!("failed to build verifier: {e}")))?;

        let verifier = PinnedVerifier {
            pinned: self.clone(),
            inner,
            provider: Arc::clone(&provider),
        };

        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(config)
    }
}

/// Delegates to webpki and overrides tolerated failures for the pinned
/// end-entity certificate only.
#[derive(Debug)]
struct PinnedVerifier {
    pinned: PinnedCertificate,
    inner: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl PinnedVerifier {
    fn tolerates(&self, end_entity: &CertificateDer<'_>, err: &rustls::Error) -> bool {
        if end_entity.as_ref() != self.pinned.certificate.as_ref() {
            return false;
        }
        let kinds = TlsErrorKind::from_rustls(err);
        !kinds.is_empty() && kinds.iter().any(|k| self.pinned.tolerated.contains(k))
    }
}

impl ServerCertVerifier for PinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Ok(verified) => Ok(verified),
            Err(err) if self.tolerates(end_entity, &err) => {
                debug!(error = %err, "accepting pinned self-signed certificate");
                Ok(ServerCertVerified::assertion())
            }
            Err(err) => Err(err),
        }
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
