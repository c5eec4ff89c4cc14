// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS setup shared by the REST and WebSocket transports.

use std::net::IpAddr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::ClientConfig;
use crate::error::{Result, XoError};

/// Accepts any certificate presented for one host; every other name goes
/// through normal WebPKI verification.
#[derive(Debug)]
struct HostScopedVerifier {
    host: String,
    inner: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl HostScopedVerifier {
    fn is_trusted_host(&self, server_name: &ServerName<'_>) -> bool {
        match server_name {
            ServerName::DnsName(name) => name.as_ref().eq_ignore_ascii_case(&self.host),
            ServerName::IpAddress(ip) => {
                let host = self.host.trim_start_matches('[').trim_end_matches(']');
                host.parse::<IpAddr>()
                    .is_ok_and(|h| h == IpAddr::from(*ip))
            }
            _ => false,
        }
    }
}

impl ServerCertVerifier for HostScopedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if self.is_trusted_host(server_name) {
            return Ok(ServerCertVerified::assertion());
        }
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
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

/// Build the rustls client configuration for `config`.
///
/// Strict mode trusts the WebPKI roots. Insecure mode trusts anything the
/// configured host presents and nothing else beyond the roots.
#[allow(clippy::result_large_err)]
pub(crate) fn client_tls_config(config: &ClientConfig) -> Result<rustls::ClientConfig> {
    // Install ring as default crypto provider for anything else in the process
    let _ = rustls::crypto::ring::default_provider().install_default();
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let roots = Arc::new(roots);

    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| XoError::Config(format!("TLS setup failed: {e}")))?;

    let mut tls = if config.insecure() {
        let inner = WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(&provider))
            .build()
            .map_err(|e| XoError::Config(format!("TLS setup failed: {e}")))?;
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(HostScopedVerifier {
                host: config.host().to_string(),
                inner,
                provider,
            }))
            .with_no_client_auth()
    } else {
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    // WebSocket upgrades need HTTP/1.1
    tls.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(tls)
}

/// HTTP client for the REST transport, sharing `tls` with the WebSocket.
#[allow(clippy::result_large_err)]
pub(crate) fn http_client(tls: rustls::ClientConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_preconfigured_tls(tls)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .map_err(|e| XoError::Config(format!("HTTP client setup failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(host: &str) -> HostScopedVerifier {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .unwrap();
        HostScopedVerifier {
            host: host.to_string(),
            inner,
            provider,
        }
    }

    #[test]
    fn test_trust_is_scoped_to_configured_host() {
        let v = verifier("xo.lab.local");
        let same = ServerName::try_from("XO.lab.local").unwrap();
        let other = ServerName::try_from("evil.example.com").unwrap();
        assert!(v.is_trusted_host(&same));
        assert!(!v.is_trusted_host(&other));
    }

    #[test]
    fn test_ip_hosts() {
        let v = verifier("10.0.0.5");
        assert!(v.is_trusted_host(&ServerName::try_from("10.0.0.5").unwrap()));
        assert!(!v.is_trusted_host(&ServerName::try_from("10.0.0.6").unwrap()));

        let v6 = verifier("[::1]");
        assert!(v6.is_trusted_host(&ServerName::try_from("::1").unwrap()));
    }

    #[test]
    fn test_untrusted_host_is_verified() {
        let v = verifier("xo.lab.local");
        let cert = CertificateDer::from(vec![0u8; 16]);
        let name = ServerName::try_from("other.example.com").unwrap();
        let result = v.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(result.is_err());
    }

    #[test]
    fn test_builds_both_modes() {
        let strict = ClientConfig::builder("https://xo.local")
            .token("t")
            .build()
            .unwrap();
        let tls = client_tls_config(&strict).unwrap();
        assert_eq!(tls.alpn_protocols, vec![b"http/1.1".to_vec()]);

        let insecure = ClientConfig::builder("https://xo.local")
            .token("t")
            .insecure(true)
            .build()
            .unwrap();
        assert!(client_tls_config(&insecure).is_ok());
    }
}
