//! TLS context construction (§10.5). Out of scope for the session core
//! itself (§1), but needed for a runnable listener: builds a
//! [`rustls::ServerConfig`] from a certificate chain and private key.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

pub fn load_server_config(
	cert_path: impl AsRef<Path>,
	key_path: impl AsRef<Path>,
	alpn_protocols: Vec<Vec<u8>>,
) -> crate::Result<Arc<ServerConfig>> {
	let certs = load_certs(cert_path.as_ref())?;
	let key = load_key(key_path.as_ref())?;

	let mut config = ServerConfig::builder()
		.with_no_client_auth()
		.with_single_cert(certs, key)
		.map_err(|e| eyre::eyre!("invalid TLS certificate/key pair: {e}"))?;
	config.alpn_protocols = alpn_protocols;

	Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> crate::Result<Vec<CertificateDer<'static>>> {
	let bytes = std::fs::read(path).map_err(|e| eyre::eyre!("reading certificate {}: {e}", path.display()))?;
	rustls_pemfile::certs(&mut bytes.as_slice())
		.collect::<Result<Vec<_>, _>>()
		.map_err(|e| eyre::eyre!("parsing certificate {}: {e}", path.display()))
}

fn load_key(path: &Path) -> crate::Result<PrivateKeyDer<'static>> {
	let bytes = std::fs::read(path).map_err(|e| eyre::eyre!("reading private key {}: {e}", path.display()))?;
	rustls_pemfile::private_key(&mut bytes.as_slice())
		.map_err(|e| eyre::eyre!("parsing private key {}: {e}", path.display()))?
		.ok_or_else(|| eyre::eyre!("no private key found in {}", path.display()))
}
