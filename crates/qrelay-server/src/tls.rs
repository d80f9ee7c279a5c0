//! Ephemeral server TLS identity.
//!
//! The relay never authenticates itself to clients: TLS here exists purely
//! to encrypt the QUIC connection. There is no certificate to load from
//! disk, so a fresh self-signed certificate is generated once at startup.
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

pub const ALPN: &[u8] = b"qrtc/1";

pub struct EphemeralIdentity {
	pub certificate: Vec<CertificateDer<'static>>,
	pub private_key: PrivateKeyDer<'static>,
}

pub fn generate_self_signed(subject_alt_names: Vec<String>) -> eyre::Result<EphemeralIdentity> {
	let cert = rcgen::generate_simple_self_signed(subject_alt_names)?;
	let certificate = vec![CertificateDer::from(cert.cert)];
	let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()));

	Ok(EphemeralIdentity { certificate, private_key })
}
