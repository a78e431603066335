//! Retrieval of the directory server's TLS certificate, logged before
//! connecting so operators can check what the server presents.
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

use crate::error::Error;

/// Connect to `host:port`, complete a TLS handshake without verifying the
/// peer, and return the leaf certificate the server presented in PEM form.
///
/// Connecting and the handshake together are bounded by `timeout`.
pub async fn fetch_server_certificate(
	host: &str,
	port: u16,
	timeout: Duration,
) -> Result<String, Error> {
	let connector = native_tls::TlsConnector::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.map_err(|err| Error::Certificate(err.to_string()))?;
	let connector = TlsConnector::from(connector);

	let handshake = async {
		let stream = TcpStream::connect((host, port)).await?;
		connector.connect(host, stream).await.map_err(|err| Error::Certificate(err.to_string()))
	};
	let tls = tokio::time::timeout(timeout, handshake).await.map_err(|_| {
		Error::Certificate(format!("no handshake with {host}:{port} within {timeout:?}"))
	})??;

	let certificate = tls
		.get_ref()
		.peer_certificate()
		.map_err(|err| Error::Certificate(err.to_string()))?
		.ok_or_else(|| Error::Certificate("the server did not present a certificate".to_owned()))?;
	let der = certificate.to_der().map_err(|err| Error::Certificate(err.to_string()))?;
	Ok(pem::encode(&pem::Pem::new("CERTIFICATE", der)))
}
