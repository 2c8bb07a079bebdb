//! Plugin entrypoint
//!
//! Terraform launches the provider binary with a magic cookie in the
//! environment and reads a single handshake line from stdout naming the
//! address and protocol. Everything else the process prints must go to
//! stderr.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderService;
use crate::proto::ProviderServiceServer;
use crate::provider::Provider;
use base64::Engine;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
pub const CORE_PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_VERSION: u32 = 6;
/// Set by Terraform when it wants the connection over mTLS
pub const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Maximum gRPC message size in bytes
    pub max_message_size: usize,
    /// PEM certificate Terraform presented, None serves plaintext
    pub client_cert: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            max_message_size: 256 << 20, // 256MB
            client_cert: None,
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Self {
        Self {
            client_cert: std::env::var(CLIENT_CERT_ENV)
                .ok()
                .filter(|cert| !cert.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Fail unless the process was started by Terraform
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

/// `CORE|APP|NETWORK|ADDR|PROTOCOL[|CERT]` with the certificate as
/// unpadded base64 DER
pub fn handshake_line(addr: SocketAddr, server_cert_der: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    );
    if let Some(der) = server_cert_der {
        line.push('|');
        line.push_str(&base64::engine::general_purpose::STANDARD_NO_PAD.encode(der));
    }
    line
}

struct ServerCertificate {
    der: Vec<u8>,
    identity: Identity,
}

fn generate_server_certificate() -> Result<ServerCertificate> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| TfplugError::TlsError(format!("failed to generate certificate: {}", e)))?;
    let der = cert
        .serialize_der()
        .map_err(|e| TfplugError::TlsError(format!("failed to encode certificate: {}", e)))?;
    let pem = cert
        .serialize_pem()
        .map_err(|e| TfplugError::TlsError(format!("failed to encode certificate: {}", e)))?;
    let key = cert.serialize_private_key_pem();

    Ok(ServerCertificate {
        der,
        identity: Identity::from_pem(pem, key),
    })
}

/// Serve `provider` until Terraform closes the connection or kills the
/// process
pub async fn serve<P: Provider + 'static>(provider: P, config: ServeConfig) -> Result<()> {
    check_magic_cookie()?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let service = ProviderServiceServer::new(GrpcProviderService::new(provider))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let mut builder = Server::builder();
    let server_cert = match config.client_cert {
        Some(_) => {
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            let cert = generate_server_certificate()?;
            builder = builder.tls_config(ServerTlsConfig::new().identity(cert.identity))?;
            Some(cert.der)
        }
        None => None,
    };

    println!("{}", handshake_line(addr, server_cert.as_deref()));
    tracing::info!(
        "Provider listening on {} (tls: {})",
        addr,
        server_cert.is_some()
    );

    builder
        .add_service(service)
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}
