pub mod api;

use crate::agent::VoiceAgent;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{ error, info, warn };

pub struct Server {
    addr: String,
    agent: Arc<VoiceAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<VoiceAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(Arc::clone(&self.agent), self.args.max_audio_bytes);

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert_path), Some(key_path)) => (cert_path, key_path),
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            info!("HTTPS server listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("HTTP server listening on: http://{}", addr);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal()).await?;
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
