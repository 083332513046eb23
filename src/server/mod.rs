pub mod api;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};

use crate::cli::ServeArgs;
use crate::llm::ChatProvider;
use api::AppState;

pub struct Server {
    addr: String,
    provider: Arc<dyn ChatProvider>,
    args: ServeArgs,
}

impl Server {
    pub fn new(addr: String, provider: Arc<dyn ChatProvider>, args: ServeArgs) -> Self {
        Self { addr, provider, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let state = AppState {
            provider: self.provider.clone(),
            access_password: self.args.chat_password.clone(),
        };
        let app = api::router(state);

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("TLS enabled without cert/key".into());
                }
            };

            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;

            info!("HTTPS relay listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("HTTP relay listening on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
