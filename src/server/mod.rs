pub mod api;

use crate::cli::Args;
use crate::config::prompt::PromptConfig;
use crate::llm::chat::ChatClient;
use api::AppState;
use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(
        addr: String,
        client: Arc<dyn ChatClient>,
        prompts: Arc<PromptConfig>,
        args: Args
    ) -> Self {
        let state = AppState::new(
            client,
            prompts,
            args.prompts_path.clone(),
            args.chat_max_tokens,
            args.history_limit(),
            args.chat_rate_limit
        );
        Self { addr, state, args }
    }

    /// Serves until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(self.state.clone());

        match (self.args.enable_tls, &self.args.tls_cert_path, &self.args.tls_key_path) {
            (true, Some(cert_path), Some(key_path)) => {
                // Err only means a provider is already installed.
                let _ = rustls::crypto::ring::default_provider().install_default();
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    cert_path,
                    key_path
                ).await?;
                info!("Relay listening on https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
            }
            (true, _, _) => {
                return Err("ENABLE_TLS requires both TLS_CERT_PATH and TLS_KEY_PATH".into());
            }
            _ => {
                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!("Relay listening on http://{}", addr);
                axum::serve(listener, app.into_make_service()).await?;
            }
        }
        Ok(())
    }
}
