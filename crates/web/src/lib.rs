//! Static asset server for the banner demo page and promotion templates.
//!
//! Every path is a file under `[server].root`; there is no API surface.
//! [`build_app`] returns the Axum `Router` so tests (or another host) can
//! mount it on their own listener.

pub mod assets;
pub mod error;

use std::{future::Future, net::SocketAddr};

use {
    axum::Router,
    nudge_config::ServerConfig,
    tokio::net::TcpListener,
    tower_http::cors::{Any, CorsLayer},
    tracing::{info, warn},
};

pub use {
    assets::StaticRoot,
    error::{Error, Result},
};

use crate::error::Context;

/// Build the static-file router for `config`.
pub fn build_app(config: &ServerConfig) -> Router {
    let router = Router::new()
        .fallback(assets::static_handler)
        .with_state(StaticRoot::new(&config.root));

    if config.cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Parse `bind:port` from the config.
pub fn listen_addr(config: &ServerConfig) -> Result<SocketAddr> {
    let raw = format!("{}:{}", config.bind, config.port);
    raw.parse().map_err(|source| Error::InvalidAddress { addr: raw, source })
}

pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = listen_addr(config)?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })
}

/// Serve `config.root` until `shutdown` resolves.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("listener has no local address")?;
    info!(
        %addr,
        root = %config.root.display(),
        cors = config.cors,
        "Server started at port: {}",
        addr.port()
    );
    axum::serve(listener, build_app(config))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("server stopped");
    Ok(())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let listener = bind(config).await?;
    serve_with_shutdown(listener, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_from_config() {
        let config = ServerConfig {
            bind: "0.0.0.0".into(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(listen_addr(&config).unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn bad_bind_address_rejected() {
        let config = ServerConfig {
            bind: "not an ip".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            listen_addr(&config),
            Err(Error::InvalidAddress { .. })
        ));
    }
}
