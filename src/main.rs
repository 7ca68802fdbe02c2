//! GIS proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GIS PROXY                     │
//!                        │                                                  │
//!   Client Request       │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   /<prefix>/<b64url>/..┼─▶│ routing │──▶│   gis    │──▶│   forward    │───┼──▶ GIS
//!                        │  │ decode  │   │ classify │   │ BeforeSend   │   │    Backend
//!                        │  └─────────┘   └──────────┘   └──────┬───────┘   │
//!                        │                                      │           │
//!   Client Response      │                 ┌────────────────────▼───────┐   │
//!   ◀────────────────────┼─────────────────│ response: AfterReceive,    │◀──┼───
//!                        │                 │ 302, CORS, body stream     │   │
//!                        │                 └────────────────────────────┘   │
//!                        │                                                  │
//!                        │  config · observability · lifecycle · net/tls   │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use gis_proxy::config::{load_config, ProxyConfig, TlsConfig};
use gis_proxy::lifecycle::signals::stop_on_signal;
use gis_proxy::observability::{logging, metrics};
use gis_proxy::GisProxy;

#[derive(Parser, Debug)]
#[command(name = "gisproxy")]
#[command(about = "Reverse proxy for GIS services addressed by base64 encoded URLs", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// host:port to listen on
    #[arg(short, long)]
    listen: Option<String>,

    /// Prefix path in front of the encoded URL
    #[arg(short, long)]
    prefix: Option<String>,

    /// Add CORS headers to responses
    #[arg(long)]
    cors: bool,

    /// PEM certificate; enables HTTPS together with --tls-key
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<String>,

    /// PEM private key
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command line overrides on top of the file configuration.
    fn apply(self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(prefix) = self.prefix {
            config.proxy.prefix = prefix;
        }
        if self.cors {
            config.proxy.allow_cross_origin = true;
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    let config = cli.apply(config);
    if let Err(errors) = gis_proxy::config::validation::validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {error}");
        }
        std::process::exit(2);
    }

    logging::init_logging(&config.observability);
    tracing::info!("gisproxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr)?;
        }
    }

    let proxy = GisProxy::new(&config)?;
    stop_on_signal(proxy.shutdown_handle(), config.shutdown.timeout());

    if let Err(e) = proxy.start().await {
        tracing::error!(error = %e, "GIS proxy failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
