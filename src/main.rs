use anyhow::Context;
use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod broadcast;
mod config;
mod connection;
mod engine;
mod group;
mod objects;
mod observers;
mod player;
mod playground;
mod protocol;
mod queue;
mod server;
mod world;

use config::Args;
use group::GroupManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let seed = args
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen());
    tracing::info!(
        address = %args.address,
        groups_limit = args.groups_limit,
        conns_limit = args.conns_limit,
        seed,
        "welcome to the snake arcade server"
    );

    let manager = Arc::new(GroupManager::new(
        args.groups_limit,
        args.conns_limit,
        seed,
    ));
    let app = server::router(manager);

    let address: SocketAddr = args
        .address
        .parse()
        .with_context(|| format!("invalid address {}", args.address))?;

    if args.tls_enable {
        let cert = args
            .tls_cert
            .context("--tls-cert is required with --tls-enable")?;
        let key = args
            .tls_key
            .context("--tls-key is required with --tls-enable")?;
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("cannot load the TLS certificate")?;
        tracing::info!(%address, "serving with TLS");
        axum_server::bind_rustls(address, tls)
            .serve(app.into_make_service())
            .await
            .context("server error")?;
    } else {
        tracing::info!(%address, "serving");
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .with_context(|| format!("cannot bind {address}"))?;
        axum::serve(listener, app).await.context("server error")?;
    }

    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_new(&args.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
