//! `service`: binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Generate the RSA key pair.
//! 4. Issue the self-signed certificate and pair it into a TLS credential.
//! 5. Compose the engine: demonstration routes and the latency interceptor.
//! 6. Bind the HTTPS listener and serve until Ctrl-C.

mod config;
mod routes;
mod telemetry;

use anyhow::{Context, Result};
use engine::identity::generate_private_key;
use engine::{issue, Engine, Measurement, Server};
use time::OffsetDateTime;
use tracing::{info, warn};

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        service_id = %cfg.service_id,
        "service starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key pair
    // -----------------------------------------------------------------------
    let key_bits = cfg.key_bits;
    let key = tokio::task::spawn_blocking(move || generate_private_key(key_bits))
        .await
        .context("key generation task panicked")?
        .map_err(|e| anyhow::anyhow!(e.to_exception()))?;
    info!(bits = key.bits(), "key pair generated");

    // -----------------------------------------------------------------------
    // 4. Certificate
    // -----------------------------------------------------------------------
    let subject = cfg.subject(OffsetDateTime::now_utc());
    let credential = issue(&subject, &key, cfg.profile(), cfg.service_id.as_bytes())
        .map_err(|e| anyhow::anyhow!(e.to_exception()))?;
    info!(
        profile = ?credential.profile(),
        not_after = %credential.not_after(),
        "certificate issued"
    );

    // -----------------------------------------------------------------------
    // 5. Engine
    // -----------------------------------------------------------------------
    let identity = cfg.identity();
    let mut builder = Engine::builder(identity.clone());
    routes::register(&mut builder, &identity).context("failed to register routes")?;
    builder
        .interceptor(Measurement::default)
        .body_limit(cfg.max_body_bytes);
    let engine = builder.build();

    // -----------------------------------------------------------------------
    // 6. HTTPS server
    // -----------------------------------------------------------------------
    let server = Server::bind(engine, &credential)
        .await
        .context("failed to bind HTTPS listener")?;
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTPS listener closed")?;

    info!("service stopped");
    Ok(())
}
