mod args;

use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use edge_relay::{
    actuation::Actuator,
    collector::HttpCollector,
    db::new_pool,
    forwarder::{Forwarder, ForwarderSettings},
    ingest::IngestListener,
    logging::init_logging,
    mqtt::{BrokerSettings, MqttPublisher, connect, run_ingest},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.log_level, args.log_file.as_deref())
        .context("failed to initialize logging")?;

    let pool = new_pool(&args.database_path)
        .await
        .context("failed to open reading store")?;
    info!(path = ?args.database_path, "reading store ready");

    let shutdown = CancellationToken::new();

    let collector = HttpCollector::new(
        args.collector_url.clone(),
        Duration::from_secs(args.collector_timeout_secs),
    )
    .context("failed to create collector client")?;

    let forwarder = Forwarder::new(
        pool.clone(),
        collector,
        ForwarderSettings {
            api_key: args.collector_api_key.clone(),
            device_id: args.device_id.clone(),
            batch_size: args.batch_size,
            interval: Duration::from_secs(args.forward_interval_secs),
        },
    );
    let forwarder_task = tokio::spawn(forwarder.run(shutdown.clone()));

    let broker = BrokerSettings {
        host: args.mqtt_host.clone(),
        port: args.mqtt_port,
        client_id: args.mqtt_client_id.clone(),
        keep_alive: Duration::from_secs(args.mqtt_keep_alive_secs),
        username: args.mqtt_username.clone(),
        password: args.mqtt_password.clone(),
    };
    let (client, eventloop) = connect(&broker);
    info!(host = %broker.host, port = broker.port, "connecting to broker");

    let actuator = Actuator::new(
        MqttPublisher::new(client.clone()),
        args.control_topic.clone(),
        args.temperature_threshold,
    );
    let listener = IngestListener::new(pool.clone(), actuator, args.timezone);

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(err) => warn!("failed to listen for shutdown signal: {err}"),
            }
        }
    });

    run_ingest(
        &client,
        eventloop,
        &args.telemetry_topic,
        &listener,
        shutdown.clone(),
    )
    .await;

    forwarder_task.await.context("forwarder task failed")?;
    pool.close().await;
    info!("relay stopped");

    Ok(())
}
