use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use iota_common::{desired_command, AgentConfig, BoardConfig, DeviceModel, PhysicalPort, SimulatedPort, UpdateDocument};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    api,
    board::FileBoard,
    channel::{bounded, ShadowChannel, ShadowEvent},
    cli::{Cli, Commands},
    mqtt::{MqttShadow, ShadowSession},
    reconciler::Reconciler,
    store::ConfigStore,
};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let filter = match cli.log.as_deref() {
        Some(directive) => EnvFilter::try_new(directive).context("invalid --log directive")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = ConfigStore::new(cli.config.clone());
    let mut config = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load config, using defaults: {err:#}");
        AgentConfig::default()
    });
    cli.apply_overrides(&mut config);
    config.sanitize();

    match &cli.command {
        Commands::Init { force } => init_config(&store, &config, *force).await,
        Commands::Run {
            board,
            simulate,
            http_port,
        } => {
            config.validate().context("cannot reach the shadow")?;
            if *simulate {
                info!("using simulated board");
                run_agent(config.clone(), simulated_board(&config.board), *http_port).await
            } else {
                let port = FileBoard::open(board).context("no controller board detected")?;
                info!("using board at {}", port.root().display());
                run_agent(config.clone(), port, *http_port).await
            }
        }
        Commands::Set { property, value } => {
            config.validate().context("cannot reach the shadow")?;
            set_desired(&config, property, value).await
        }
        Commands::Get => {
            config.validate().context("cannot reach the shadow")?;
            print_document(&config).await
        }
    }
}

async fn init_config(store: &ConfigStore, config: &AgentConfig, force: bool) -> anyhow::Result<()> {
    if !force && tokio::fs::try_exists(store.path()).await.unwrap_or(false) {
        bail!("{} already exists (use --force to overwrite)", store.path().display());
    }
    store.save(config).await?;
    println!("wrote {}", store.path().display());
    Ok(())
}

fn simulated_board(board: &BoardConfig) -> SimulatedPort {
    SimulatedPort::new()
        .with_analog(board.temperature_channel, 0.044)
        .with_analog(board.humidity_channel, 0.41)
        .with_digital(board.motion_pin, false)
}

async fn run_agent<P: PhysicalPort + 'static>(config: AgentConfig, port: P, http_port: u16) -> anyhow::Result<()> {
    let mut device = DeviceModel::new(port, config.board.clone());
    device.initialize().context("failed to drive outlets to their default state")?;

    let (shadow, mut session) = MqttShadow::connect(&config);
    wait_connected(&mut session, Duration::from_millis(config.connect_timeout_ms)).await?;

    let reconciler = Arc::new(Reconciler::new(
        device,
        Arc::clone(&shadow),
        Duration::from_millis(config.shadow_timeout_ms),
    ));
    reconciler.spawn_reconcile();

    let dispatcher = spawn_dispatcher(Arc::clone(&reconciler), session.events);
    let poller = {
        let reconciler = Arc::clone(&reconciler);
        let period = Duration::from_millis(config.poll_interval_ms);
        tokio::spawn(async move { reconciler.run_poller(period).await })
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind local api at {addr}"))?;
    info!("local api listening on http://{addr}");
    let app = api::router(Arc::clone(&reconciler));
    let api = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("local api stopped: {err}");
        }
    });

    shutdown_signal().await;
    info!("shutting down");

    reconciler.shutdown().await;
    api.abort();
    if let Err(err) = poller.await {
        warn!("poller task ended abnormally: {err}");
    }
    dispatcher.abort();
    shadow.disconnect().await;
    if tokio::time::timeout(Duration::from_secs(2), session.network).await.is_err() {
        warn!("mqtt network task did not finish after disconnect");
    }
    Ok(())
}

fn spawn_dispatcher<P: PhysicalPort + 'static, S: ShadowChannel>(
    reconciler: Arc<Reconciler<P, S>>,
    mut events: mpsc::Receiver<ShadowEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ShadowEvent::Connected => {
                    info!("session re-established, reconciling");
                    reconciler.spawn_reconcile();
                }
                ShadowEvent::Delta(payload) => {
                    reconciler.dispatch_delta(payload);
                }
            }
        }
    })
}

async fn wait_connected(session: &mut ShadowSession, limit: Duration) -> anyhow::Result<()> {
    let connected = tokio::time::timeout(limit, async {
        while let Some(event) = session.events.recv().await {
            if event == ShadowEvent::Connected {
                return true;
            }
        }
        false
    })
    .await;

    match connected {
        Ok(true) => Ok(()),
        Ok(false) => bail!("mqtt session closed before connecting"),
        Err(_) => bail!("no connection to the shadow broker within {limit:?}"),
    }
}

/// Submits one desired change and exits once it is accepted.
async fn set_desired(config: &AgentConfig, property: &str, value: &str) -> anyhow::Result<()> {
    let changes = desired_command(property, value)?;
    let (shadow, mut session) = MqttShadow::connect(config);
    wait_connected(&mut session, Duration::from_millis(config.connect_timeout_ms)).await?;
    session.events.close();

    let timeout = Duration::from_millis(config.shadow_timeout_ms);
    let result = bounded(timeout, shadow.update(UpdateDocument::desired(&changes))).await;
    shadow.disconnect().await;

    match result {
        Ok(()) => {
            let accepted = serde_json::Value::Object(changes.to_json_map());
            info!("desired update accepted: {accepted}");
            Ok(())
        }
        Err(err) => {
            error!("desired update failed: {err}");
            Err(err.into())
        }
    }
}

async fn print_document(config: &AgentConfig) -> anyhow::Result<()> {
    let (shadow, mut session) = MqttShadow::connect(config);
    wait_connected(&mut session, Duration::from_millis(config.connect_timeout_ms)).await?;
    session.events.close();

    let timeout = Duration::from_millis(config.shadow_timeout_ms);
    let result = bounded(timeout, shadow.get()).await;
    shadow.disconnect().await;

    let snapshot = result?;
    println!("{}", serde_json::to_string_pretty(&snapshot.document)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
