//! `uartbridge` command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uartbridge_core::{serial_channel, Bridge};
use uartbridge_runner::config::BridgeConfig;
use uartbridge_runner::error::{RunnerError, RunnerResult};
use uartbridge_runner::logging::init_tracing;
use uartbridge_runner::monitor::TelemetryMonitor;
use uartbridge_runner::mqtt::{self, RumqttTransport};
use uartbridge_runner::serial::{self, PortSink, StopReason};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bridge MQTT topics to a peripheral UART", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", global = true, help = "Path to configuration file (YAML)")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", global = true, help = "Log filter, e.g. info or uartbridge_core=debug")]
    log_level: Option<String>,

    #[arg(long, global = true, help = "Override device_id")]
    device_id: Option<String>,

    #[arg(long, global = true, help = "Override broker.host")]
    broker_host: Option<String>,

    #[arg(long, global = true, help = "Override broker.port")]
    broker_port: Option<u16>,

    #[arg(long, global = true, help = "Override serial.port")]
    serial_port: Option<String>,

    #[arg(long, global = true, help = "Override serial.baud_rate")]
    baud_rate: Option<u32>,

    #[cfg(feature = "prometheus")]
    #[arg(long, value_name = "ADDR", help = "Serve Prometheus metrics on this address")]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    #[command(about = "Bridge the serial port and the broker (default)")]
    Run,
    #[command(about = "Print sensor readings from the broker as JSON lines")]
    Monitor,
    #[command(about = "Validate and print the effective configuration")]
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> RunnerResult<()> {
    let config = load_config(cli)?;
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            config.validate()?;
            run_bridge(cli, &config)
        }
        Commands::Monitor => {
            config.validate_broker()?;
            run_monitor(&config)
        }
        Commands::CheckConfig => {
            config.validate()?;
            print!("{}", config.redacted().to_yaml()?);
            Ok(())
        }
    }
}

/// Load the configuration file, if any, and apply command-line overrides.
fn load_config(cli: &Cli) -> RunnerResult<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            BridgeConfig::from_file(path)?
        }
        None => BridgeConfig::default(),
    };

    if let Some(device_id) = &cli.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(host) = &cli.broker_host {
        config.broker.host = host.clone();
    }
    if let Some(port) = cli.broker_port {
        config.broker.port = port;
    }
    if let Some(port) = &cli.serial_port {
        config.serial.port = port.clone();
    }
    if let Some(baud_rate) = cli.baud_rate {
        config.serial.baud_rate = baud_rate;
    }
    Ok(config)
}

fn build_runtime() -> RunnerResult<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("uartbridge-mqtt")
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Install the Ctrl-C handler; the returned channel fires once on interrupt.
fn shutdown_signal() -> RunnerResult<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}

#[cfg(feature = "prometheus")]
fn install_metrics(cli: &Cli, runtime: &Runtime) -> RunnerResult<()> {
    if let Some(addr) = cli.metrics_addr {
        let _guard = runtime.enter();
        uartbridge_metrics::install_prometheus(addr)
            .map_err(|e| RunnerError::Metrics(e.to_string()))?;
        info!("Serving metrics on {}", addr);
    }
    uartbridge_metrics::describe_metrics();
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(_cli: &Cli, _runtime: &Runtime) -> RunnerResult<()> {
    uartbridge_metrics::describe_metrics();
    Ok(())
}

fn run_bridge(cli: &Cli, config: &BridgeConfig) -> RunnerResult<()> {
    let shutdown = shutdown_signal()?;
    let runtime = build_runtime()?;
    install_metrics(cli, &runtime)?;

    let port = serial::open_port(&config.serial)?;
    let sink = PortSink::from_port(port.as_ref())?;

    let options = mqtt::mqtt_options(config, config.client_id());
    let (client, eventloop) = mqtt::connect(options);
    let transport = RumqttTransport::new(client.clone());

    let bridge = Arc::new(Bridge::new(
        config.device_id.clone(),
        Box::new(sink),
        Box::new(transport),
    ));

    // Serial receive path: reader thread -> queue -> read loop thread.
    let (feeder, source) = serial_channel(config.serial.queue_depth, config.serial.ring_capacity);
    let running = Arc::new(AtomicBool::new(true));
    let reader = serial::spawn_reader(port, feeder, config.serial.buffer_size, running.clone())?;

    let receiver = bridge.receiver(source, config.serial.buffer_size);
    let serial_bridge = bridge.clone();
    // Disconnects when the read loop thread exits, however it exits.
    let (serial_done_tx, serial_done) = crossbeam_channel::bounded::<()>(1);
    let read_loop = thread::Builder::new()
        .name("serial-rx".to_string())
        .spawn(move || {
            let _done = serial_done_tx;
            serial_bridge.run_serial_loop(receiver)
        })?;

    // Broker event context.
    let (stop_tx, stop_rx) = watch::channel(false);
    let event_bridge = bridge.clone();
    let mqtt_task = runtime.spawn(mqtt::drive_event_loop(
        eventloop,
        config.broker.reconnect_delay(),
        stop_rx,
        move |event| event_bridge.handle_session_event(event),
    ));

    info!(
        "Bridging {} <-> {}:{} as {}",
        config.serial.port, config.broker.host, config.broker.port, config.device_id
    );
    let reason = serial::wait_for_stop(&shutdown, &serial_done);
    match reason {
        StopReason::Interrupted => info!("Shutting down"),
        StopReason::SerialEnded => error!("Serial port {} closed, shutting down", config.serial.port),
    }

    running.store(false, Ordering::Release);
    if let Err(e) = client.try_disconnect() {
        warn!("Disconnect request failed: {}", e);
    }
    let _ = stop_tx.send(true);
    if let Err(e) = runtime.block_on(mqtt_task) {
        warn!("MQTT task ended abnormally: {}", e);
    }

    if reader.join().is_err() {
        warn!("Serial reader panicked");
    }
    match read_loop.join() {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Serial read loop failed: {}", e),
        Err(_) => warn!("Serial read loop panicked"),
    }

    runtime.shutdown_timeout(Duration::from_secs(1));
    match reason {
        StopReason::Interrupted => Ok(()),
        StopReason::SerialEnded => Err(RunnerError::SerialLost {
            port: config.serial.port.clone(),
        }),
    }
}

fn run_monitor(config: &BridgeConfig) -> RunnerResult<()> {
    let shutdown = shutdown_signal()?;
    let runtime = build_runtime()?;

    let client_id = config
        .broker
        .client_id
        .clone()
        .unwrap_or_else(|| format!("uartbridge-monitor-{}", std::process::id()));
    let (client, eventloop) = mqtt::connect(mqtt::mqtt_options(config, client_id));
    let mut monitor = TelemetryMonitor::new(RumqttTransport::new(client.clone()), std::io::stdout());

    let (stop_tx, stop_rx) = watch::channel(false);
    let mqtt_task = runtime.spawn(mqtt::drive_event_loop(
        eventloop,
        config.broker.reconnect_delay(),
        stop_rx,
        move |event| monitor.handle_event(event),
    ));

    info!("Monitoring sensors/temp on {}:{}", config.broker.host, config.broker.port);
    let _ = shutdown.recv();

    let _ = client.try_disconnect();
    let _ = stop_tx.send(true);
    if let Err(e) = runtime.block_on(mqtt_task) {
        warn!("MQTT task ended abnormally: {}", e);
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
