use clap::{App, Arg};
use scadamon::agent::{MonitorAgent, LOGIC_TICK_PERIOD};
use scadamon::config::MonitorConfig;
use scadamon::protocol::{self, Message, Request};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LISTEN: &str = "127.0.0.1:8090";
const UPDATE_BROADCAST_BUFFER_SIZE: usize = 256;

type SharedAgent = Arc<Mutex<MonitorAgent>>;
type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("scadamon-monitor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fan safety monitor daemon")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listen")
                .short("l")
                .long("listen")
                .value_name("ADDR")
                .help("Operator interface listen address")
                .takes_value(true)
                .default_value(DEFAULT_LISTEN),
        )
        .arg(
            Arg::with_name("address")
                .short("a")
                .long("address")
                .value_name("HOST:PORT")
                .help("Telemetry transport address")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("simulate")
                .short("s")
                .long("simulate")
                .help("Skip the live transport and run the simulated plant"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("SEED")
                .help("Seed for the simulated sensor jitter")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Seed must be an unsigned integer".into()),
                }),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => MonitorConfig::load(Path::new(path))?,
        None => MonitorConfig::default(),
    };
    if let Some(address) = matches.value_of("address") {
        config.transport_address = address.to_string();
    }
    if matches.is_present("simulate") {
        config.prefer_simulation = true;
    }
    if let Some(seed) = matches.value_of("seed") {
        config.simulation.seed = Some(seed.parse()?);
    }
    let listen = matches.value_of("listen").unwrap_or(DEFAULT_LISTEN).to_string();

    println!("🌀 Fan Safety Monitor");
    println!("=====================");

    let (updates_tx, _) = broadcast::channel::<String>(UPDATE_BROADCAST_BUFFER_SIZE);

    let mut agent = MonitorAgent::new(&config)?;
    let log_tx = updates_tx.clone();
    agent.subscribe_log(move |entry| {
        if let Ok(line) = protocol::encode_message(&Message::LogEntry(entry.clone())) {
            // No receivers is not an error here
            let _ = log_tx.send(line);
        }
    });
    info!("Telemetry source: {:?}", agent.source_kind());
    let agent: SharedAgent = Arc::new(Mutex::new(agent));

    let listener = TcpListener::bind(&listen).await?;
    info!("🌐 Operator interface listening on {}", listen);
    let server = tokio::spawn(run_server(listener, Arc::clone(&agent), updates_tx.clone()));

    run_loops(
        Arc::clone(&agent),
        updates_tx,
        Duration::from_millis(config.poll_interval_ms),
        tokio::signal::ctrl_c(),
    )
    .await;
    info!("Shutdown requested");

    server.abort();
    let stats = *agent.lock().await.stats();
    info!(
        "Stopped after {} ticks, {} readings accepted, {} read errors",
        stats.ticks, stats.readings_accepted, stats.read_errors
    );
    println!("🛑 Fan Safety Monitor stopped");

    Ok(())
}

/// Drive the telemetry poll and the 1 Hz logic tick until `shutdown` completes.
async fn run_loops<S: Future>(
    agent: SharedAgent,
    updates_tx: broadcast::Sender<String>,
    poll_interval: Duration,
    shutdown: S,
) {
    let mut poll = time::interval(poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut logic = time::interval(LOGIC_TICK_PERIOD);
    logic.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First logic tick one period after start
    logic.tick().await;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll.tick() => {
                agent.lock().await.poll_telemetry();
            }
            _ = logic.tick() => {
                let state = agent.lock().await.tick().clone();
                match protocol::encode_message(&Message::State(state)) {
                    Ok(line) => {
                        let _ = updates_tx.send(line);
                    }
                    Err(e) => warn!("Failed to encode state: {}", e),
                }
            }
        }
    }
}

async fn run_server(listener: TcpListener, agent: SharedAgent, updates_tx: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 Operator client connected: {}", addr);
                let client_agent = Arc::clone(&agent);
                let client_tx = updates_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_agent, client_tx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Operator client {} disconnected", addr);
                });
            }
            Err(e) => error!("Failed to accept connection: {}", e),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    agent: SharedAgent,
    updates_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let writer: SharedWriter = Arc::new(Mutex::new(writer));
    let mut stream_task: Option<tokio::task::JoinHandle<()>> = None;

    let mut line = String::new();
    loop {
        line.clear();
        if buf_reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match protocol::decode_request(&line) {
            Ok(request) => {
                if request == Request::Subscribe && stream_task.is_none() {
                    stream_task = Some(spawn_update_stream(updates_tx.subscribe(), Arc::clone(&writer)));
                }
                let mut agent_guard = agent.lock().await;
                protocol::handle_request(&mut agent_guard, &request)
            }
            Err(e) => {
                warn!("Rejected request: {}", e);
                Message::Error { message: e.to_string() }
            }
        };

        write_message(&writer, &response).await?;
    }

    if let Some(task) = stream_task {
        task.abort();
    }
    Ok(())
}

fn spawn_update_stream(mut updates_rx: broadcast::Receiver<String>, writer: SharedWriter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match updates_rx.recv().await {
                Ok(line) => {
                    let mut writer_guard = writer.lock().await;
                    if writer_guard.write_all(line.as_bytes()).await.is_err()
                        || writer_guard.write_all(b"\n").await.is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, {} updates dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn write_message(writer: &SharedWriter, message: &Message) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json = protocol::encode_message(message)?;
    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(json.as_bytes()).await?;
    writer_guard.write_all(b"\n").await?;
    Ok(())
}
