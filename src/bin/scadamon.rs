use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use scadamon::event_log::{LogEntry, LogLevel};
use scadamon::protocol::{Message, Request, StatusReport};
use scadamon::safety::{format_clock, Severity, SystemState};
use std::process::Command;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8090";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let matches = App::new("scadamon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("🌀 Fan safety monitor - operator console")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Monitor daemon host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Monitor daemon port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("ping")
                .about("🏓 Test connection to the monitor daemon"),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Show temperature, severity, e-stop and countdown state"),
        )
        .subcommand(
            SubCommand::with_name("estop")
                .about("🛑 Engage or release the operator e-stop")
                .arg(
                    Arg::with_name("state")
                        .help("E-stop state")
                        .required(true)
                        .possible_values(&["on", "off", "engage", "release"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("log")
                .about("📜 Show the recent event log")
                .arg(
                    Arg::with_name("limit")
                        .short("n")
                        .long("limit")
                        .value_name("N")
                        .help("Number of entries to show")
                        .takes_value(true)
                        .default_value("20")
                        .validator(|v| match v.parse::<usize>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Limit must be a non-negative integer".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Stream live states and log entries (Ctrl+C to stop)"),
        )
        .subcommand(
            SubCommand::with_name("server")
                .about("🚀 Start the monitor daemon")
                .arg(
                    Arg::with_name("background")
                        .short("b")
                        .long("background")
                        .help("Run the daemon in the background"),
                )
                .arg(
                    Arg::with_name("simulate")
                        .short("s")
                        .long("simulate")
                        .help("Run against the simulated plant"),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse::<u16>()?;
    let format = matches.value_of("format").unwrap_or("table");

    match matches.subcommand() {
        ("ping", _) => handle_ping(host, port, format).await?,
        ("status", _) => handle_status(host, port, format).await?,
        ("estop", Some(sub_matches)) => handle_estop(sub_matches, host, port, format).await?,
        ("log", Some(sub_matches)) => handle_log(sub_matches, host, port, format).await?,
        ("monitor", _) => handle_monitor(host, port, format).await?,
        ("server", Some(sub_matches)) => handle_server(sub_matches, host, port)?,
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the monitor daemon", "scadamon server".bright_cyan());
            println!("  {} Show current status", "scadamon status".bright_cyan());
            println!("  {} Stream live updates", "scadamon monitor".bright_cyan());
        }
    }

    Ok(())
}

async fn handle_ping(host: &str, port: u16, format: &str) -> CliResult<()> {
    let (raw, message) = send_request(host, port, &Request::Ping).await?;
    match (format, message) {
        ("json", _) => println!("{}", raw),
        ("compact", Message::Pong) => println!("{}", "PONG".bright_green()),
        (_, Message::Pong) => println!("{} {}", "✅".green(), "Monitor daemon is responsive".bright_green()),
        (_, other) => print_unexpected(&other),
    }
    Ok(())
}

async fn handle_status(host: &str, port: u16, format: &str) -> CliResult<()> {
    let (raw, message) = send_request(host, port, &Request::Status).await?;
    match (format, message) {
        ("json", _) => println!("{}", raw),
        ("compact", Message::Status(report)) => println!("{}", compact_state(&report.state)),
        (_, Message::Status(report)) => print_status_table(&report),
        (_, other) => print_unexpected(&other),
    }
    Ok(())
}

async fn handle_estop(matches: &ArgMatches<'_>, host: &str, port: u16, format: &str) -> CliResult<()> {
    let engaged = matches!(matches.value_of("state"), Some("on") | Some("engage"));
    let (raw, message) = send_request(host, port, &Request::SetSoftEstop { engaged }).await?;
    match (format, message) {
        ("json", _) => println!("{}", raw),
        (_, Message::Ack { accepted: true, message }) => {
            let action = if engaged { "ENGAGE".bright_red() } else { "RELEASE".bright_green() };
            println!("{} E-stop {} accepted", "✅".green(), action);
            match message {
                Some(text) if format != "compact" => println!("   {}", text.dimmed()),
                _ => {}
            }
        }
        (_, Message::Ack { accepted: false, message }) => {
            println!(
                "{} E-stop request rejected: {}",
                "❌".red(),
                message.unwrap_or_default().bright_red()
            );
        }
        (_, other) => print_unexpected(&other),
    }
    Ok(())
}

async fn handle_log(matches: &ArgMatches<'_>, host: &str, port: u16, format: &str) -> CliResult<()> {
    let limit = matches.value_of("limit").map(str::parse::<usize>).transpose()?;
    let (raw, message) = send_request(host, port, &Request::Log { limit }).await?;
    match (format, message) {
        ("json", _) => println!("{}", raw),
        (_, Message::LogHistory { entries }) => {
            if entries.is_empty() {
                println!("{}", "Event log is empty".dimmed());
            }
            for entry in &entries {
                print_log_entry(entry);
            }
        }
        (_, other) => print_unexpected(&other),
    }
    Ok(())
}

async fn handle_monitor(host: &str, port: u16, format: &str) -> CliResult<()> {
    let stream = connect(host, port).await?;
    let (reader, mut writer) = stream.into_split();
    let request = serde_json::to_string(&Request::Subscribe)?;
    writer.write_all(request.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    if format == "table" {
        println!("{}", "📡 Monitoring fan safety state (Press Ctrl+C to stop)...".bright_blue().bold());
        println!("{}", "┌──────────┬─────────┬──────────┬─────────┬───────────┬──────────────────┐".bright_white());
        println!("{}", "│ Runtime  │ Temp    │ Severity │ Fan     │ Countdown │ Status           │".bright_white());
        println!("{}", "├──────────┼─────────┼──────────┼─────────┼───────────┼──────────────────┤".bright_white());
    }

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if format == "json" {
            println!("{}", line);
            continue;
        }
        match serde_json::from_str::<Message>(&line) {
            Ok(Message::State(state)) if format == "compact" => println!("{}", compact_state(&state)),
            Ok(Message::State(state)) => print_state_row(&state),
            Ok(Message::LogEntry(entry)) => print_log_entry(&entry),
            Ok(_) => {}
            Err(e) => eprintln!("{} Unreadable update: {}", "⚠️".yellow(), e),
        }
    }

    println!("{}", "Monitor daemon closed the connection".yellow());
    Ok(())
}

fn handle_server(matches: &ArgMatches<'_>, host: &str, port: u16) -> CliResult<()> {
    let background = matches.is_present("background");
    let listen = format!("{}:{}", host, port);

    println!("{}", "🚀 Starting fan safety monitor daemon...".bright_green().bold());

    let mut cmd = Command::new("cargo");
    cmd.args(&["run", "--bin", "scadamon-monitor", "--", "--listen", &listen]);
    if matches.is_present("simulate") {
        cmd.arg("--simulate");
    }

    if background {
        cmd.spawn()?;
        println!("{} Daemon started in background on {}", "✅".green(), listen);
    } else {
        println!("{} Daemon starting on {} (Press Ctrl+C to stop)", "🌐".bright_blue(), listen);
        cmd.status()?;
    }

    Ok(())
}

async fn connect(host: &str, port: u16) -> CliResult<TcpStream> {
    let addr = format!("{}:{}", host, port);
    match TcpStream::connect(&addr).await {
        Ok(stream) => Ok(stream),
        Err(e) => {
            eprintln!("{} Failed to connect to monitor daemon at {}", "❌".red(), addr.bright_white());
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Daemon is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "scadamon server".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "🔌".yellow(), e.to_string().bright_red());
            }
            Err(e.into())
        }
    }
}

/// One request, one response line. Returns the raw line alongside the decoded message.
async fn send_request(host: &str, port: u16, request: &Request) -> CliResult<(String, Message)> {
    let stream = connect(host, port).await?;
    let (reader, mut writer) = stream.into_split();
    let payload = serde_json::to_string(request)?;

    let exchange = async {
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        let mut line = String::new();
        let n = BufReader::new(reader).read_line(&mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            ));
        }
        Ok(line)
    };

    let line = match tokio::time::timeout(REQUEST_TIMEOUT, exchange).await {
        Ok(result) => result?,
        Err(_) => {
            eprintln!("{} Request timed out after {}s", "⏰".yellow(), REQUEST_TIMEOUT.as_secs());
            return Err("request timeout".into());
        }
    };
    let raw = line.trim().to_string();
    let message = serde_json::from_str(&raw)?;
    Ok((raw, message))
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Normal => "NORMAL".bright_green(),
        Severity::Warning => "WARNING".yellow(),
        Severity::Danger => "DANGER".red(),
        Severity::Critical => "CRITICAL".bright_red().bold(),
    }
}

fn print_status_table(report: &StatusReport) {
    let state = &report.state;
    println!("{}", "🌀 Fan Safety Status".bright_blue().bold());
    println!("{}", "════════════════════".bright_blue());
    println!("{:<14} {}", "Status:", report.status_text.bold());
    println!("{:<14} {}", "Banner:", report.banner_text);
    println!("{:<14} {:.1}°C", "Temperature:", state.temperature);
    println!("{:<14} {}", "Severity:", severity_label(state.severity));
    let fan = if state.fan_running() { "RUNNING".bright_green() } else { "STOPPED".bright_red() };
    println!("{:<14} {}", "Fan:", fan);
    let soft = if state.soft_estop { "ENGAGED".bright_red() } else { "released".normal() };
    println!("{:<14} {}", "Soft e-stop:", soft);
    let hard = if state.hard_paused { "PAUSED".bright_red() } else { "clear".normal() };
    println!("{:<14} {}", "Hard e-stop:", hard);
    if state.countdown_active {
        println!("{:<14} {}s", "Countdown:", state.countdown_remaining.to_string().bright_red().bold());
    }
    println!("{:<14} {}", "Runtime:", format_clock(state.runtime_seconds));

    println!("\n{}", "📡 Telemetry".bright_white().bold());
    let link = if report.link_healthy { "UP".bright_green() } else { "LOST".bright_red() };
    println!("{:<14} {:?} ({})", "Source:", report.source, link);
    if let Some(fault) = &report.sensor_fault {
        println!("{:<14} {}", "Sensor fault:", fault.bright_red());
    }
    if let (Some(min), Some(max)) = (report.trend_min, report.trend_max) {
        println!("{:<14} {:.1}°C .. {:.1}°C", "Trend range:", min, max);
    }
    let stats = &report.stats;
    println!(
        "{:<14} {} accepted / {} discarded / {} faults / {} read errors",
        "Readings:", stats.readings_accepted, stats.frames_discarded, stats.sensor_faults, stats.read_errors
    );
}

fn print_state_row(state: &SystemState) {
    let temp = format!("{:>5.1}°C", state.temperature);
    let temp = match state.severity {
        Severity::Normal => temp.normal(),
        Severity::Warning => temp.yellow(),
        Severity::Danger | Severity::Critical => temp.red(),
    };
    let fan = if state.fan_running() { "RUN    ".bright_green() } else { "STOP   ".bright_red() };
    let countdown = if state.countdown_active {
        format!("{:>8}s", state.countdown_remaining).bright_red()
    } else {
        "        -".normal()
    };
    println!(
        "│ {:>8} │ {} │ {:<8} │ {} │ {} │ {:<16} │",
        format_clock(state.runtime_seconds).as_str(),
        temp,
        severity_label(state.severity),
        fan,
        countdown,
        state.status_text()
    );
}

fn compact_state(state: &SystemState) -> String {
    let mut line = format!(
        "[{}] {:.1}°C {:?} {}",
        format_clock(state.runtime_seconds),
        state.temperature,
        state.severity,
        state.status_text()
    );
    if state.countdown_active {
        line.push_str(&format!(" T-{}", state.countdown_remaining));
    }
    line
}

fn print_log_entry(entry: &LogEntry) {
    let text = entry.display_line();
    let colored = match entry.level {
        LogLevel::Alarm => text.bright_red().bold(),
        LogLevel::Warning => text.yellow(),
        LogLevel::Success => text.bright_green(),
        LogLevel::Info => text.bright_cyan(),
        LogLevel::Debug => text.dimmed(),
    };
    println!("{}", colored);
}

fn print_unexpected(message: &Message) {
    match message {
        Message::Error { message } => println!("{} {}", "❌".red(), message.bright_red()),
        other => println!("{} Unexpected response: {:?}", "⚠️".yellow(), other),
    }
}
