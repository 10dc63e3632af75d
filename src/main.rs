use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vhid::config;
use vhid::events::EventBus;
use vhid::hid::{
    ControlDispatcher, DeviceContext, DeviceMode, HidError, HidRequest, HidResponse, InputReport,
    RequestId,
};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// vhid command line arguments
#[derive(Parser, Debug)]
#[command(name = "vhid")]
#[command(version, about = "Virtual HID pointer/touch device replay harness", long_about = None)]
struct CliArgs {
    /// Configuration file (TOML)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Startup mode (overrides config)
    #[arg(short = 'm', long, value_name = "MODE")]
    mode: Option<DeviceMode>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// One line of harness input
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Command {
    Attributes,
    HidDescriptor,
    ReportDescriptor,
    Mode,
    SetMode {
        mode: DeviceMode,
    },
    Submit {
        report: InputReport,
    },
    SubmitRaw {
        mode: DeviceMode,
        bytes: Vec<u8>,
    },
    Read {
        #[serde(default = "default_read_capacity")]
        capacity: usize,
    },
    Cancel {
        id: RequestId,
    },
    Stats,
}

fn default_read_capacity() -> usize {
    64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose, args.json_logs);

    let mut config = config::load_or_default(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.device.initial_mode = mode;
    }

    let events = Arc::new(EventBus::new());
    let device = Arc::new(DeviceContext::from_config(&config)?.with_event_bus(events.clone()));
    let dispatcher = ControlDispatcher::new(device);

    spawn_event_logger(events.subscribe());

    let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_output(out_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seq: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        seq += 1;

        let response = match parse_command(line) {
            Ok(command) => run_command(&dispatcher, seq, command, &out_tx),
            Err(e) => {
                warn!("Ignoring malformed command {}: {}", seq, e);
                json!({ "seq": seq, "error": e.code(), "message": e.to_string() })
            }
        };
        if out_tx.send(response).is_err() {
            break;
        }
    }

    info!("Input closed, shutting down");
    let device = dispatcher.device();
    debug!(
        "Final state: epoch {}, {} reports left unread, stats {:?}",
        device.epoch(),
        device.buffered_reports(),
        device.stats()
    );

    // Dropping the last device handle cancels reads still pending, so
    // their completions reach the writer before it drains
    drop(dispatcher);
    drop(out_tx);
    writer.await??;
    Ok(())
}

fn parse_command(line: &str) -> vhid::Result<Command> {
    Ok(serde_json::from_str(line)?)
}

/// Execute one command and render its synchronous response
fn run_command(
    dispatcher: &ControlDispatcher,
    seq: u64,
    command: Command,
    out: &mpsc::UnboundedSender<Value>,
) -> Value {
    let request = match command {
        Command::Attributes => HidRequest::GetAttributes,
        Command::HidDescriptor => HidRequest::GetHidDescriptor,
        Command::ReportDescriptor => HidRequest::GetReportDescriptor,
        Command::Mode => HidRequest::GetMode,
        Command::SetMode { mode } => HidRequest::SetDeviceMode { tag: mode.tag() },
        Command::Submit { report } => HidRequest::SubmitInputReport(report),
        Command::SubmitRaw { mode, bytes } => HidRequest::SubmitRawReport {
            tag: mode.tag(),
            bytes: Bytes::from(bytes),
        },
        Command::Read { capacity } => {
            let out = out.clone();
            HidRequest::ReadInputReport {
                capacity,
                completion: Box::new(move |result| {
                    let _ = out.send(render_completion(seq, result));
                }),
            }
        }
        Command::Cancel { id } => HidRequest::CancelRead { id },
        Command::Stats => HidRequest::GetStats,
    };

    match dispatcher.dispatch(request) {
        Ok(response) => json!({ "seq": seq, "ok": render_response(response) }),
        Err(e) => render_error(seq, &e),
    }
}

fn render_response(response: HidResponse) -> Value {
    match response {
        HidResponse::Attributes(attrs) => json!(attrs),
        HidResponse::HidDescriptor(desc) => json!(desc),
        HidResponse::ReportDescriptor(desc) => json!(desc),
        HidResponse::Mode(mode) => json!(mode),
        HidResponse::ModeSet(transition) => json!(transition),
        HidResponse::Accepted(status) => json!(status),
        HidResponse::ReportReady(bytes) => json!({ "report": &bytes[..] }),
        HidResponse::ReadPending(id) => json!({ "pending": id }),
        HidResponse::CancelResult(canceled) => json!({ "canceled": canceled }),
        HidResponse::Stats(stats) => json!(stats),
    }
}

fn render_error(seq: u64, error: &HidError) -> Value {
    json!({ "seq": seq, "error": error.code(), "message": error.to_string() })
}

fn render_completion(seq: u64, result: Result<Bytes, HidError>) -> Value {
    match result {
        Ok(bytes) => json!({ "completed": seq, "report": &bytes[..] }),
        Err(e) => json!({ "completed": seq, "error": e.code(), "message": e.to_string() }),
    }
}

/// Serialize harness output, one JSON value per line
async fn write_output(mut rx: mpsc::UnboundedReceiver<Value>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(value) = rx.recv().await {
        let mut line = value.to_string();
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Log device events as they are published
fn spawn_event_logger(mut rx: broadcast::Receiver<vhid::events::DeviceEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!("Device event: {}", event_summary(&event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event logger lagged, {} events skipped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn event_summary(event: &vhid::events::DeviceEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event))
}

/// Initialize logging. Output goes to stderr so stdout stays machine-readable.
fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "vhid=error",
        LogLevel::Warn => "vhid=warn",
        LogLevel::Info => "vhid=info",
        LogLevel::Verbose => "vhid=debug",
        LogLevel::Debug => "vhid=debug",
        LogLevel::Trace => "vhid=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vhid::config::VhidConfig;
    use vhid::AppError;

    fn dispatcher(mode: DeviceMode) -> ControlDispatcher {
        let mut config = VhidConfig::default();
        config.device.initial_mode = mode;
        ControlDispatcher::new(Arc::new(DeviceContext::from_config(&config).unwrap()))
    }

    #[test]
    fn test_parse_commands() {
        let cmd: Command = serde_json::from_str(
            r#"{"cmd":"submit","report":{"mode":"mouse","buttons":1,"dx":5,"dy":-3}}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            Command::Submit {
                report: InputReport::Mouse { buttons: 1, dx: 5, dy: -3 }
            }
        ));

        let cmd: Command = serde_json::from_str(r#"{"cmd":"read"}"#).unwrap();
        assert!(matches!(cmd, Command::Read { capacity: 64 }));

        let cmd: Command = serde_json::from_str(r#"{"cmd":"set_mode","mode":"multi_touch"}"#).unwrap();
        assert!(matches!(cmd, Command::SetMode { mode: DeviceMode::MultiTouch }));

        let err = parse_command(r#"{"cmd":"reboot"}"#).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
        assert_eq!(err.code(), "serialization");
    }

    #[test]
    fn test_pending_read_completion_is_written() {
        let d = dispatcher(DeviceMode::SingleTouch);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let resp = run_command(&d, 1, Command::Read { capacity: 8 }, &tx);
        assert_eq!(resp["ok"]["pending"], json!(1));
        assert!(rx.try_recv().is_err());

        let report = InputReport::SingleTouch {
            present: true,
            x: 100,
            y: 200,
        };
        let resp = run_command(&d, 2, Command::Submit { report }, &tx);
        assert_eq!(resp["ok"]["status"], json!("delivered"));

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion["completed"], json!(1));
        assert_eq!(completion["report"], json!([1, 100, 0, 200, 0]));
    }

    #[test]
    fn test_read_pending_at_shutdown_is_reported() {
        let d = dispatcher(DeviceMode::MultiTouch);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let resp = run_command(&d, 7, Command::Read { capacity: 64 }, &tx);
        assert!(resp["ok"]["pending"].is_u64());

        drop(d);
        let completion = rx.try_recv().unwrap();
        assert_eq!(completion["completed"], json!(7));
        assert_eq!(completion["error"], json!(HidError::Canceled.code()));
    }

    #[test]
    fn test_errors_render_code() {
        let d = dispatcher(DeviceMode::Mouse);
        let (tx, _rx) = mpsc::unbounded_channel();
        let report = InputReport::SingleTouch {
            present: true,
            x: 1,
            y: 1,
        };
        let resp = run_command(&d, 1, Command::Submit { report }, &tx);
        assert_eq!(resp["error"], json!(HidError::Validation(String::new()).code()));
    }
}
