//! Serial Monitor - console front end
//!
//! Opens a serial port, prints the styled log to stdout and sends each line
//! typed on stdin. Lines starting with `/` are commands:
//!
//! - `/quit` exit (also on end of input)
//! - `/clear` clear the log
//! - `/items` list quick-send items
//! - `/send <n>` send quick-send item `n`
//! - `/seq`, `/stop` start and stop sending the checked items
//! - `/connect [port]`, `/disconnect`

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use serial_monitor::app::{Monitor, SendError, Settings, SettingsRepository};
use serial_monitor::core::{OverflowFile, TerminalBuffer};
use serial_monitor::protocol::{ChecksumEndMode, LineEnding};
use serial_monitor::serial::{
    Connector, DataBits, EventCallback, LinkEvent, MemoryConnector, MemoryDevice, Parity,
    SerialLink, StopBits, SystemConnector,
};

/// Device polling period for hot-unplug detection and auto-reconnect
const POLL_INTERVAL: Duration = Duration::from_secs(1);

const LOOPBACK_PORT: &str = "loopback";

/// CLI arguments for Serial Monitor
#[derive(Parser, Debug)]
#[command(name = "serial-monitor")]
#[command(version)]
#[command(about = "Serial port terminal for firmware debugging", long_about = None)]
struct CliArgs {
    /// Port to open (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, value_name = "BAUD")]
    baud: Option<u32>,

    /// Parity: none, even or odd
    #[arg(long, value_name = "PARITY", value_parser = parse_parity)]
    parity: Option<Parity>,

    /// Data bits (5-8)
    #[arg(long, value_name = "BITS", value_parser = parse_data_bits)]
    data_bits: Option<DataBits>,

    /// Stop bits (1 or 2)
    #[arg(long, value_name = "BITS", value_parser = parse_stop_bits)]
    stop_bits: Option<StopBits>,

    /// Send typed lines as hex
    #[arg(long)]
    send_hex: bool,

    /// Show received data as a hex dump
    #[arg(long)]
    receive_hex: bool,

    /// Omit timestamps from log lines
    #[arg(long)]
    no_timestamp: bool,

    /// Strip ANSI colors from received data
    #[arg(long)]
    no_color: bool,

    /// Line ending appended to typed lines: none, lf, crlf or cr
    #[arg(
        short,
        long,
        value_name = "ENDING",
        value_parser = parse_line_ending,
        default_value = "none"
    )]
    line_ending: LineEnding,

    /// Insert a checksum starting at this 1-based byte
    #[arg(long, value_name = "START")]
    checksum_start: Option<usize>,

    /// Tail bytes left after the checksum (0-4)
    #[arg(long, value_name = "N", value_parser = parse_end_mode)]
    checksum_end: Option<ChecksumEndMode>,

    /// Reopen the port when it comes back after an unplug
    #[arg(long)]
    auto_reconnect: bool,

    /// Interval between sequenced quick-send items in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Directory holding settings.json and quick_sends.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Use an in-memory loopback device instead of real ports
    #[arg(long)]
    loopback: bool,

    /// List available ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn parse_parity(s: &str) -> Result<Parity, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" | "n" => Ok(Parity::None),
        "even" | "e" => Ok(Parity::Even),
        "odd" | "o" => Ok(Parity::Odd),
        _ => Err(format!("unknown parity '{s}'")),
    }
}

fn parse_data_bits(s: &str) -> Result<DataBits, String> {
    let bits: u8 = s.parse().map_err(|_| format!("invalid data bits '{s}'"))?;
    DataBits::try_from(bits).map_err(|e| e.to_string())
}

fn parse_stop_bits(s: &str) -> Result<StopBits, String> {
    match s {
        "1" => Ok(StopBits::One),
        "2" => Ok(StopBits::Two),
        _ => Err(format!("stop bits must be 1 or 2, got '{s}'")),
    }
}

fn parse_line_ending(s: &str) -> Result<LineEnding, String> {
    LineEnding::parse(s).ok_or_else(|| format!("unknown line ending '{s}'"))
}

fn parse_end_mode(s: &str) -> Result<ChecksumEndMode, String> {
    let index: u8 = s.parse().map_err(|_| format!("invalid tail length '{s}'"))?;
    ChecksumEndMode::try_from(index).map_err(|e| e.to_string())
}

impl CliArgs {
    /// Command line values win over persisted ones
    fn apply(&self, settings: &mut Settings) {
        if let Some(baud) = self.baud {
            settings.baudrate = baud;
        }
        if let Some(parity) = self.parity {
            settings.parity = parity;
        }
        if let Some(bits) = self.data_bits {
            settings.databits = bits;
        }
        if let Some(bits) = self.stop_bits {
            settings.stopbits = bits;
        }
        if self.send_hex {
            settings.send_hex_mode = true;
        }
        if self.receive_hex {
            settings.receive_hex_mode = true;
        }
        if self.no_timestamp {
            settings.show_timestamp = false;
        }
        if self.no_color {
            settings.enable_ansi_colors = false;
        }
        if self.auto_reconnect {
            settings.auto_reconnect = true;
        }
        if let Some(start) = self.checksum_start {
            settings.auto_checksum = true;
            settings.checksum_start = start.max(1);
        }
        if let Some(mode) = self.checksum_end {
            settings.checksum_end_mode = mode;
        }
    }
}

enum AppEvent {
    Link(LinkEvent),
    Input(String),
    InputClosed,
}

/// Prints each completed log line once
#[derive(Default)]
struct LinePrinter {
    /// Absolute index of the next line to print
    next: u64,
}

impl LinePrinter {
    fn flush(&mut self, buffer: &TerminalBuffer, out: &mut impl Write) -> io::Result<()> {
        let first = buffer.first_line_index();
        // Lines trimmed or cleared before they were printed are skipped
        self.next = self.next.max(first);

        let skip = (self.next - first) as usize;
        for line in buffer.lines().skip(skip) {
            if !line.is_terminated() {
                break;
            }
            writeln!(out, "{}", line.render_ansi())?;
            self.next += 1;
        }
        out.flush()
    }
}

enum Flow {
    Continue,
    Quit,
}

fn handle_input(monitor: &mut Monitor, input: &str, line_ending: LineEnding) -> Flow {
    let mut words = input.split_whitespace();
    match words.next() {
        Some("/quit") => return Flow::Quit,
        Some("/clear") => monitor.clear(),
        Some("/items") => {
            for (i, item) in monitor.quick_sends().iter().enumerate() {
                let mark = if item.checked { 'x' } else { ' ' };
                println!("{i:>3} [{mark}] {}", item.display_label());
            }
        }
        Some("/send") => {
            let item = words
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| monitor.quick_sends().get(n).cloned());
            match item {
                Some(item) => {
                    if let Err(SendError::NotConnected) = monitor.send_item(&item) {
                        eprintln!("Not connected to a serial port.");
                    }
                }
                None => eprintln!("Usage: /send <item number>"),
            }
        }
        Some("/seq") => {
            if let Err(e) = monitor.start_sequence(Instant::now()) {
                eprintln!("Cannot start sequence: {e}");
            }
        }
        Some("/stop") => {
            monitor.stop_sequence();
        }
        Some("/connect") => {
            let port = words
                .next()
                .map(str::to_string)
                .or_else(|| monitor.link().available_ports().into_iter().next());
            match port {
                Some(port) => {
                    if let Err(e) = monitor.connect(&port) {
                        eprintln!("{e}");
                    }
                }
                None => eprintln!("No serial port available"),
            }
        }
        Some("/disconnect") => monitor.disconnect(),
        _ => match monitor.send_text(input, line_ending) {
            Ok(()) | Err(SendError::EmptyInput) => {}
            Err(e) => eprintln!("Send failed: {e}"),
        },
    }
    Flow::Continue
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = CliArgs::parse();

    let connector: Box<dyn Connector> = if args.loopback {
        let connector = MemoryConnector::new();
        connector.add(LOOPBACK_PORT, MemoryDevice::loopback());
        Box::new(connector)
    } else {
        Box::new(SystemConnector)
    };

    if args.list_ports {
        for port in connector.available_ports() {
            println!("{port}");
        }
        return ExitCode::SUCCESS;
    }

    let repo = args
        .config_dir
        .clone()
        .map(SettingsRepository::new)
        .unwrap_or_else(SettingsRepository::default_location);
    let mut settings = repo.load_settings();
    args.apply(&mut settings);

    let (tx, rx) = mpsc::channel();
    let link_tx = tx.clone();
    let on_event: EventCallback = Arc::new(move |event| {
        let _ = link_tx.send(AppEvent::Link(event));
    });
    let link = SerialLink::new(connector, on_event);

    let sink = OverflowFile::for_session();
    tracing::info!("Trimmed log lines go to {}", sink.path().display());

    let mut monitor = Monitor::new(settings, link, Box::new(sink));
    monitor.set_quick_sends(repo.load_quick_sends());
    if let Some(ms) = args.interval {
        monitor.set_sequence_interval(Duration::from_millis(ms));
    }

    let port = args
        .port
        .clone()
        .or_else(|| args.loopback.then(|| LOOPBACK_PORT.to_string()));
    if let Some(port) = &port {
        if let Err(e) = monitor.connect(port) {
            eprintln!("{e}");
            if !monitor.settings().auto_reconnect {
                return ExitCode::FAILURE;
            }
        }
    }

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(AppEvent::Input(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(AppEvent::InputClosed);
    });

    let mut stdout = io::stdout();
    let mut printer = LinePrinter::default();
    let mut next_poll = Instant::now() + POLL_INTERVAL;

    loop {
        let deadline = monitor
            .next_deadline()
            .map_or(next_poll, |due| due.min(next_poll));
        let wait = deadline.saturating_duration_since(Instant::now());

        match rx.recv_timeout(wait) {
            Ok(AppEvent::Link(event)) => monitor.handle_link_event(event),
            Ok(AppEvent::Input(line)) => {
                if let Flow::Quit = handle_input(&mut monitor, &line, args.line_ending) {
                    break;
                }
            }
            Ok(AppEvent::InputClosed) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        monitor.tick(now);
        if now >= next_poll {
            monitor.poll_devices();
            next_poll = now + POLL_INTERVAL;
        }
        if let Some(e) = monitor.take_link_error() {
            if !monitor.settings().auto_reconnect {
                eprintln!("Connection lost ({e}). Use /connect to reopen the port.");
            }
        }

        if let Err(e) = printer.flush(monitor.buffer(), &mut stdout) {
            tracing::error!("Failed to write to stdout: {}", e);
            break;
        }
    }

    if monitor.is_connected() {
        monitor.disconnect();
        let _ = printer.flush(monitor.buffer(), &mut stdout);
    }

    if let Err(e) = repo.save_settings(&monitor.to_settings()) {
        tracing::warn!("Failed to save settings: {}", e);
    }
    if let Err(e) = repo.save_quick_sends(monitor.quick_sends()) {
        tracing::warn!("Failed to save quick-send list: {}", e);
    }

    ExitCode::SUCCESS
}
