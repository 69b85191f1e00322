use clap::{App, Arg};
use colored::*;
use scanrelay::hal::{CdcPort, Clock, MonotonicClock};
use scanrelay::ingress::{self, IngressQueue, CDC_TRANSFER_SIZE};
use scanrelay::uplink::Uplink;
use scanrelay::watchdog::Watchdog;
use scanrelay::{AlertChannel, RelayConfig, RelayEngine, UplinkError};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};

const DEFAULT_TICK_MS: &str = "50";
const EVENT_CHANNEL_SIZE: usize = 64;

/// What the simulated USB host delivers to the relay.
#[derive(Debug)]
enum HostEvent {
    Scan(String),
    Attach,
    Detach,
    Stats,
}

enum BootExit {
    WatchdogExpired,
    InputClosed,
}

/// Uplink printing each blob on stdout once its line ending arrives.
#[derive(Default)]
struct ConsoleUplink {
    line: Vec<u8>,
}

impl Uplink for ConsoleUplink {
    fn write(&mut self, byte: u8) -> nb::Result<(), UplinkError> {
        self.line.push(byte);
        if self.line.ends_with(b"\r\n") {
            let text = String::from_utf8_lossy(&self.line[..self.line.len() - 2]).into_owned();
            println!("{} {}", "UPLINK ⇢".green().bold(), text);
            self.line.clear();
        }
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), UplinkError> {
        std::io::stdout()
            .flush()
            .map_err(|_| nb::Error::Other(UplinkError::Hardware("stdout flush failed")))
    }
}

/// Watchdog that expires when not fed within its timeout.
struct SimWatchdog {
    clock: MonotonicClock,
    tripped_last_boot: bool,
    timeout_ms: Option<u32>,
    last_feed_ms: u64,
}

impl SimWatchdog {
    fn new(clock: MonotonicClock, tripped_last_boot: bool) -> Self {
        Self {
            clock,
            tripped_last_boot,
            timeout_ms: None,
            last_feed_ms: 0,
        }
    }

    fn expired(&self) -> bool {
        match self.timeout_ms {
            Some(timeout) => self.clock.now_ms() - self.last_feed_ms > u64::from(timeout),
            None => false,
        }
    }
}

impl Watchdog for SimWatchdog {
    fn caused_last_reset(&self) -> bool {
        self.tripped_last_boot
    }

    fn arm(&mut self, timeout_ms: u32) {
        self.timeout_ms = Some(timeout_ms);
        self.last_feed_ms = self.clock.now_ms();
    }

    fn heartbeat(&mut self) {
        self.last_feed_ms = self.clock.now_ms();
    }
}

#[derive(Default)]
struct SimCdcPort {
    transfers_armed: u32,
}

impl CdcPort for SimCdcPort {
    fn schedule_receive(&mut self) {
        self.transfers_armed += 1;
        debug!(armed = self.transfers_armed, "CDC receive scheduled");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("relay-sim")
        .version("0.1.0")
        .about("Scanner relay simulator: stdin is the scanner, stdout is the uplink")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON relay configuration")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("tick-ms")
                .short("t")
                .long("tick-ms")
                .value_name("MS")
                .help("Main loop period")
                .takes_value(true)
                .default_value(DEFAULT_TICK_MS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("tick period must be a number of milliseconds".into()),
                }),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log timer decisions"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let config = match matches.value_of("config") {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };
    let tick_ms: u64 = matches.value_of("tick-ms").unwrap_or(DEFAULT_TICK_MS).parse()?;
    config.check_tick_period(tick_ms)?;

    println!("{}", "Scanner Relay Simulator".bold());
    println!("  type a scan and press enter, or !attach / !detach / !stats");

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    tokio::spawn(read_stdin(event_tx));

    let mut caused_by_watchdog = false;
    loop {
        match boot(&config, tick_ms, &mut event_rx, caused_by_watchdog).await {
            BootExit::WatchdogExpired => {
                println!("{}", "watchdog expired, rebooting".red().bold());
                caused_by_watchdog = true;
            }
            BootExit::InputClosed => break,
        }
    }

    Ok(())
}

async fn read_stdin(tx: mpsc::Sender<HostEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "!attach" => HostEvent::Attach,
                "!detach" => HostEvent::Detach,
                "!stats" => HostEvent::Stats,
                "" => continue,
                scan => HostEvent::Scan(scan.to_owned()),
            },
            Ok(None) => break,
            Err(e) => {
                error!("stdin error: {}", e);
                break;
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

/// One device lifetime, from reset to watchdog expiry.
async fn boot(
    config: &RelayConfig,
    tick_ms: u64,
    events: &mut mpsc::Receiver<HostEvent>,
    caused_by_watchdog: bool,
) -> BootExit {
    let clock = MonotonicClock::new();
    let mut queue: IngressQueue = IngressQueue::new();
    let alerts = AlertChannel::new();
    let (mut isr, consumer) = ingress::split(&mut queue, &alerts);
    let mut port = SimCdcPort::default();

    let mut engine: RelayEngine<_, _, _> = RelayEngine::new(
        config.clone(),
        consumer,
        &alerts,
        ConsoleUplink::default(),
        SimWatchdog::new(clock, caused_by_watchdog),
        clock,
    );
    let reason = engine.start();
    info!(?reason, "device booted");

    // Scanner is plugged in from the start
    isr.on_device_attached(&mut port);

    let mut interval = time::interval(Duration::from_millis(tick_ms));
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                engine.tick();
                if engine.watchdog().expired() {
                    warn!(
                        stats = %engine.stats().summary(),
                        ingress_dropped = isr.dropped_bytes(),
                        "watchdog timeout"
                    );
                    return BootExit::WatchdogExpired;
                }
            }
            event = events.recv(), if input_open => match event {
                Some(HostEvent::Scan(scan)) => {
                    let mut bytes = scan.into_bytes();
                    bytes.push(b'\r');
                    for chunk in bytes.chunks(CDC_TRANSFER_SIZE) {
                        let mut transfer = [0u8; CDC_TRANSFER_SIZE];
                        transfer[..chunk.len()].copy_from_slice(chunk);
                        isr.on_transfer_complete(&transfer, &mut port);
                    }
                }
                Some(HostEvent::Attach) => isr.on_device_attached(&mut port),
                Some(HostEvent::Detach) => isr.on_device_detached(),
                Some(HostEvent::Stats) => {
                    match serde_json::to_string_pretty(engine.stats()) {
                        Ok(json) => println!("{}", json.cyan()),
                        Err(e) => error!("stats serialization failed: {}", e),
                    }
                    println!("{} {}", "ingress dropped:".cyan(), isr.dropped_bytes());
                }
                None => {
                    input_open = false;
                    info!("input closed, draining until the next flush");
                }
            },
        }

        if !input_open && engine.buffer().is_empty() {
            info!(
                stats = %engine.stats().summary(),
                ingress_dropped = isr.dropped_bytes(),
                "shutting down"
            );
            return BootExit::InputClosed;
        }
    }
}
