mod render;

use std::fs;
use std::io::{self, Read};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thermalink_print_client::protocol::{
    Classification, Classifier, Encoders, Label, PrintJob, PrinterDevice, Protocol, ProtocolKind,
    Template, TestPage,
};
use thermalink_print_client::{Connector, Delivery, LinkConfig, PrintService};
use tracing_subscriber::EnvFilter;

use crate::render::Format;

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "thermalink",
    version,
    about = "Classify, encode, and print CPCL, TSPL, and NIIMBOT thermal printer jobs"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Link, encoder, and classifier settings (JSON).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show which protocol a device would be driven with, and why.
    Classify {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Encode a job without sending it.
    Encode {
        /// Protocol to encode for. With "auto", --name/--device decide.
        #[arg(long, short, default_value = "auto")]
        protocol: ProtocolKind,
        /// Advertised device name, for auto-detection.
        #[arg(long)]
        name: Option<String>,
        /// Device address, for auto-detection.
        #[arg(long, default_value = "")]
        device: String,
        /// Number of copies (CPCL/TSPL).
        #[arg(long)]
        copies: Option<u16>,
        /// Write the raw bytes to this file.
        #[arg(long)]
        out: Option<String>,
        /// Include a hex dump in the output.
        #[arg(long)]
        hex: bool,
        #[command(subcommand)]
        job: JobCmd,
    },

    /// Encode a job and deliver it to a printer.
    Print {
        #[command(flatten)]
        target: TargetArgs,
        /// How to reach the device.
        #[arg(long, value_enum, default_value_t = Transport::Serial)]
        transport: Transport,
        /// Serial baud rate.
        #[arg(long, default_value_t = 115_200)]
        baud: u32,
        /// Number of copies (CPCL/TSPL).
        #[arg(long)]
        copies: Option<u16>,
        #[command(subcommand)]
        job: JobCmd,
    },

    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Device address: Bluetooth MAC, serial path (/dev/rfcomm0, COM5), or
    /// host[:port] for TCP.
    #[arg(long, short)]
    device: String,
    /// Advertised device name, used for protocol detection.
    #[arg(long)]
    name: Option<String>,
    /// Protocol: auto, cpcl, tspl, or niimbot.
    #[arg(long, short, default_value = "auto")]
    protocol: ProtocolKind,
}

impl TargetArgs {
    fn device(&self) -> PrinterDevice {
        let device = PrinterDevice::new(self.device.clone());
        match &self.name {
            Some(name) => device.with_name(name.clone()),
            None => device,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
enum JobCmd {
    /// Plain text. Pass "-" to read from stdin.
    Text { text: String },
    /// A label with title, subtitle, barcode, and QR code.
    Label {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "")]
        barcode: String,
        #[arg(long, default_value = "")]
        qr: String,
    },
    /// The CPCL self-test page.
    TestPage {
        /// Timestamp printed on the page, as given.
        #[arg(long, default_value = "")]
        stamp: String,
    },
    /// A connectivity probe that prints nothing.
    Probe,
}

impl JobCmd {
    fn into_job(self) -> Result<PrintJob> {
        Ok(match self {
            JobCmd::Text { text } if text == "-" => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read text from stdin")?;
                PrintJob::text(buf.trim_end_matches(['\r', '\n']))
            }
            JobCmd::Text { text } => PrintJob::text(text),
            JobCmd::Label {
                title,
                subtitle,
                barcode,
                qr,
            } => PrintJob::Label(Label::new(title).subtitle(subtitle).barcode(barcode).qr_data(qr)),
            JobCmd::TestPage { stamp } => PrintJob::Template(Template::TestPage(TestPage::new(stamp))),
            JobCmd::Probe => PrintJob::Probe,
        })
    }
}

/// Transport used by `print`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Bluetooth SPP through an OS serial device.
    Serial,
    /// A network printer or SPP-to-TCP bridge.
    Tcp,
}

/// The `--config` file: a link configuration with optional encoder and
/// classifier sections.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    #[serde(flatten)]
    link: LinkConfig,
    encoders: Encoders,
    classifier: Classifier,
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = Format::resolve_or_detect(cli.output.as_deref());

    if let Err(e) = run(cli.cmd, cli.config.as_deref(), format) {
        render::report_error(format, &e);
        process::exit(1);
    }
}

fn run(cmd: Cmd, config: Option<&str>, format: Format) -> Result<()> {
    let settings = load_settings(config)?;

    match cmd {
        Cmd::Classify { target } => cmd_classify(&target, &settings, format),
        Cmd::Encode {
            protocol,
            name,
            device,
            copies,
            out,
            hex,
            job,
        } => {
            let device = PrinterDevice {
                name,
                ..PrinterDevice::new(device)
            };
            cmd_encode(&device, protocol, settings, copies, out.as_deref(), hex, job, format)
        }
        Cmd::Print {
            target,
            transport,
            baud,
            copies,
            job,
        } => cmd_print(&target, transport, baud, settings, copies, job, format),
        Cmd::Config => render::print_json(&settings),
    }
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_classify(target: &TargetArgs, settings: &Settings, format: Format) -> Result<()> {
    let device = target.device();
    let c = settings
        .classifier
        .explain(device.name.as_deref(), &device.address, target.protocol);

    match format {
        Format::Json => render::print_json(&serde_json::json!({
            "device": device,
            "protocol": c.protocol,
            "reason": c.reason,
        })),
        Format::Pretty => {
            render::field("device", device.label());
            render::field("protocol", render::protocol(c.protocol));
            render::field("reason", describe(&c));
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_encode(
    device: &PrinterDevice,
    kind: ProtocolKind,
    settings: Settings,
    copies: Option<u16>,
    out: Option<&str>,
    hex: bool,
    job: JobCmd,
    format: Format,
) -> Result<()> {
    let protocol = settings.classifier.classify_device(device, kind);
    let encoders = with_copies(settings.encoders, copies);
    let job = job.into_job()?;
    let payload = encoders
        .encode(protocol, &job)
        .with_context(|| format!("cannot encode job for {protocol}"))?;

    if let Some(path) = out {
        fs::write(path, payload.as_bytes()).with_context(|| format!("failed to write {path}"))?;
    }

    match format {
        Format::Json => {
            let mut out = serde_json::json!({
                "success": true,
                "protocol": protocol,
                "bytes": payload.len(),
            });
            if hex {
                out["hex"] = render::hex_lines(payload.as_bytes()).join(" ").into();
            }
            render::print_json(&out)
        }
        Format::Pretty => {
            render::field("protocol", render::protocol(protocol));
            render::field("bytes", payload.len());
            if hex {
                for row in render::hex_lines(payload.as_bytes()) {
                    println!("  {row}");
                }
            }
            Ok(())
        }
    }
}

fn cmd_print(
    target: &TargetArgs,
    transport: Transport,
    baud: u32,
    settings: Settings,
    copies: Option<u16>,
    job: JobCmd,
    format: Format,
) -> Result<()> {
    let job = job.into_job()?;
    let connector = open_connector(transport, baud, &settings.link)?;
    let service = PrintService::builder(connector)
        .config(settings.link)
        .encoders(with_copies(settings.encoders, copies))
        .classifier(settings.classifier)
        .spawn()
        .context("failed to start print service")?;

    let device = target.device();
    let protocol = service
        .connect(device, target.protocol)
        .wait()
        .with_context(|| format!("failed to connect to {}", target.device))?;
    tracing::info!(%protocol, "connected");

    let delivery = service
        .print(job)
        .wait()
        .with_context(|| format!("failed to print to {}", target.device))?;

    if let Err(e) = service.disconnect().wait() {
        tracing::warn!(error = %e, "disconnect failed");
    }

    report_delivery(&target.device, protocol, delivery, format)
}

fn report_delivery(address: &str, protocol: Protocol, delivery: Delivery, format: Format) -> Result<()> {
    match format {
        Format::Json => render::print_json(&serde_json::json!({
            "success": true,
            "device": address,
            "protocol": protocol,
            "bytes": delivery.bytes,
            "attempts": delivery.attempts,
        })),
        Format::Pretty => {
            let s = if delivery.attempts == 1 { "" } else { "s" };
            render::success(&format!(
                "sent {} bytes to {address} as {} ({} attempt{s})",
                delivery.bytes,
                render::protocol(protocol),
                delivery.attempts,
            ));
            Ok(())
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Install the stderr log subscriber. `RUST_LOG` overrides `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    let settings: Settings =
        serde_json::from_str(&json).with_context(|| format!("failed to parse config {path}"))?;
    settings
        .link
        .validate()
        .with_context(|| format!("invalid config {path}"))?;
    Ok(settings)
}

fn with_copies(mut encoders: Encoders, copies: Option<u16>) -> Encoders {
    if let Some(n) = copies {
        encoders.cpcl.copies = n;
        encoders.tspl.copies = n;
    }
    encoders
}

fn open_connector(transport: Transport, baud: u32, link: &LinkConfig) -> Result<Box<dyn Connector>> {
    match transport {
        #[cfg(feature = "tcp")]
        Transport::Tcp => Ok(Box::new(
            thermalink_print_client::TcpConnector::new().connect_timeout(link.connect.timeout),
        )),
        #[cfg(feature = "serial")]
        Transport::Serial => Ok(Box::new(
            thermalink_print_client::SerialConnector::new()
                .baud(baud)
                .timeout(link.connect.timeout),
        )),
        #[allow(unreachable_patterns)]
        other => {
            let _ = (baud, link);
            bail!("transport {other:?} is not compiled into this build")
        }
    }
}

fn describe(c: &Classification) -> String {
    use thermalink_print_client::protocol::Reason;
    match &c.reason {
        Reason::Override => "forced by --protocol".to_string(),
        Reason::NameMarker(m) => format!("name contains {m:?}"),
        Reason::AddressPrefix(p) => format!("address starts with {p}"),
        Reason::Fallback => "no vendor marker matched".to_string(),
    }
}
