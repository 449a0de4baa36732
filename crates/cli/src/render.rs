//! Output rendering: coloured terminal lines via ariadne's `Fmt`, or JSON.
//!
//! Results go to stdout. In pretty mode, errors go to stderr; in JSON mode
//! they are a single envelope object on stdout so scripts can parse one
//! document either way.

use std::io::{self, IsTerminal};

use ariadne::{Color, Fmt};
use serde::Serialize;

// ── Output format ───────────────────────────────────────────────────────

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, human-readable lines.
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, else pretty for a TTY and JSON for a pipe.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── JSON ────────────────────────────────────────────────────────────────

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Pretty ──────────────────────────────────────────────────────────────

/// `key: value` with the key dimmed.
pub(crate) fn field(key: &str, value: impl std::fmt::Display) {
    println!("{} {}", format!("{key}:").fg(Color::Fixed(8)), value);
}

/// Green check line.
pub(crate) fn success(message: &str) {
    println!("{} {message}", "ok".fg(Color::Green));
}

/// Protocol name, highlighted.
pub(crate) fn protocol(name: impl std::fmt::Display) -> String {
    format!("{}", name.to_string().fg(Color::Cyan))
}

/// Space-separated uppercase hex, 16 bytes per line.
pub(crate) fn hex_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .map(|row| {
            row.iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Report a failed command in the requested format.
pub(crate) fn report_error(format: Format, err: &anyhow::Error) {
    let message = format!("{err:#}");
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "success": false,
                "error": "command_failed",
                "message": message,
            });
            match serde_json::to_string_pretty(&out) {
                Ok(s) => println!("{s}"),
                Err(_) => println!("{out}"),
            }
        }
        Format::Pretty => eprintln!("{} {message}", "error:".fg(Color::Red)),
    }
}
