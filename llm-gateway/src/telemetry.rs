//! Process-wide tracing setup shared by the binary and tests.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::{EnvFilter, fmt};

/// Stamps events with UTC wall time at millisecond precision, e.g.
/// `2025-09-12T10:20:30.417Z`. Millis matter here: admission gaps and
/// webhook turnaround are both sub-second.
fn utc_timestamp(w: &mut Writer<'_>) -> std::fmt::Result {
    write!(w, "{}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
}

/// Installs the global subscriber:
///
/// - `RUST_LOG` wins when set; `default` otherwise (e.g. `"info"`)
/// - UTC timestamps with milliseconds, compact single-line format
/// - target (module path) shown, ANSI colors only on a terminal
///
/// Safe to call once from `main`; later calls are ignored so tests can
/// share it without panicking.
pub fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let use_ansi = io::stdout().is_terminal();

    let _ = fmt()
        .with_env_filter(filter)
        .with_timer(utc_timestamp as fn(&mut Writer<'_>) -> std::fmt::Result)
        .with_target(true)
        .with_ansi(use_ansi)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_utc_millis_with_z_suffix() {
        let mut out = String::new();
        let mut writer = Writer::new(&mut out);
        utc_timestamp(&mut writer).unwrap();
        // 2025-09-12T10:20:30.417Z
        assert_eq!(out.len(), 24);
        assert!(out.ends_with('Z'));
        assert_eq!(out.as_bytes()[10], b'T');
        assert_eq!(out.as_bytes()[19], b'.');
    }
}
