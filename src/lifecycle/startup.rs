//! Startup banner.
//!
//! Printed before the logger exists, so it goes straight to stdout. Version
//! details are highlighted unless colors are disabled.

use std::fmt::Write;

use crate::config::ZombieConfig;
use crate::traffic::{DEFAULT_DELAY, DEFAULT_JITTER};

fn green(text: &str, color: bool) -> String {
    if color {
        format!("\x1b[32m{}\x1b[0m", text)
    } else {
        text.to_string()
    }
}

/// Describe what the process is about to do.
pub fn summary(config: &ZombieConfig, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "zombie {} (revision {})",
        green(env!("CARGO_PKG_VERSION"), color),
        green(option_env!("ZOMBIE_REVISION").unwrap_or("unknown"), color)
    );

    match config.enabled_api() {
        Some(api) => {
            let _ = writeln!(out, "api: http://{}", api.addr);
        }
        None => {
            let _ = writeln!(out, "api: disabled");
        }
    }

    let _ = writeln!(out, "targets:");
    for target in &config.targets {
        let name = target.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&target.url);
        let delay = if target.delay > 0 {
            target.delay as u128
        } else {
            DEFAULT_DELAY.as_millis()
        };
        let jitter = if target.jitter > 0.0 { target.jitter } else { DEFAULT_JITTER };
        let _ = writeln!(
            out,
            "  - {} ({}) workers={} delay={}ms jitter={} otel={}",
            name,
            target.url,
            target.workers.max(1),
            delay,
            jitter,
            if target.otel_enabled { "on" } else { "off" }
        );
    }

    out
}
