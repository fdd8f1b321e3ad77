// Telos RPC Proxy - signature-normalizing JSON-RPC reverse proxy
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Logging configuration for proxy components
//!
//! Provides centralized logging setup with:
//! - Structured console output with timestamps
//! - Environment variable support (RUST_LOG)
//! - A safe, idempotent initializer for tests

use eyre::Result;
use std::{env, sync::Once};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// HTTP stack crates that are noisy at `debug` and below
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Initialize console logging for a proxy component
///
/// Sets up a `tracing` subscriber with:
/// - Timestamps, targets and line numbers on every record
/// - Level taken from `RUST_LOG`, falling back to `info`
/// - The HTTP client/server internals capped at `warn`
///
/// # Arguments
/// * `component_name` - Name of the component (e.g., "telos-rpc-proxy")
/// * `with_ansi` - Whether to emit colored output
///
/// # Returns
/// * `Result<()>` - Fails if a global subscriber is already installed
///
/// # Examples
/// ```rust
/// use telos_proxy_utils::logging;
///
/// fn main() -> eyre::Result<()> {
///     logging::init_logging("telos-rpc-proxy", true)?;
///     tracing::info!("Application started");
///     Ok(())
/// }
/// ```
pub fn init_logging(component_name: &str, with_ansi: bool) -> Result<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(with_ansi);

    tracing_subscriber::registry()
        .with(env_filter(Level::INFO)?)
        .with(console_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {e}"))?;

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing::info!(component = component_name, rust_log = %rust_log, "Logging initialized");

    Ok(())
}

/// Build the environment filter shared by every initializer
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. The HTTP stack
/// is always capped at `warn`.
fn env_filter(default_level: Level) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.as_str()))?;

    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }

    Ok(filter)
}

/// Initialize simple logging (console only, compact formatting)
///
/// # Arguments
/// * `level` - The default log level to use
pub fn init_simple_logging(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize simple logging: {e}"))?;

    Ok(())
}

static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests - can be called multiple times without crashing
///
/// Uses `std::sync::Once` so the first caller installs a compact console
/// subscriber and every later call is a no-op.
///
/// # Usage
/// ```rust
/// use telos_proxy_utils::logging;
///
/// logging::ensure_test_logging(None);
/// tracing::info!("This will work safely in any test!");
/// ```
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        // A subscriber installed elsewhere is fine for tests
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}
