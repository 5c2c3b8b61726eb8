// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logging initialization for the seeder
//!
//! # Configuration
//!
//! - `RUST_LOG`: Log level filter (default: `info`)
//!   - Can be set per module: `RUST_LOG=snapseed=debug,snapseed_sdk=info`
//!
//! - `LOG_TO_CONSOLE`: Console output on stderr (default: `true`)
//!
//! - `LOG_TO_FILE`: Daily rolling file output (default: `false`)
//!   - Set to `true`, `1`, or `yes` to enable
//!
//! - `LOG_DIR`: Root directory for log files (default: `./logs`)
//!   - Log files are created in `{LOG_DIR}/seeder/` as `seeder.{date}.log`
//!
//! Both layers use UTC RFC 3339 timestamps and include the target, so each
//! component's lines can be filtered (`resolver`, `session`, `applier`,
//! `indices`, `platform`, `http`).

use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use anyhow::{Context, Result};
use tracing::debug;
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_TO_CONSOLE, DEFAULT_LOG_TO_FILE, LOG_COMPONENT_NAME};

// Store log guard to prevent log loss on program exit
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

fn env_flag(name: &str, default: bool) -> bool {
	env::var(name)
		.map(|v| v == "true" || v == "1" || v == "yes")
		.unwrap_or(default)
}

fn get_log_root() -> PathBuf {
	env::var("LOG_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| PathBuf::from("logs"))
}

/// Setup daily-rolling file logging in `log_dir`, e.g. `seeder.2026-01-03.log`
fn setup_file_logging(log_dir: &Path) -> Result<non_blocking::NonBlocking> {
	std::fs::create_dir_all(log_dir)
		.with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

	let file_appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME.to_string())
		.filename_suffix("log")
		.build(log_dir)
		.with_context(|| {
			format!(
				"Failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;

	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();

	Ok(file_writer)
}

/// Initialize logging with console output and optional file output
///
/// See module-level documentation for environment variable configuration.
pub fn init_logging() -> Result<()> {
	dotenv::dotenv().ok();

	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

	let log_to_console = env_flag("LOG_TO_CONSOLE", DEFAULT_LOG_TO_CONSOLE);
	let log_to_file = env_flag("LOG_TO_FILE", DEFAULT_LOG_TO_FILE);

	let console_layer = log_to_console.then(|| {
		fmt::layer()
			.with_writer(std::io::stderr)
			.with_timer(fmt::time::UtcTime::rfc_3339())
			.with_target(true)
			.with_ansi(true)
			.boxed()
	});

	let log_dir = get_log_root().join(LOG_COMPONENT_NAME);
	let file_layer = if log_to_file {
		let file_writer = setup_file_logging(&log_dir)?;
		Some(
			fmt::layer()
				.with_writer(file_writer)
				.with_timer(fmt::time::UtcTime::rfc_3339())
				.with_thread_ids(true)
				.with_target(true)
				.with_ansi(false)
				.boxed(),
		)
	} else {
		None
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(console_layer)
		.with(file_layer)
		.try_init()
		.context("Failed to install tracing subscriber")?;

	debug!(target: "seeder", "Log level: {}", log_level);
	if log_to_file {
		debug!(
			target: "seeder",
			"Log file base name: {}/{}.YYYY-MM-DD.log (daily rolling)",
			log_dir.display(),
			LOG_COMPONENT_NAME
		);
	}

	Ok(())
}
