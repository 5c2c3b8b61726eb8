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

use std::{
	collections::BTreeMap,
	env,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::SeedError;

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "seeder";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = true;

/// Default file output enabled (can be overridden by LOG_TO_FILE environment variable)
pub const DEFAULT_LOG_TO_FILE: bool = false;

/// Prefix for configuration overrides from the environment, e.g.
/// `SNAPSEED_TIMINGS__INDEX_TIMEOUT_SECS=900`
pub const ENV_PREFIX: &str = "SNAPSEED";

/// Environment variable naming a configuration file
pub const CONFIG_PATH_ENV: &str = "SNAPSEED_CONFIG";

/// base_id that resolves through the app -> initial data mapping
pub const INITIAL_DATA_SPECIAL_ID: &str = "initial_data";

/// Prefix of the search index snapshot paired with each data snapshot
pub const MEILISEARCH_SNAPSHOT_PREFIX: &str = "meilisearch-";

/// Deployment the orchestrator runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	Local,
	Staging,
	#[value(alias = "prod")]
	Production,
}

impl Environment {
	pub fn as_str(&self) -> &'static str {
		match self {
			Environment::Local => "local",
			Environment::Staging => "staging",
			Environment::Production => "production",
		}
	}
}

impl std::fmt::Display for Environment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Per-environment endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
	/// Session collection URL of the orchestrator
	pub base_url: String,
	/// Name of the environment variable holding the API key
	pub api_key_env: String,
	/// kubectl context the snapshots live in
	pub kube_context: String,
}

/// Poll intervals and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollTimings {
	pub status_interval_secs: u64,
	/// Unbounded when unset
	pub running_timeout_secs: Option<u64>,
	pub unlock_timeout_secs: u64,
	pub unlock_interval_secs: u64,
	pub snapshot_ready_timeout_secs: u64,
	pub snapshot_ready_interval_secs: u64,
	pub snapshot_appear_timeout_secs: u64,
	pub snapshot_appear_interval_secs: u64,
	pub index_timeout_secs: u64,
	pub index_interval_secs: u64,
}

impl Default for PollTimings {
	fn default() -> Self {
		Self {
			status_interval_secs: 5,
			running_timeout_secs: None,
			unlock_timeout_secs: 300,
			unlock_interval_secs: 10,
			snapshot_ready_timeout_secs: 300,
			snapshot_ready_interval_secs: 10,
			snapshot_appear_timeout_secs: 90,
			snapshot_appear_interval_secs: 10,
			index_timeout_secs: 600,
			index_interval_secs: 5,
		}
	}
}

impl PollTimings {
	pub fn status_interval(&self) -> Duration {
		Duration::from_secs(self.status_interval_secs)
	}

	pub fn unlock_interval(&self) -> Duration {
		Duration::from_secs(self.unlock_interval_secs)
	}

	pub fn snapshot_ready_interval(&self) -> Duration {
		Duration::from_secs(self.snapshot_ready_interval_secs)
	}

	pub fn snapshot_appear_interval(&self) -> Duration {
		Duration::from_secs(self.snapshot_appear_interval_secs)
	}

	pub fn index_interval(&self) -> Duration {
		Duration::from_secs(self.index_interval_secs)
	}
}

/// Seeder configuration
///
/// Mapping paths are relative to `base_dir`. The struct is immutable once
/// loaded and passed explicitly to every component that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
	/// Kubernetes namespace holding the volume snapshots
	pub namespace: String,
	/// Directory the mapping paths are resolved against
	pub base_dir: PathBuf,
	/// App name -> canonical initial data seed file
	pub initial_data: BTreeMap<String, PathBuf>,
	/// App name -> search index definition file
	pub indices: BTreeMap<String, PathBuf>,
	pub environments: BTreeMap<String, EnvironmentConfig>,
	/// App name -> snapshot permanent sessions are started from
	pub default_snapshots: BTreeMap<String, String>,
	pub snapshot_aliases: BTreeMap<String, String>,
	pub timings: PollTimings,
}

impl Default for SeedConfig {
	fn default() -> Self {
		let initial_data = ["xiaohongshu", "weibo", "jd", "notion", "figma", "canva"]
			.into_iter()
			.map(|app| {
				(
					app.to_string(),
					PathBuf::from(format!("../{}/app/initial_data.json", app)),
				)
			})
			.collect();

		let indices = ["xiaohongshu", "weibo", "jd", "notion"]
			.into_iter()
			.map(|app| {
				(
					app.to_string(),
					PathBuf::from(format!("../{}/app/indices.json", app)),
				)
			})
			.collect();

		let mut environments = BTreeMap::new();
		environments.insert(
			"local".to_string(),
			EnvironmentConfig {
				base_url: "http://localhost:8080/api/v1/session".to_string(),
				api_key_env: "API_KEY_LOCAL".to_string(),
				kube_context: "dojo-local".to_string(),
			},
		);
		environments.insert(
			"staging".to_string(),
			EnvironmentConfig {
				base_url: "https://staging-orchestrator.trydojo.ai/api/v1/session".to_string(),
				api_key_env: "API_KEY_STAGING".to_string(),
				kube_context: "dojo-staging".to_string(),
			},
		);
		environments.insert(
			"production".to_string(),
			EnvironmentConfig {
				base_url: "https://orchestrator.trydojo.ai/api/v1/session".to_string(),
				api_key_env: "API_KEY_PRODUCTION".to_string(),
				kube_context: "dojo-production".to_string(),
			},
		);

		let default_snapshots = [
			("jd", "jd-default-seed-data"),
			("xiaohongshu", "xhs-default-seed-data"),
			("weibo", "weibo-default-seed-data"),
			("notion", "notion-default-seed-data"),
		]
		.into_iter()
		.map(|(app, snapshot)| (app.to_string(), snapshot.to_string()))
		.collect();

		let mut snapshot_aliases = BTreeMap::new();
		snapshot_aliases.insert("xhs".to_string(), "xiaohongshu".to_string());

		Self {
			namespace: "dojo-go-server".to_string(),
			base_dir: PathBuf::from("."),
			initial_data,
			indices,
			environments,
			default_snapshots,
			snapshot_aliases,
			timings: PollTimings::default(),
		}
	}
}

impl SeedConfig {
	/// Load configuration: built-in defaults, then an optional file, then
	/// `SNAPSEED_*` environment variables
	pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let mut builder =
			config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

		let path = path
			.map(Path::to_path_buf)
			.or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
		if let Some(path) = path {
			builder = builder.add_source(config::File::from(path));
		}

		let cfg = builder
			.add_source(
				config::Environment::with_prefix(ENV_PREFIX)
					.prefix_separator("_")
					.separator("__")
					.try_parsing(true),
			)
			.build()?;

		cfg.try_deserialize()
	}

	pub fn environment(&self, env: Environment) -> Result<&EnvironmentConfig, SeedError> {
		self.environments.get(env.as_str()).ok_or_else(|| {
			SeedError::Config(format!("No configuration for environment '{}'", env))
		})
	}

	/// API key for `env`, read from the variable the environment names
	pub fn api_key(&self, env: Environment) -> Result<String, SeedError> {
		let env_config = self.environment(env)?;
		env::var(&env_config.api_key_env)
			.ok()
			.filter(|key| !key.is_empty())
			.ok_or_else(|| {
				SeedError::Config(format!(
					"{} environment variable is required for {} environment",
					env_config.api_key_env, env
				))
			})
	}

	/// Canonical initial data file for an app
	pub fn initial_data_path(&self, app: &str) -> Result<PathBuf, SeedError> {
		match self.initial_data.get(app) {
			Some(relative) => Ok(self.base_dir.join(relative)),
			None => Err(SeedError::UnknownApp {
				app: app.to_string(),
				expected: self
					.initial_data
					.keys()
					.cloned()
					.collect::<Vec<_>>()
					.join(", "),
			}),
		}
	}

	/// Search index definition file for an app, if one is mapped
	pub fn indices_path(&self, app: &str) -> Option<PathBuf> {
		self.indices
			.get(app)
			.map(|relative| self.base_dir.join(relative))
	}

	/// Resolve a permanent-session target name through the alias table
	pub fn resolve_target(&self, target: &str) -> Result<String, SeedError> {
		let resolved = self
			.snapshot_aliases
			.get(target)
			.map(String::as_str)
			.unwrap_or(target);

		if self.default_snapshots.contains_key(resolved) {
			Ok(resolved.to_string())
		} else {
			let valid: Vec<&str> = self
				.default_snapshots
				.keys()
				.chain(self.snapshot_aliases.keys())
				.map(String::as_str)
				.collect();
			Err(SeedError::Config(format!(
				"unknown target '{}'. Valid targets: {}",
				target,
				valid.join(", ")
			)))
		}
	}
}
