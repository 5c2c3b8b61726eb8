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

//! Snapseed command line entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use snapseed::{
	KubectlPlatform, SeedConfig, SessionLifecycle, SnapshotPlatform, SnapshotResolver,
	cli::{Command, LocalArgs, RemoteArgs, RootArgs, SessionsArgs, StatusArgs},
	config::Environment,
	local::seed_local,
	logging::init_logging,
	seed_remote,
	sessions::{create_permanent_sessions, resolve_targets},
	status::check_snapshots,
};
use snapseed_sdk::{OrchestratorClient, SessionEndpoint};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	let args = RootArgs::parse();

	// Initialize logging first
	init_logging()?;

	let config = SeedConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

	match args.command {
		Command::Remote(remote) => run_remote(config, remote).await,
		Command::Local(local) => run_local(config, local).await,
		Command::Status(status) => run_status(config, status).await,
		Command::Sessions(sessions) => run_sessions(config, sessions).await,
	}
}

fn orchestrator_client(config: &SeedConfig, env: Environment) -> Result<OrchestratorClient> {
	let env_config = config.environment(env)?;
	let api_key = config.api_key(env)?;
	info!(target: "seeder", env = %env, base_url = %env_config.base_url, "Using orchestrator");

	OrchestratorClient::with_reqwest(&env_config.base_url, Some(api_key))
		.context("Failed to create orchestrator client")
}

async fn run_remote(config: SeedConfig, args: RemoteArgs) -> Result<()> {
	let client = orchestrator_client(&config, args.env)?;
	let kube_context = config.environment(args.env)?.kube_context.clone();
	let platform = Arc::new(KubectlPlatform::new(config.namespace.clone()));

	let resolver = SnapshotResolver::new(client, platform, config, args.options());
	seed_remote(&resolver, &args.path, &kube_context, args.name.as_deref())
		.await
		.with_context(|| format!("Failed to seed {}", args.path.display()))?;

	Ok(())
}

async fn run_local(config: SeedConfig, args: LocalArgs) -> Result<()> {
	let endpoint = SessionEndpoint::local(&args.url).context("Failed to create storage client")?;

	seed_local(&endpoint, &args.path, &config)
		.await
		.with_context(|| format!("Failed to seed {} into {}", args.path.display(), args.url))?;

	info!(target: "seeder", url = %args.url, "Local seeding complete");
	Ok(())
}

async fn run_status(config: SeedConfig, args: StatusArgs) -> Result<()> {
	let env_config = config.environment(args.env)?;
	let platform = KubectlPlatform::new(config.namespace.clone());
	platform.switch_context(&env_config.kube_context).await?;

	let report = check_snapshots(&platform, &args.path, args.app.as_deref()).await?;
	println!("Environment: {}", args.env);
	println!("Base path: {}\n", args.path.display());
	print!("{}", report.render(chrono::Utc::now()));

	Ok(())
}

async fn run_sessions(config: SeedConfig, args: SessionsArgs) -> Result<()> {
	let apps = resolve_targets(&config, &args.targets)?;
	let client = orchestrator_client(&config, args.env)?;
	let sessions = SessionLifecycle::new(client, config.timings.clone());

	let created = create_permanent_sessions(&sessions, &config, &apps).await;
	println!(
		"{}",
		serde_json::to_string_pretty(&created).context("Failed to encode sessions")?
	);

	Ok(())
}
