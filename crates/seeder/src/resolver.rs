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

//! Snapshot resolver
//!
//! Makes sure a snapshot exists for a seed file. Diff seeds depend on the
//! snapshot of their base file, which is resolved first, recursively:
//!
//! ```text
//! checkout.json (diff) -> cart.json (diff) -> initial_data.json (full)
//! ```
//!
//! Each missing snapshot is built in its own session: start (forked from
//! the base snapshot for diffs), apply the data, create the snapshot, stop.
//! The session is stopped on every exit path except in fire-and-forget
//! mode, where snapshot creation is still in flight when we move on.

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
	sync::Arc,
};

use snapseed_sdk::{ClientError, OrchestratorClient};
use tracing::{info, warn};

use crate::applier::{apply_full_seed, apply_transactions};
use crate::config::SeedConfig;
use crate::error::SeedError;
use crate::indices::create_meilisearch_indices;
use crate::platform::{SnapshotPlatform, poll_for_snapshot, wait_for_snapshot_ready};
use crate::seed_file::{
	SeedFile, app_context_for_path, calculate_snapshot_name, collect_json_files,
	meilisearch_snapshot_name, parent_folder_name, resolve_base_file_path,
};
use crate::session::SessionLifecycle;

/// Marker in a `create_seed` 400 body for the volume-busy race, after which
/// the snapshot usually appears anyway
const RUNNING_SESSIONS_MARKER: &str = "running sessions";

/// Behavior switches for one run
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
	/// Delete and recreate existing snapshots along the dependency chain
	pub overwrite: bool,
	/// Log the plan without mutating anything
	pub dry_run: bool,
	/// Submit snapshot creation and move on without waiting
	pub fire_and_forget: bool,
}

/// Bookkeeping threaded through one run
///
/// `visited` holds the files on the current recursion stack and is reset
/// per top-level file; `processed` holds snapshots handled anywhere in the
/// run.
#[derive(Debug, Default)]
pub struct ResolutionContext {
	visited: HashSet<PathBuf>,
	processed: HashSet<String>,
}

impl ResolutionContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a new top-level file; processed snapshots are kept
	pub fn begin_file(&mut self) {
		self.visited.clear();
	}

	pub fn is_processed(&self, snapshot_name: &str) -> bool {
		self.processed.contains(snapshot_name)
	}

	fn finish(&mut self, full_path: &Path, snapshot_name: &str) {
		self.processed.insert(snapshot_name.to_string());
		self.visited.remove(full_path);
	}
}

pub struct SnapshotResolver {
	sessions: SessionLifecycle,
	platform: Arc<dyn SnapshotPlatform>,
	config: SeedConfig,
	options: ResolveOptions,
}

impl SnapshotResolver {
	pub fn new(
		client: OrchestratorClient,
		platform: Arc<dyn SnapshotPlatform>,
		config: SeedConfig,
		options: ResolveOptions,
	) -> Self {
		Self {
			sessions: SessionLifecycle::new(client, config.timings.clone()),
			platform,
			config,
			options,
		}
	}

	pub fn options(&self) -> ResolveOptions {
		self.options
	}

	pub fn platform(&self) -> &dyn SnapshotPlatform {
		self.platform.as_ref()
	}

	/// Ensure a snapshot exists for `json_path`, building its bases first
	///
	/// Returns the snapshot name. `app_context` names the app whose
	/// snapshots are being built (defaults to the file's parent folder);
	/// `override_name` replaces the derived snapshot name for this file only.
	pub async fn ensure_snapshot_exists(
		&self,
		json_path: &Path,
		app_context: Option<&str>,
		override_name: Option<&str>,
		ctx: &mut ResolutionContext,
	) -> Result<String, SeedError> {
		let full_path = std::fs::canonicalize(json_path).map_err(|e| SeedError::io(json_path, e))?;
		if ctx.visited.contains(&full_path) {
			return Err(SeedError::CircularDependency(full_path));
		}

		let current_app_context = match app_context {
			Some(app) => app.to_string(),
			None => parent_folder_name(json_path),
		};

		// Structural problems anywhere in the chain surface before any
		// platform mutation
		if ctx.visited.is_empty() {
			self.check_dependency_chain(&full_path, &current_app_context)?;
		}
		ctx.visited.insert(full_path.clone());

		let snapshot_name = match override_name {
			Some(name) => name.to_string(),
			None => calculate_snapshot_name(json_path, Some(&current_app_context)),
		};

		info!(
			target: "resolver",
			path = %json_path.display(),
			app_context = %current_app_context,
			snapshot = %snapshot_name,
			"Processing seed file"
		);

		if ctx.is_processed(&snapshot_name) {
			info!(target: "resolver", snapshot = %snapshot_name, "Already processed in this run, skipping");
			ctx.visited.remove(&full_path);
			return Ok(snapshot_name);
		}

		let exists = self.platform.snapshot_exists(&snapshot_name).await?;
		info!(target: "resolver", snapshot = %snapshot_name, exists, "Snapshot lookup");

		if exists && !self.options.overwrite {
			info!(target: "resolver", snapshot = %snapshot_name, "Snapshot already exists, skipping");
			ctx.finish(&full_path, &snapshot_name);
			return Ok(snapshot_name);
		}

		if exists {
			info!(target: "resolver", snapshot = %snapshot_name, "Overwrite enabled, deleting and recreating");
			self.delete_snapshot(&snapshot_name).await?;

			let meilisearch_name = meilisearch_snapshot_name(&snapshot_name);
			if self.platform.snapshot_exists(&meilisearch_name).await? {
				self.delete_snapshot(&meilisearch_name).await?;
			} else {
				info!(target: "resolver", snapshot = %meilisearch_name, "Meilisearch snapshot does not exist, skipping deletion");
			}
		}

		let seed = SeedFile::load(&full_path)?;

		let base_snapshot = match &seed {
			SeedFile::Diff(diff) => {
				let base_path = resolve_base_file_path(
					json_path,
					&diff.base_id,
					&current_app_context,
					&self.config,
				)?;
				info!(target: "resolver", base_id = %diff.base_id, base_path = %base_path.display(), "Diff seed, resolving base");

				let base = Box::pin(self.ensure_snapshot_exists(
					&base_path,
					Some(&current_app_context),
					None,
					ctx,
				))
				.await?;
				info!(target: "resolver", path = %json_path.display(), base = %base, "Base snapshot resolved");
				Some(base)
			}
			SeedFile::Full(_) => None,
		};

		if self.options.dry_run {
			log_dry_run(&snapshot_name, base_snapshot.as_deref(), &seed);
			ctx.finish(&full_path, &snapshot_name);
			return Ok(snapshot_name);
		}

		if let Some(base) = base_snapshot.as_deref()
			&& !self.platform.snapshot_is_ready(base).await?
		{
			info!(target: "resolver", snapshot = %base, "Base snapshot not ready yet, waiting");
			let timings = &self.config.timings;
			let ready = wait_for_snapshot_ready(
				self.platform.as_ref(),
				base,
				timings.snapshot_ready_timeout_secs,
				timings.snapshot_ready_interval(),
			)
			.await?;
			if !ready {
				return Err(SeedError::SnapshotNotReady {
					name: base.to_string(),
					seconds: timings.snapshot_ready_timeout_secs,
				});
			}
		}

		info!(target: "resolver", snapshot = %snapshot_name, "Creating snapshot");
		self.build_snapshot(&seed, base_snapshot.as_deref(), &snapshot_name, &current_app_context)
			.await?;

		ctx.finish(&full_path, &snapshot_name);
		Ok(snapshot_name)
	}

	/// Follow `base_id` links from `full_path` without touching the network
	fn check_dependency_chain(&self, full_path: &Path, app_context: &str) -> Result<(), SeedError> {
		let mut seen = HashSet::new();
		let mut current = full_path.to_path_buf();

		loop {
			let canonical = std::fs::canonicalize(&current).map_err(|e| SeedError::io(&current, e))?;
			if !seen.insert(canonical.clone()) {
				return Err(SeedError::CircularDependency(canonical));
			}

			match SeedFile::load(&canonical)? {
				SeedFile::Diff(diff) => {
					current = resolve_base_file_path(&canonical, &diff.base_id, app_context, &self.config)?;
				}
				SeedFile::Full(_) => return Ok(()),
			}
		}
	}

	async fn delete_snapshot(&self, name: &str) -> Result<(), SeedError> {
		if self.options.dry_run {
			info!(target: "resolver", snapshot = %name, "[DRY-RUN] Would delete snapshot");
			return Ok(());
		}
		self.platform.delete_snapshot(name).await
	}

	/// Build one snapshot inside a fresh session and stop the session
	/// afterwards
	async fn build_snapshot(
		&self,
		seed: &SeedFile,
		base_snapshot: Option<&str>,
		snapshot_name: &str,
		app_context: &str,
	) -> Result<(), SeedError> {
		let session_id = self.sessions.start_session(base_snapshot).await?;

		let mut session_ended = false;
		let result = self
			.seed_session(&session_id, seed, snapshot_name, app_context, &mut session_ended)
			.await;

		if !session_ended
			&& !self.options.fire_and_forget
			&& let Err(e) = self.sessions.end_session(&session_id).await
		{
			warn!(target: "resolver", session_id = %session_id, error = %e, "Failed to end session");
		}

		result
	}

	async fn seed_session(
		&self,
		session_id: &str,
		seed: &SeedFile,
		snapshot_name: &str,
		app_context: &str,
		session_ended: &mut bool,
	) -> Result<(), SeedError> {
		self.sessions.poll_until_running(session_id).await?;

		let client = self.sessions.client();
		let endpoint = client.session(session_id);
		match seed {
			SeedFile::Diff(diff) => {
				apply_transactions(&endpoint, &diff.transactions).await?;
				info!(target: "resolver", "Skipping search index creation for diff seed, indexes come from the base snapshot");
			}
			SeedFile::Full(full) => {
				info!(target: "resolver", "Seeding full database");
				apply_full_seed(&endpoint, full).await?;
				create_meilisearch_indices(&endpoint, app_context, &self.config).await?;
			}
		}

		if self.options.fire_and_forget {
			client.create_seed_detached(session_id, snapshot_name)?;
			info!(target: "resolver", snapshot = %snapshot_name, "Fire-and-forget: seed creation request sent");
			return Ok(());
		}

		*session_ended = self.create_seed(session_id, snapshot_name).await?;
		if !*session_ended {
			self.sessions.poll_until_not_locked(session_id).await?;
		}
		Ok(())
	}

	/// Request snapshot creation; `true` when the session was already
	/// ended while recovering from the volume-busy race
	async fn create_seed(&self, session_id: &str, name: &str) -> Result<bool, SeedError> {
		info!(target: "resolver", snapshot = %name, "Creating seed");
		match self.sessions.client().create_seed(session_id, name).await {
			Ok(response) => {
				info!(target: "resolver", seed_id = %response.seed_id, "Seed created");
				Ok(false)
			}
			Err(err) if is_running_sessions_race(&err) => {
				warn!(target: "resolver", snapshot = %name, error = %err, "Seed creation reported busy volume, checking whether the snapshot was created anyway");
				self.recover_busy_volume(session_id, name).await?;
				Ok(true)
			}
			Err(err) => Err(SeedError::SnapshotCreation {
				name: name.to_string(),
				reason: err.to_string(),
			}),
		}
	}

	async fn recover_busy_volume(&self, session_id: &str, name: &str) -> Result<(), SeedError> {
		let timings = &self.config.timings;
		let found = poll_for_snapshot(
			self.platform.as_ref(),
			name,
			timings.snapshot_appear_timeout_secs,
			timings.snapshot_appear_interval(),
		)
		.await?;

		if !found {
			return Err(SeedError::SnapshotCreation {
				name: name.to_string(),
				reason: format!(
					"not created after {} seconds of polling",
					timings.snapshot_appear_timeout_secs
				),
			});
		}
		info!(target: "resolver", snapshot = %name, "Snapshot was created despite the API error");

		let meilisearch_name = meilisearch_snapshot_name(name);
		let meilisearch_found = poll_for_snapshot(
			self.platform.as_ref(),
			&meilisearch_name,
			timings.snapshot_appear_timeout_secs,
			timings.snapshot_appear_interval(),
		)
		.await?;
		if meilisearch_found {
			info!(target: "resolver", snapshot = %meilisearch_name, "Meilisearch snapshot was created");
		} else {
			warn!(target: "resolver", snapshot = %meilisearch_name, "Meilisearch snapshot was not found");
		}

		self.sessions.poll_until_not_locked(session_id).await?;

		if let Err(e) = self.sessions.end_session(session_id).await {
			warn!(target: "resolver", session_id = %session_id, error = %e, "Failed to end session");
		}
		Ok(())
	}
}

fn is_running_sessions_race(err: &ClientError) -> bool {
	err.status() == Some(400)
		&& err
			.body()
			.is_some_and(|body| body.contains(RUNNING_SESSIONS_MARKER))
}

fn log_dry_run(snapshot_name: &str, base_snapshot: Option<&str>, seed: &SeedFile) {
	info!(target: "resolver", "[DRY-RUN] Would create snapshot: {}", snapshot_name);
	match (base_snapshot, seed) {
		(Some(base), SeedFile::Diff(diff)) => {
			info!(target: "resolver", "[DRY-RUN]   - Start session from base: {}", base);
			info!(target: "resolver", "[DRY-RUN]   - Apply {} transactions", diff.transactions.len());
		}
		_ => {
			info!(target: "resolver", "[DRY-RUN]   - Start fresh session");
			info!(target: "resolver", "[DRY-RUN]   - Seed full data");
		}
	}
	info!(target: "resolver", "[DRY-RUN]   - Create seed with name: {}", snapshot_name);
}

/// Resolve every seed file under `path`, sharing processed snapshots
/// across files
///
/// Returns the snapshot names in file order.
pub async fn seed_remote(
	resolver: &SnapshotResolver,
	path: &Path,
	kube_context: &str,
	override_name: Option<&str>,
) -> Result<Vec<String>, SeedError> {
	let files = collect_json_files(path)?;
	if override_name.is_some() && files.len() > 1 {
		return Err(SeedError::NameWithMultipleFiles(files.len()));
	}

	let options = resolver.options();
	info!(
		target: "resolver",
		path = %path.display(),
		files = files.len(),
		overwrite = options.overwrite,
		dry_run = options.dry_run,
		fire_and_forget = options.fire_and_forget,
		"Seeding snapshots"
	);

	if options.dry_run {
		info!(target: "resolver", "[DRY-RUN] Would switch to context: {}", kube_context);
	} else {
		resolver.platform().switch_context(kube_context).await?;
	}

	let app_context = app_context_for_path(path);
	let mut ctx = ResolutionContext::new();
	let mut snapshots = Vec::with_capacity(files.len());

	for file in &files {
		info!(target: "resolver", file = %file.display(), "Processing file");
		ctx.begin_file();
		let name = resolver
			.ensure_snapshot_exists(file, app_context.as_deref(), override_name, &mut ctx)
			.await?;
		snapshots.push(name);
	}

	info!(target: "resolver", "Snapshots created/verified: {}", snapshots.len());
	for name in &snapshots {
		info!(target: "resolver", "  - {}", name);
	}

	Ok(snapshots)
}
