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

//! Seeding a storage service directly, without sessions or snapshots

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

use snapseed_sdk::SessionEndpoint;
use tracing::info;

use crate::applier::{apply_full_seed, apply_transactions};
use crate::config::SeedConfig;
use crate::error::SeedError;
use crate::indices::create_meilisearch_indices;
use crate::seed_file::{SeedFile, app_context_for_path, parent_folder_name, resolve_base_file_path};

/// Seed `endpoint` with the state described by the file at `path`
///
/// A diff seeds its base chain first and then replays its own
/// transactions on top.
pub async fn seed_local(
	endpoint: &SessionEndpoint,
	path: &Path,
	config: &SeedConfig,
) -> Result<(), SeedError> {
	if path.is_dir() {
		return Err(SeedError::InvalidPath(format!(
			"Only a single JSON file is supported for local seeding: {}",
			path.display()
		)));
	}

	let app_context = app_context_for_path(path);
	let mut visited = HashSet::new();
	seed_file(endpoint, path, app_context.as_deref(), config, &mut visited).await
}

async fn seed_file(
	endpoint: &SessionEndpoint,
	path: &Path,
	app_context: Option<&str>,
	config: &SeedConfig,
	visited: &mut HashSet<PathBuf>,
) -> Result<(), SeedError> {
	let full_path = std::fs::canonicalize(path).map_err(|e| SeedError::io(path, e))?;
	if !visited.insert(full_path.clone()) {
		return Err(SeedError::CircularDependency(full_path));
	}

	let current_app_context = match app_context {
		Some(app) => app.to_string(),
		None => parent_folder_name(path),
	};

	match SeedFile::load(&full_path)? {
		SeedFile::Diff(diff) => {
			info!(target: "resolver", base_id = %diff.base_id, "Encountered diff seed file");
			let base_path =
				resolve_base_file_path(path, &diff.base_id, &current_app_context, config)?;
			Box::pin(seed_file(
				endpoint,
				&base_path,
				Some(&current_app_context),
				config,
				visited,
			))
			.await?;

			info!(
				target: "resolver",
				"Applying {} diff transactions from {}",
				diff.transactions.len(),
				path.display()
			);
			apply_transactions(endpoint, &diff.transactions).await
		}
		SeedFile::Full(full) => {
			info!(target: "resolver", path = %path.display(), "Seeding full data");
			apply_full_seed(endpoint, &full).await?;
			create_meilisearch_indices(endpoint, &current_app_context, config).await
		}
	}
}
