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

//! Search index creation inside a seeded session
//!
//! Index definitions come from the app's indices file
//! (`{"indices": [...]}`). Creation is asynchronous on the session side,
//! so the status endpoint is polled until nothing is pending.

use std::{path::Path, time::Duration};

use serde::Deserialize;
use serde_json::Value;
use snapseed_sdk::{IndexState, SessionEndpoint};
use tracing::{info, warn};

use crate::config::SeedConfig;
use crate::error::SeedError;

#[derive(Debug, Default, Deserialize)]
struct IndicesFile {
	#[serde(default)]
	indices: Vec<Value>,
}

fn load_indices(path: &Path) -> Result<Vec<Value>, SeedError> {
	let content = std::fs::read_to_string(path).map_err(|e| SeedError::io(path, e))?;
	let file: IndicesFile = serde_json::from_str(&content).map_err(|e| {
		SeedError::SearchIndex(format!("invalid indices file {}: {}", path.display(), e))
	})?;
	Ok(file.indices)
}

/// Create the search indexes configured for `app_context`
///
/// Apps without a mapping, a missing file or an empty list are skipped.
pub async fn create_meilisearch_indices(
	endpoint: &SessionEndpoint,
	app_context: &str,
	config: &SeedConfig,
) -> Result<(), SeedError> {
	let Some(path) = config.indices_path(app_context) else {
		info!(target: "indices", app = %app_context, "No indices mapping, skipping index creation");
		return Ok(());
	};

	if !path.exists() {
		info!(target: "indices", path = %path.display(), "Indices file not found, skipping index creation");
		return Ok(());
	}

	let indices = load_indices(&path)?;
	if indices.is_empty() {
		info!(target: "indices", path = %path.display(), "No indices configured");
		return Ok(());
	}

	info!(target: "indices", path = %path.display(), count = indices.len(), "Creating search indices");
	endpoint
		.create_search_index(&indices)
		.await
		.map_err(|e| SeedError::SearchIndex(e.to_string()))?;

	info!(target: "indices", "Index creation started for {} indices", indices.len());

	poll_index_creation_status(
		endpoint,
		config.timings.index_timeout_secs,
		config.timings.index_interval(),
	)
	.await
}

/// Poll until no index is pending or in progress
///
/// Failed polls are logged and retried until the deadline.
pub async fn poll_index_creation_status(
	endpoint: &SessionEndpoint,
	timeout_secs: u64,
	interval: Duration,
) -> Result<(), SeedError> {
	info!(target: "indices", "Polling for index creation completion");
	let mut elapsed = 0;

	while elapsed < timeout_secs {
		match endpoint.search_index_status().await {
			Ok(response) => {
				let count = |state: IndexState| {
					response
						.indexes
						.iter()
						.filter(|idx| idx.status == state)
						.count()
				};
				let in_progress = count(IndexState::InProgress);
				let pending = count(IndexState::Pending);
				info!(
					target: "indices",
					in_progress,
					pending,
					completed = count(IndexState::Completed),
					failed = count(IndexState::Failed),
					"Index creation status"
				);

				if in_progress == 0 && pending == 0 {
					let failed: Vec<&str> = response
						.indexes
						.iter()
						.filter(|idx| idx.status == IndexState::Failed)
						.map(|idx| idx.collection.as_deref().unwrap_or("unknown"))
						.collect();
					if !failed.is_empty() {
						return Err(SeedError::SearchIndex(format!(
							"Index creation failed: {}",
							failed.join(", ")
						)));
					}
					return Ok(());
				}
			}
			Err(e) => {
				warn!(target: "indices", error = %e, "Failed to get index creation status");
			}
		}

		tokio::time::sleep(interval).await;
		elapsed += interval.as_secs().max(1);
	}

	Err(SeedError::Timeout {
		what: "index creation".to_string(),
		seconds: timeout_secs,
	})
}
