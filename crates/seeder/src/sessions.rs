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

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::config::SeedConfig;
use crate::error::SeedError;
use crate::session::SessionLifecycle;

/// Resolve target names to configured apps, dropping duplicates
///
/// No targets means every app with a default snapshot.
pub fn resolve_targets(config: &SeedConfig, targets: &[String]) -> Result<Vec<String>, SeedError> {
	if targets.is_empty() {
		return Ok(config.default_snapshots.keys().cloned().collect());
	}

	let mut resolved = Vec::new();
	for target in targets {
		let app = config.resolve_target(target)?;
		if !resolved.contains(&app) {
			resolved.push(app);
		}
	}
	Ok(resolved)
}

/// Start a persistent session per app from its default snapshot
///
/// Returns app -> session id. A target that fails to start is logged and
/// left out.
pub async fn create_permanent_sessions(
	sessions: &SessionLifecycle,
	config: &SeedConfig,
	apps: &[String],
) -> BTreeMap<String, String> {
	let mut created = BTreeMap::new();

	for app in apps {
		let Some(snapshot) = config.default_snapshots.get(app) else {
			error!(target: "session", app = %app, "No default snapshot configured");
			continue;
		};

		info!(target: "session", app = %app, snapshot = %snapshot, "Creating permanent session");
		match sessions.start_persistent_session(snapshot).await {
			Ok(session_id) => {
				info!(target: "session", app = %app, session_id = %session_id, "Permanent session created");
				created.insert(app.clone(), session_id);
			}
			Err(e) => {
				error!(target: "session", app = %app, error = %e, "Failed to create permanent session");
			}
		}
	}

	created
}
