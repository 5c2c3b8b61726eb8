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

use snapseed_sdk::{OrchestratorClient, SessionStatus, StartSessionRequest};
use tracing::info;

use crate::config::PollTimings;
use crate::error::SeedError;

/// Start, wait on and stop orchestrator sessions
#[derive(Clone)]
pub struct SessionLifecycle {
	client: OrchestratorClient,
	timings: PollTimings,
}

impl SessionLifecycle {
	pub fn new(client: OrchestratorClient, timings: PollTimings) -> Self {
		Self { client, timings }
	}

	pub fn client(&self) -> &OrchestratorClient {
		&self.client
	}

	/// Start an ephemeral session, forked from `base_snapshot` when given
	pub async fn start_session(&self, base_snapshot: Option<&str>) -> Result<String, SeedError> {
		info!(target: "session", base = base_snapshot.unwrap_or("none"), "Starting session");
		let request = StartSessionRequest {
			snapshot_name: base_snapshot.map(str::to_string),
			persistent: false,
		};
		let session_id = self
			.client
			.start_session(&request)
			.await
			.map_err(SeedError::SessionStart)?;

		info!(target: "session", session_id = %session_id, "Session started");
		Ok(session_id)
	}

	/// Start a session that stays alive until stopped explicitly
	pub async fn start_persistent_session(&self, snapshot: &str) -> Result<String, SeedError> {
		let request = StartSessionRequest {
			snapshot_name: Some(snapshot.to_string()),
			persistent: true,
		};
		self.client
			.start_session(&request)
			.await
			.map_err(SeedError::SessionStart)
	}

	pub async fn status(&self, session_id: &str) -> Result<SessionStatus, SeedError> {
		self.client
			.session_status(session_id)
			.await
			.map_err(|source| SeedError::StatusQuery {
				session_id: session_id.to_string(),
				source,
			})
	}

	/// Wait for `RUNNING`; `QUEUED` keeps waiting, any other status fails
	pub async fn poll_until_running(&self, session_id: &str) -> Result<(), SeedError> {
		info!(target: "session", session_id = %session_id, "Polling for RUNNING status");
		let interval = self.timings.status_interval();
		let mut elapsed = 0;

		loop {
			let status = self.status(session_id).await?;
			info!(target: "session", session_id = %session_id, status = %status, "Current status");

			match status {
				SessionStatus::Running => return Ok(()),
				SessionStatus::Queued => {}
				status => {
					return Err(SeedError::UnexpectedStatus {
						session_id: session_id.to_string(),
						status,
					});
				}
			}

			if let Some(timeout) = self.timings.running_timeout_secs
				&& elapsed >= timeout
			{
				return Err(SeedError::Timeout {
					what: format!("session {} still QUEUED", session_id),
					seconds: timeout,
				});
			}

			tokio::time::sleep(interval).await;
			elapsed += interval.as_secs().max(1);
		}
	}

	/// Wait until the session leaves `LOCKED`, e.g. after snapshot creation
	pub async fn poll_until_not_locked(&self, session_id: &str) -> Result<(), SeedError> {
		info!(target: "session", session_id = %session_id, "Checking if session is locked");
		let timeout = self.timings.unlock_timeout_secs;
		let interval = self.timings.unlock_interval();
		let mut elapsed = 0;

		while elapsed < timeout {
			let status = self.status(session_id).await?;
			if status != SessionStatus::Locked {
				info!(target: "session", session_id = %session_id, status = %status, "Session is no longer locked");
				return Ok(());
			}

			tokio::time::sleep(interval).await;
			elapsed += interval.as_secs().max(1);
			info!(target: "session", session_id = %session_id, "Session still LOCKED ({}s/{}s)", elapsed, timeout);
		}

		Err(SeedError::Timeout {
			what: format!("session {} still LOCKED", session_id),
			seconds: timeout,
		})
	}

	pub async fn end_session(&self, session_id: &str) -> Result<(), SeedError> {
		info!(target: "session", session_id = %session_id, "Ending session");
		self.client
			.stop_session(session_id)
			.await
			.map_err(|source| SeedError::SessionStop {
				session_id: session_id.to_string(),
				source,
			})
	}
}
