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

//! Volume snapshot platform
//!
//! Snapshots are Kubernetes `VolumeSnapshot` objects. Existence, readiness
//! and creation time are read through kubectl; tests substitute an
//! in-memory implementation of [`SnapshotPlatform`].

use std::{process::Output, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::SeedError;

/// Observed state of one volume snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
	pub name: String,
	pub ready_to_use: bool,
	pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeSnapshot {
	#[serde(default)]
	metadata: SnapshotMetadata,
	#[serde(default)]
	status: Option<SnapshotStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMetadata {
	#[serde(default)]
	creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotStatus {
	#[serde(default)]
	ready_to_use: bool,
}

impl SnapshotInfo {
	/// Parse `kubectl get volumesnapshot -o json` output
	pub fn from_json(name: &str, json: &str) -> Result<Self, SeedError> {
		let snapshot: VolumeSnapshot = serde_json::from_str(json)
			.map_err(|e| SeedError::Platform(format!("invalid snapshot JSON for {}: {}", name, e)))?;

		Ok(Self {
			name: name.to_string(),
			ready_to_use: snapshot.status.map(|s| s.ready_to_use).unwrap_or(false),
			created_at: snapshot.metadata.creation_timestamp,
		})
	}
}

/// Snapshot operations the resolver depends on
#[async_trait]
pub trait SnapshotPlatform: Send + Sync {
	/// Current state of a snapshot, `None` if it does not exist
	async fn snapshot_info(&self, name: &str) -> Result<Option<SnapshotInfo>, SeedError>;

	async fn delete_snapshot(&self, name: &str) -> Result<(), SeedError>;

	/// Point subsequent platform calls at `context`
	async fn switch_context(&self, context: &str) -> Result<(), SeedError>;

	async fn snapshot_exists(&self, name: &str) -> Result<bool, SeedError> {
		Ok(self.snapshot_info(name).await?.is_some())
	}

	async fn snapshot_is_ready(&self, name: &str) -> Result<bool, SeedError> {
		Ok(self
			.snapshot_info(name)
			.await?
			.map(|info| info.ready_to_use)
			.unwrap_or(false))
	}
}

/// kubectl-backed platform scoped to one namespace
#[derive(Debug, Clone)]
pub struct KubectlPlatform {
	namespace: String,
}

impl KubectlPlatform {
	pub fn new(namespace: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
		}
	}

	async fn kubectl(&self, args: &[&str]) -> Result<Output, SeedError> {
		debug!(target: "platform", namespace = %self.namespace, ?args, "kubectl");
		Command::new("kubectl")
			.arg("-n")
			.arg(&self.namespace)
			.args(args)
			.output()
			.await
			.map_err(|e| SeedError::Platform(format!("failed to run kubectl: {}", e)))
	}
}

#[async_trait]
impl SnapshotPlatform for KubectlPlatform {
	async fn snapshot_info(&self, name: &str) -> Result<Option<SnapshotInfo>, SeedError> {
		let output = self
			.kubectl(&["get", "volumesnapshot", name, "-o", "json"])
			.await?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			if !stderr.contains("NotFound") {
				warn!(target: "platform", snapshot = %name, stderr = %stderr.trim(), "kubectl get failed, treating snapshot as absent");
			}
			return Ok(None);
		}

		let stdout = String::from_utf8_lossy(&output.stdout);
		SnapshotInfo::from_json(name, &stdout).map(Some)
	}

	async fn delete_snapshot(&self, name: &str) -> Result<(), SeedError> {
		info!(target: "platform", snapshot = %name, "Deleting snapshot");
		let output = self.kubectl(&["delete", "volumesnapshot", name]).await?;

		if !output.status.success() {
			return Err(SeedError::Platform(format!(
				"failed to delete snapshot {}: {}",
				name,
				String::from_utf8_lossy(&output.stderr).trim()
			)));
		}
		Ok(())
	}

	async fn switch_context(&self, context: &str) -> Result<(), SeedError> {
		info!(target: "platform", context = %context, "Switching kubernetes context");

		match Command::new("kubectx").arg(context).output().await {
			Ok(output) if output.status.success() => return Ok(()),
			Ok(output) => {
				warn!(target: "platform", stderr = %String::from_utf8_lossy(&output.stderr).trim(), "kubectx failed, trying kubectl");
			}
			Err(e) => {
				warn!(target: "platform", error = %e, "kubectx unavailable, trying kubectl");
			}
		}

		let output = Command::new("kubectl")
			.args(["config", "use-context", context])
			.output()
			.await
			.map_err(|e| SeedError::Platform(format!("failed to run kubectl: {}", e)))?;

		if !output.status.success() {
			return Err(SeedError::Platform(format!(
				"failed to switch to context {}: {}",
				context,
				String::from_utf8_lossy(&output.stderr).trim()
			)));
		}
		Ok(())
	}
}

/// Wait until a snapshot reports `readyToUse`; `false` at the deadline
pub async fn wait_for_snapshot_ready(
	platform: &dyn SnapshotPlatform,
	name: &str,
	timeout_secs: u64,
	interval: Duration,
) -> Result<bool, SeedError> {
	info!(target: "platform", snapshot = %name, "Waiting for snapshot to be ready");
	let mut elapsed = 0;

	while elapsed < timeout_secs {
		if platform.snapshot_is_ready(name).await? {
			info!(target: "platform", snapshot = %name, "Snapshot is ready to use");
			return Ok(true);
		}

		tokio::time::sleep(interval).await;
		elapsed += interval.as_secs().max(1);
		info!(target: "platform", snapshot = %name, "Snapshot not ready yet ({}s/{}s)", elapsed, timeout_secs);
	}

	Ok(false)
}

/// Wait until a snapshot exists; `false` at the deadline
pub async fn poll_for_snapshot(
	platform: &dyn SnapshotPlatform,
	name: &str,
	timeout_secs: u64,
	interval: Duration,
) -> Result<bool, SeedError> {
	let mut elapsed = 0;

	while elapsed < timeout_secs {
		info!(target: "platform", snapshot = %name, "Checking for snapshot ({}s/{}s)", elapsed, timeout_secs);
		if platform.snapshot_exists(name).await? {
			return Ok(true);
		}

		tokio::time::sleep(interval).await;
		elapsed += interval.as_secs().max(1);
	}

	Ok(false)
}
