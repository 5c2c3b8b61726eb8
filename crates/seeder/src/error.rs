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

use std::path::PathBuf;

use snapseed_sdk::{ClientError, SessionStatus};
use thiserror::Error;

/// Error types for seeding and snapshot operations
///
/// Structural variants (cycles, unknown apps, bad paths, malformed seed
/// files) are raised before any platform mutation.
#[derive(Debug, Error)]
pub enum SeedError {
	#[error("Circular dependency detected: {}", .0.display())]
	CircularDependency(PathBuf),
	#[error("Unknown app \"{app}\" for initial_data base_id. Expected one of: {expected}")]
	UnknownApp { app: String, expected: String },
	#[error("Invalid seed file {}: {reason}", .path.display())]
	InvalidSeedFile { path: PathBuf, reason: String },
	#[error("Invalid path: {0}")]
	InvalidPath(String),
	#[error("--name can only be used with a single JSON file, but {0} files were found")]
	NameWithMultipleFiles(usize),
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Failed to start session: {0}")]
	SessionStart(#[source] ClientError),
	#[error("Failed to get status of session {session_id}: {source}")]
	StatusQuery {
		session_id: String,
		source: ClientError,
	},
	#[error("Unexpected status for session {session_id}: {status}. Expected QUEUED or RUNNING.")]
	UnexpectedStatus {
		session_id: String,
		status: SessionStatus,
	},
	#[error("Timed out after {seconds}s: {what}")]
	Timeout { what: String, seconds: u64 },
	#[error("Failed to end session {session_id}: {source}")]
	SessionStop {
		session_id: String,
		source: ClientError,
	},
	#[error("Transaction failed: {0}")]
	Transaction(#[source] ClientError),
	#[error("Search index creation failed: {0}")]
	SearchIndex(String),
	#[error("Failed to create snapshot '{name}': {reason}")]
	SnapshotCreation { name: String, reason: String },
	#[error("Base snapshot '{name}' not ready after {seconds} seconds")]
	SnapshotNotReady { name: String, seconds: u64 },
	#[error("Platform command failed: {0}")]
	Platform(String),
	#[error("I/O error on {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("Background task failed: {0}")]
	Task(String),
	#[error(transparent)]
	Client(#[from] ClientError),
}

impl SeedError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		SeedError::Io {
			path: path.into(),
			source,
		}
	}
}
