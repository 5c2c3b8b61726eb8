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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session status as reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
	Queued,
	Running,
	Locked,
	Terminated,
	Failed,
	#[serde(other)]
	Unknown,
}

impl SessionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			SessionStatus::Queued => "QUEUED",
			SessionStatus::Running => "RUNNING",
			SessionStatus::Locked => "LOCKED",
			SessionStatus::Terminated => "TERMINATED",
			SessionStatus::Failed => "FAILED",
			SessionStatus::Unknown => "UNKNOWN",
		}
	}
}

impl std::fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Request to start a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
	/// Volume snapshot the session is forked from (fresh volume if absent)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub snapshot_name: Option<String>,
	/// Keep the session alive until explicitly stopped
	#[serde(skip_serializing_if = "std::ops::Not::not", default)]
	pub persistent: bool,
}

/// Response from starting a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
	pub session_id: String,
}

/// Response from the session status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
	pub status: SessionStatus,
}

/// Request to materialize a session's volume as a named snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSeedRequest {
	pub session_id: String,
	pub name: String,
}

/// Response from snapshot creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedResponse {
	pub seed_id: String,
}

/// Filter selecting the documents a delete mutation removes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteFilter {
	pub query: Value,
}

impl DeleteFilter {
	/// Filter matching every document in a collection
	pub fn all() -> Self {
		Self {
			query: Value::Object(Default::default()),
		}
	}
}

/// A single storage mutation
///
/// Mutations sent in one transaction call are applied atomically by
/// the session; nothing above that is transactional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mutation {
	Insert {
		collection: String,
		documents: Vec<Value>,
	},
	Delete {
		collection: String,
		deletes: Vec<DeleteFilter>,
	},
	Index {
		collection: String,
		index: Value,
	},
}

impl Mutation {
	pub fn collection(&self) -> &str {
		match self {
			Mutation::Insert { collection, .. }
			| Mutation::Delete { collection, .. }
			| Mutation::Index { collection, .. } => collection,
		}
	}
}

/// Body of a batched transaction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationBatch {
	pub mutations: Vec<Mutation>,
}

/// Request to build search indexes inside a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSearchIndexRequest {
	pub indexes: Vec<Value>,
}

/// Build state of a single search index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
	Pending,
	InProgress,
	Completed,
	Failed,
	#[serde(other)]
	#[default]
	Unknown,
}

/// Status of one search index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
	#[serde(default)]
	pub collection: Option<String>,
	#[serde(default)]
	pub status: IndexState,
}

/// Response from the search index status endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchIndexStatusResponse {
	#[serde(default)]
	pub indexes: Vec<IndexStatus>,
}
