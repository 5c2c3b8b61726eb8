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

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::{DEFAULT_RETRY_OPTIONS, RetryOptions, fetch_with_retry};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::types::{
	CreateSearchIndexRequest, CreateSeedRequest, Mutation, MutationBatch, SearchIndexStatusResponse,
	SeedResponse, SessionResponse, SessionStatus, StartSessionRequest, StatusResponse,
};

/// Retry profile for snapshot creation, which triggers a slow volume operation
pub const CREATE_SEED_RETRY_OPTIONS: RetryOptions = RetryOptions {
	max_retries: 3,
	base_delay_ms: 2_000,
	max_delay_ms: 15_000,
};

/// Timeout for a single snapshot creation attempt
pub const CREATE_SEED_TIMEOUT: Duration = Duration::from_secs(180);

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("HTTP {status}: {body}")]
	Status { status: u16, body: String },
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

impl ClientError {
	/// HTTP status of a non-success response, if this error carries one
	pub fn status(&self) -> Option<u16> {
		match self {
			ClientError::Status { status, .. } => Some(*status),
			_ => None,
		}
	}

	pub fn body(&self) -> Option<&str> {
		match self {
			ClientError::Status { body, .. } => Some(body),
			_ => None,
		}
	}
}

/// Client for the orchestrator's session collection
///
/// All calls go through [`fetch_with_retry`]; non-success responses that
/// survive the retry layer are surfaced as [`ClientError::Status`].
#[derive(Clone)]
pub struct OrchestratorClient {
	base_url: String,
	api_key: Option<String>,
	transport: Arc<dyn Transport>,
}

impl OrchestratorClient {
	/// Create a new client with the given base URL and transport
	pub fn new(
		base_url: impl Into<String>,
		api_key: Option<String>,
		transport: Arc<dyn Transport>,
	) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_key,
			transport,
		}
	}

	/// Create a new client backed by reqwest
	pub fn with_reqwest(
		base_url: impl Into<String>,
		api_key: Option<String>,
	) -> Result<Self, ClientError> {
		let transport = ReqwestTransport::new()?;
		Ok(Self::new(base_url, api_key, Arc::new(transport)))
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Endpoint for a running session
	pub fn session(&self, session_id: &str) -> SessionEndpoint {
		SessionEndpoint::new(
			format!("{}/{}", self.base_url, session_id),
			self.api_key.clone(),
			self.transport.clone(),
		)
	}

	/// Start a session and return its ID
	pub async fn start_session(&self, request: &StartSessionRequest) -> Result<String, ClientError> {
		let http = HttpRequest::post(&self.base_url)
			.bearer(self.api_key.as_deref())
			.json(request)?;

		let response = fetch_with_retry(self.transport.as_ref(), &http, DEFAULT_RETRY_OPTIONS)
			.await?
			.error_for_status()?;

		let session: SessionResponse = response.json()?;
		Ok(session.session_id)
	}

	/// Current status of a session
	pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ClientError> {
		self.session(session_id).status().await
	}

	/// Materialize the session's volume as a snapshot named `name`
	///
	/// The raw failure is returned so callers can recognize platform races
	/// from the status and body.
	pub async fn create_seed(
		&self,
		session_id: &str,
		name: &str,
	) -> Result<SeedResponse, ClientError> {
		let http = self.create_seed_request(session_id, name)?;

		let response = fetch_with_retry(self.transport.as_ref(), &http, CREATE_SEED_RETRY_OPTIONS)
			.await?
			.error_for_status()?;

		response.json()
	}

	/// Submit snapshot creation without waiting for the outcome
	///
	/// The request runs on a detached task whose handle is dropped; its
	/// result is only logged.
	pub fn create_seed_detached(&self, session_id: &str, name: &str) -> Result<(), ClientError> {
		let http = self.create_seed_request(session_id, name)?;
		let transport = self.transport.clone();
		let name = name.to_string();

		tokio::spawn(async move {
			match transport.send(&http).await {
				Ok(response) if response.is_success() => {
					debug!(target: "http", snapshot = %name, "Detached seed creation accepted");
				}
				Ok(HttpResponse { status, body }) => {
					warn!(target: "http", snapshot = %name, status, body = %body, "Detached seed creation rejected");
				}
				Err(e) => {
					warn!(target: "http", snapshot = %name, error = %e, "Detached seed creation failed");
				}
			}
		});

		Ok(())
	}

	/// Stop a session
	pub async fn stop_session(&self, session_id: &str) -> Result<(), ClientError> {
		let http = HttpRequest::post(format!("{}/{}/stop", self.base_url, session_id))
			.bearer(self.api_key.as_deref())
			.json(&json!({}))?;

		fetch_with_retry(self.transport.as_ref(), &http, DEFAULT_RETRY_OPTIONS)
			.await?
			.error_for_status()?;

		Ok(())
	}

	fn create_seed_request(&self, session_id: &str, name: &str) -> Result<HttpRequest, ClientError> {
		let body = CreateSeedRequest {
			session_id: session_id.to_string(),
			name: name.to_string(),
		};

		Ok(HttpRequest::post(format!("{}/create_seed", self.base_url))
			.bearer(self.api_key.as_deref())
			.timeout(CREATE_SEED_TIMEOUT)
			.json(&body)?)
	}
}

/// Data-plane endpoint of a single storage session
///
/// Remote sessions live under `{base}/{session_id}`; a local storage
/// service is addressed directly by its URL.
#[derive(Clone)]
pub struct SessionEndpoint {
	url: String,
	api_key: Option<String>,
	transport: Arc<dyn Transport>,
}

impl SessionEndpoint {
	pub fn new(url: impl Into<String>, api_key: Option<String>, transport: Arc<dyn Transport>) -> Self {
		Self {
			url: url.into().trim_end_matches('/').to_string(),
			api_key,
			transport,
		}
	}

	/// Endpoint for a storage service reached without an orchestrator
	pub fn local(url: impl Into<String>) -> Result<Self, ClientError> {
		let transport = ReqwestTransport::new()?;
		Ok(Self::new(url, None, Arc::new(transport)))
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub async fn status(&self) -> Result<SessionStatus, ClientError> {
		let response = self.get("status").await?.error_for_status()?;
		let status: StatusResponse = response.json()?;
		Ok(status.status)
	}

	/// Apply a batch of mutations atomically
	pub async fn send_batch(&self, mutations: &[Mutation]) -> Result<(), ClientError> {
		let body = MutationBatch {
			mutations: mutations.to_vec(),
		};
		self.post("transaction", &body)
			.await?
			.error_for_status()?;
		Ok(())
	}

	/// Apply a pre-recorded transaction object verbatim
	pub async fn send_transaction(&self, transaction: &Value) -> Result<(), ClientError> {
		self.post("transaction", transaction)
			.await?
			.error_for_status()?;
		Ok(())
	}

	/// Start asynchronous search index creation
	pub async fn create_search_index(&self, indexes: &[Value]) -> Result<(), ClientError> {
		let body = CreateSearchIndexRequest {
			indexes: indexes.to_vec(),
		};
		self.post("create-search-index", &body)
			.await?
			.error_for_status()?;
		Ok(())
	}

	pub async fn search_index_status(&self) -> Result<SearchIndexStatusResponse, ClientError> {
		let response = self.get("search-index-status").await?.error_for_status()?;
		response.json()
	}

	async fn get(&self, path: &str) -> Result<HttpResponse, ClientError> {
		let http =
			HttpRequest::get(format!("{}/{}", self.url, path)).bearer(self.api_key.as_deref());
		fetch_with_retry(self.transport.as_ref(), &http, DEFAULT_RETRY_OPTIONS).await
	}

	async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<HttpResponse, ClientError> {
		let http = HttpRequest::post(format!("{}/{}", self.url, path))
			.bearer(self.api_key.as_deref())
			.json(body)?;
		fetch_with_retry(self.transport.as_ref(), &http, DEFAULT_RETRY_OPTIONS).await
	}
}
