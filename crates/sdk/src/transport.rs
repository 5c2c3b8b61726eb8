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

//! HTTP transport abstraction
//!
//! Every request the SDK makes is expressed as an [`HttpRequest`] and handed
//! to a [`Transport`]. The production transport is backed by reqwest; tests
//! substitute an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::client::ClientError;

/// Default per-request timeout when a request does not set its own
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Post,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}

/// Outbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
	pub method: Method,
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Option<Value>,
	/// Overrides the transport's default timeout
	pub timeout: Option<Duration>,
}

impl HttpRequest {
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			headers: vec![("Content-Type".to_string(), "application/json".to_string())],
			body: None,
			timeout: None,
		}
	}

	pub fn get(url: impl Into<String>) -> Self {
		Self::new(Method::Get, url)
	}

	pub fn post(url: impl Into<String>) -> Self {
		Self::new(Method::Post, url)
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Attach `Authorization: Bearer` when an API key is configured
	pub fn bearer(self, api_key: Option<&str>) -> Self {
		match api_key {
			Some(key) => self.header("Authorization", format!("Bearer {}", key)),
			None => self,
		}
	}

	pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
		let value = serde_json::to_value(body)
			.map_err(|e| ClientError::Serialization(format!("Failed to encode body: {}", e)))?;
		self.body = Some(value);
		Ok(self)
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

/// Response as seen by the retry layer and the callers above it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
	pub status: u16,
	pub body: String,
}

impl HttpResponse {
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self {
			status,
			body: body.into(),
		}
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// 429 and 5xx are transient and worth another attempt
	pub fn is_retryable(&self) -> bool {
		self.status == 429 || (500..600).contains(&self.status)
	}

	pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
		serde_json::from_str(&self.body)
			.map_err(|e| ClientError::InvalidResponse(format!("Failed to parse response: {}", e)))
	}

	/// Convert a non-success response into a status error
	pub fn error_for_status(self) -> Result<Self, ClientError> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(ClientError::Status {
				status: self.status,
				body: self.body,
			})
		}
	}
}

/// Sends a single HTTP request, without any retrying
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// Transport backed by a shared reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
	client: ReqwestClient,
}

impl ReqwestTransport {
	pub fn new() -> Result<Self, ClientError> {
		Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self, ClientError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self { client })
	}
}

#[async_trait]
impl Transport for ReqwestTransport {
	async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
		let mut builder = match request.method {
			Method::Get => self.client.get(&request.url),
			Method::Post => self.client.post(&request.url),
		};

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(timeout) = request.timeout {
			builder = builder.timeout(timeout);
		}
		if let Some(body) = &request.body {
			builder = builder.json(body);
		}

		let response = builder
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		let status = response.status().as_u16();
		let body = response
			.text()
			.await
			.map_err(|e| ClientError::Network(format!("Failed to read response body: {}", e)))?;

		Ok(HttpResponse { status, body })
	}
}
