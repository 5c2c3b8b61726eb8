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

//! Bounded exponential-backoff retry
//!
//! This is the only fault-tolerance layer for network calls. Callers above
//! it interpret the final response and never retry on their own.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::ClientError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Retry configuration for a single logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
	/// Retries after the first attempt
	pub max_retries: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}

pub const DEFAULT_RETRY_OPTIONS: RetryOptions = RetryOptions {
	max_retries: 3,
	base_delay_ms: 1_000,
	max_delay_ms: 10_000,
};

impl Default for RetryOptions {
	fn default() -> Self {
		DEFAULT_RETRY_OPTIONS
	}
}

impl RetryOptions {
	/// Delay before the retry that follows `attempt` (zero-based)
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
		let delay_ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
		Duration::from_millis(delay_ms)
	}
}

/// Send `request`, retrying transport errors, 429 and 5xx responses.
///
/// On the last attempt a retryable response is returned as-is and a
/// transport error is propagated. Any other status is returned immediately.
pub async fn fetch_with_retry(
	transport: &dyn Transport,
	request: &HttpRequest,
	options: RetryOptions,
) -> Result<HttpResponse, ClientError> {
	let mut attempt: u32 = 0;

	loop {
		let is_last = attempt >= options.max_retries;

		match transport.send(request).await {
			Ok(response) => {
				if response.is_success() || !response.is_retryable() || is_last {
					return Ok(response);
				}

				let delay = options.delay_for(attempt);
				warn!(
					target: "http",
					method = request.method.as_str(),
					url = %request.url,
					status = response.status,
					delay_ms = delay.as_millis() as u64,
					"Request failed with status {}, retrying (attempt {}/{})",
					response.status,
					attempt + 1,
					options.max_retries
				);
				tokio::time::sleep(delay).await;
			}
			Err(e) => {
				if is_last {
					return Err(e);
				}

				let delay = options.delay_for(attempt);
				warn!(
					target: "http",
					method = request.method.as_str(),
					url = %request.url,
					error = %e,
					delay_ms = delay.as_millis() as u64,
					"Request failed, retrying (attempt {}/{})",
					attempt + 1,
					options.max_retries
				);
				tokio::time::sleep(delay).await;
			}
		}

		attempt += 1;
	}
}
