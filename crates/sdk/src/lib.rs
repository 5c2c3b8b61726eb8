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

//! Snapseed SDK - Client library for the session orchestrator
//!
//! This crate provides typed client interfaces for the orchestrator's
//! session API, shared request/response structures, and the retrying
//! HTTP layer every outbound call goes through.
//!
//! The SDK is designed to be lightweight and embeddable:
//! - No background threads (except detached fire-and-forget requests)
//! - No runtime initialization
//! - No environment or configuration loading

pub mod client;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{ClientError, OrchestratorClient, SessionEndpoint};
pub use retry::{DEFAULT_RETRY_OPTIONS, RetryOptions, fetch_with_retry};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use types::*;
