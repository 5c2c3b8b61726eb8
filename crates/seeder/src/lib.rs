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

//! Snapseed seeder
//!
//! This crate seeds session-backed storage from JSON seed files and turns
//! the result into named volume snapshots through the orchestrator.
//!
//! Architecture:
//! - Seed files are either full datasets or diffs against a base seed
//! - The resolver builds base snapshots first, recursively, and skips
//!   snapshots that already exist
//! - Each snapshot is built in its own session, which is always stopped
//!   unless snapshot creation was fired and forgotten
//! - Snapshot existence and readiness come from the platform (kubectl)

pub mod applier;
pub mod cli;
pub mod config;
pub mod error;
pub mod indices;
pub mod local;
pub mod logging;
pub mod platform;
pub mod resolver;
pub mod seed_file;
pub mod session;
pub mod sessions;
pub mod status;

pub use config::{Environment, SeedConfig};
pub use error::SeedError;
pub use platform::{KubectlPlatform, SnapshotInfo, SnapshotPlatform};
pub use resolver::{ResolutionContext, ResolveOptions, SnapshotResolver, seed_remote};
pub use seed_file::{SeedFile, calculate_snapshot_name};
pub use session::SessionLifecycle;
