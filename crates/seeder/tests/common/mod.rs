//! Shared fakes for seeder integration tests
//!
//! `FakeOrchestrator` answers the session API in memory and records every
//! call as a short event string; `FakePlatform` keeps volume snapshots in a
//! map. Snapshot creation through the orchestrator lands in the platform,
//! so the resolver sees the snapshots it created.

#![allow(dead_code)]

use std::{
	collections::{HashMap, HashSet, VecDeque},
	path::PathBuf,
	sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use snapseed::{
	ResolveOptions, SeedConfig, SeedError, SnapshotInfo, SnapshotPlatform, SnapshotResolver,
};
use snapseed_sdk::{ClientError, HttpRequest, HttpResponse, OrchestratorClient, Transport};
use tempfile::TempDir;

pub const BASE: &str = "http://orchestrator.test/api/v1/session";

/// How `create_seed` answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
	Succeed,
	/// 400 "running sessions", but the snapshot and its twin appear anyway
	RunningSessionsRace,
	/// 400 "running sessions" and nothing appears
	RunningSessionsLost,
	/// 500 on every attempt
	Fail,
}

#[derive(Default)]
struct OrchestratorState {
	events: Vec<String>,
	next_session: u32,
	/// Status polls left per session before it reports RUNNING
	queued_polls: HashMap<String, usize>,
	/// Status polls left per session before it stops reporting LOCKED
	locked_polls: HashMap<String, usize>,
	transactions: Vec<Value>,
	transaction_calls: usize,
}

pub struct FakeOrchestrator {
	state: Mutex<OrchestratorState>,
	platform: Arc<FakePlatform>,
	pub seed_mode: Mutex<SeedMode>,
	/// Fail the transaction call with this 1-based index
	pub fail_transaction: Mutex<Option<usize>>,
	/// Status reported after the QUEUED polls instead of RUNNING
	pub start_status: Mutex<&'static str>,
	pub fail_stop: Mutex<bool>,
	/// Answers to `search-index-status` in order; every index completed
	/// once exhausted
	pub index_statuses: Mutex<VecDeque<Value>>,
	pub queued_polls: usize,
	pub locked_polls: usize,
}

impl FakeOrchestrator {
	pub fn new(platform: Arc<FakePlatform>) -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(OrchestratorState::default()),
			platform,
			seed_mode: Mutex::new(SeedMode::Succeed),
			fail_transaction: Mutex::new(None),
			start_status: Mutex::new("RUNNING"),
			fail_stop: Mutex::new(false),
			index_statuses: Mutex::new(VecDeque::new()),
			queued_polls: 1,
			locked_polls: 1,
		})
	}

	/// Calls in order, e.g. `start:jd-initial-data`, `seed:jd-flow`, `stop:s-1`
	pub fn events(&self) -> Vec<String> {
		self.state.lock().unwrap().events.clone()
	}

	pub fn events_with(&self, prefix: &str) -> Vec<String> {
		self.events()
			.into_iter()
			.filter(|e| e.starts_with(prefix))
			.collect()
	}

	/// Bodies of every transaction call, in order
	pub fn transactions(&self) -> Vec<Value> {
		self.state.lock().unwrap().transactions.clone()
	}

	fn handle(&self, request: &HttpRequest) -> HttpResponse {
		let path = request.url.strip_prefix(BASE).unwrap_or(&request.url);
		let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
		let body = request.body.clone().unwrap_or(Value::Null);
		let mut state = self.state.lock().unwrap();

		match segments.as_slice() {
			[""] => {
				state.next_session += 1;
				let id = format!("s-{}", state.next_session);
				let base = body["snapshot_name"].as_str().unwrap_or("none").to_string();
				let kind = if body["persistent"] == Value::Bool(true) {
					"persistent"
				} else {
					"start"
				};
				state.events.push(format!("{}:{}", kind, base));
				state.queued_polls.insert(id.clone(), self.queued_polls);
				HttpResponse::new(200, format!(r#"{{"session_id":"{}"}}"#, id))
			}
			["create_seed"] => {
				let name = body["name"].as_str().unwrap_or_default().to_string();
				let session_id = body["session_id"].as_str().unwrap_or_default().to_string();
				state.events.push(format!("seed:{}", name));

				match *self.seed_mode.lock().unwrap() {
					SeedMode::Succeed => {
						self.platform.add(&name, true);
						state.locked_polls.insert(session_id, self.locked_polls);
						HttpResponse::new(200, format!(r#"{{"seed_id":"{}"}}"#, name))
					}
					SeedMode::RunningSessionsRace => {
						self.platform.add(&name, true);
						self.platform.add(&format!("meilisearch-{}", name), true);
						state.locked_polls.insert(session_id, self.locked_polls);
						HttpResponse::new(400, "cannot snapshot volume with running sessions")
					}
					SeedMode::RunningSessionsLost => {
						HttpResponse::new(400, "cannot snapshot volume with running sessions")
					}
					SeedMode::Fail => HttpResponse::new(500, "snapshot controller unavailable"),
				}
			}
			[id, "status"] => {
				let id = id.to_string();
				if let Some(left) = state.queued_polls.get_mut(&id)
					&& *left > 0
				{
					*left -= 1;
					return HttpResponse::new(200, r#"{"status":"QUEUED"}"#);
				}
				if let Some(left) = state.locked_polls.get_mut(&id)
					&& *left > 0
				{
					*left -= 1;
					return HttpResponse::new(200, r#"{"status":"LOCKED"}"#);
				}
				if state.locked_polls.contains_key(&id) {
					return HttpResponse::new(200, r#"{"status":"RUNNING"}"#);
				}
				let status = *self.start_status.lock().unwrap();
				HttpResponse::new(200, format!(r#"{{"status":"{}"}}"#, status))
			}
			[_, "transaction"] => {
				state.transaction_calls += 1;
				if *self.fail_transaction.lock().unwrap() == Some(state.transaction_calls) {
					return HttpResponse::new(400, "invalid mutation");
				}
				state.transactions.push(body);
				HttpResponse::new(200, "{}")
			}
			[_, "create-search-index"] => {
				state.events.push("create-search-index".to_string());
				HttpResponse::new(200, "{}")
			}
			[_, "search-index-status"] => HttpResponse::new(
				200,
				r#"{"indexes":[{"collection":"products","status":"completed"}]}"#,
			),
			[id, "stop"] => {
				state.events.push(format!("stop:{}", id));
				if *self.fail_stop.lock().unwrap() {
					return HttpResponse::new(404, "no such session");
				}
				HttpResponse::new(200, "{}")
			}
			_ => HttpResponse::new(404, "not found"),
		}
	}
}

#[async_trait]
impl Transport for FakeOrchestrator {
	async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
		Ok(self.handle(request))
	}
}

/// In-memory volume snapshots
#[derive(Default)]
pub struct FakePlatform {
	snapshots: Mutex<HashMap<String, SnapshotInfo>>,
	deleted: Mutex<Vec<String>>,
	contexts: Mutex<Vec<String>>,
	/// Snapshots that report not ready for this many checks
	not_ready_checks: Mutex<HashMap<String, usize>>,
}

impl FakePlatform {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn add(&self, name: &str, ready: bool) {
		self.snapshots.lock().unwrap().insert(
			name.to_string(),
			SnapshotInfo {
				name: name.to_string(),
				ready_to_use: ready,
				created_at: None,
			},
		);
	}

	pub fn delay_ready(&self, name: &str, checks: usize) {
		self.not_ready_checks
			.lock()
			.unwrap()
			.insert(name.to_string(), checks);
	}

	pub fn names(&self) -> HashSet<String> {
		self.snapshots.lock().unwrap().keys().cloned().collect()
	}

	pub fn deleted(&self) -> Vec<String> {
		self.deleted.lock().unwrap().clone()
	}

	pub fn contexts(&self) -> Vec<String> {
		self.contexts.lock().unwrap().clone()
	}
}

#[async_trait]
impl SnapshotPlatform for FakePlatform {
	async fn snapshot_info(&self, name: &str) -> Result<Option<SnapshotInfo>, SeedError> {
		let mut info = self.snapshots.lock().unwrap().get(name).cloned();
		let mut delays = self.not_ready_checks.lock().unwrap();
		if let Some(left) = delays.get_mut(name)
			&& *left > 0
		{
			*left -= 1;
			if let Some(info) = info.as_mut() {
				info.ready_to_use = false;
			}
		}
		Ok(info)
	}

	async fn delete_snapshot(&self, name: &str) -> Result<(), SeedError> {
		self.snapshots.lock().unwrap().remove(name);
		self.deleted.lock().unwrap().push(name.to_string());
		Ok(())
	}

	async fn switch_context(&self, context: &str) -> Result<(), SeedError> {
		self.contexts.lock().unwrap().push(context.to_string());
		Ok(())
	}
}

/// Seed file tree plus fakes wired to a config rooted in a temp dir
///
/// Layout mirrors a checkout: `{root}/scripts` is the base directory and
/// initial data lives at `{root}/{app}/app/initial_data.json`.
pub struct Harness {
	pub dir: TempDir,
	pub platform: Arc<FakePlatform>,
	pub orchestrator: Arc<FakeOrchestrator>,
	pub config: SeedConfig,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_orchestrator(|_| {})
	}

	/// Build with adjusted orchestrator poll counts
	pub fn with_orchestrator(adjust: impl FnOnce(&mut FakeOrchestrator)) -> Self {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join("scripts")).unwrap();

		let platform = FakePlatform::new();
		let mut orchestrator = FakeOrchestrator {
			state: Mutex::new(OrchestratorState::default()),
			platform: platform.clone(),
			seed_mode: Mutex::new(SeedMode::Succeed),
			fail_transaction: Mutex::new(None),
			start_status: Mutex::new("RUNNING"),
			fail_stop: Mutex::new(false),
			index_statuses: Mutex::new(VecDeque::new()),
			queued_polls: 1,
			locked_polls: 1,
		};
		adjust(&mut orchestrator);

		let config = SeedConfig {
			base_dir: dir.path().join("scripts"),
			..SeedConfig::default()
		};

		Self {
			dir,
			platform,
			orchestrator: Arc::new(orchestrator),
			config,
		}
	}

	pub fn root(&self) -> PathBuf {
		self.dir.path().to_path_buf()
	}

	/// Write a seed file relative to the temp root
	pub fn write(&self, relative: &str, content: Value) -> PathBuf {
		let path = self.dir.path().join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap();
		}
		std::fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
		path
	}

	pub fn client(&self) -> OrchestratorClient {
		OrchestratorClient::new(BASE, Some("test-key".to_string()), self.orchestrator.clone())
	}

	pub fn resolver(&self, options: ResolveOptions) -> SnapshotResolver {
		SnapshotResolver::new(
			self.client(),
			self.platform.clone(),
			self.config.clone(),
			options,
		)
	}
}
