//! Integration tests for snapshot resolution
//!
//! These tests verify:
//! - Full and diff seeds end up as snapshots, bases first
//! - Existing and already-processed snapshots short-circuit
//! - Cycles and broken base chains fail before any platform write, also
//!   when the seed file is a symlink
//! - Sessions are stopped exactly once, and never in fire-and-forget mode
//! - Recovery from the "running sessions" snapshot race

mod common;

use std::time::Duration;

use common::{Harness, SeedMode};
use serde_json::json;
use snapseed::{ResolutionContext, ResolveOptions, SeedError, seed_remote};

const CONTEXT: &str = "dojo-staging";

fn options() -> ResolveOptions {
	ResolveOptions::default()
}

/// c.json (full) <- b.json (diff) <- a.json (diff)
fn write_chain(h: &Harness) {
	h.write("seeds/app/c.json", json!({"users": [{"_id": "u1"}]}));
	h.write(
		"seeds/app/b.json",
		json!({"type": "diff", "base_id": "c", "transactions": [{"mutations": []}]}),
	);
	h.write(
		"seeds/app/a.json",
		json!({"type": "diff", "base_id": "b", "transactions": [{"mutations": []}]}),
	);
}

#[tokio::test(start_paused = true)]
async fn test_full_seed_creates_snapshot() {
	let h = Harness::new();
	let path = h.write(
		"seeds/jd/login_flow.json",
		json!({"users": [{"_id": "1", "name": "a"}, {"_id": "2", "name": "b"}]}),
	);
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["jd-login-flow"]);
	assert_eq!(
		h.orchestrator.events(),
		vec!["start:none", "seed:jd-login-flow", "stop:s-1"]
	);
	assert_eq!(
		h.orchestrator.transactions(),
		vec![
			json!({"mutations": [{"type": "delete", "collection": "users", "deletes": [{"query": {}}]}]}),
			json!({"mutations": [{"type": "insert", "collection": "users", "documents": [
				{"_id": "1", "name": "a"}, {"_id": "2", "name": "b"}
			]}]}),
		]
	);
	assert!(h.platform.names().contains("jd-login-flow"));
	assert_eq!(h.platform.contexts(), vec![CONTEXT]);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_idempotent() {
	let h = Harness::new();
	let path = h.write("seeds/jd/login_flow.json", json!({"users": []}));
	let resolver = h.resolver(options());

	seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();
	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["jd-login-flow"]);
	assert_eq!(h.orchestrator.events_with("start:").len(), 1);
	assert_eq!(h.orchestrator.events_with("seed:").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_diff_on_initial_data() {
	let h = Harness::new();
	h.write(
		"jd/app/initial_data.json",
		json!({"products": [{"_id": "p1"}], "type": "full"}),
	);
	h.write("jd/app/indices.json", json!({"indices": [{"collection": "products"}]}));
	let transaction =
		json!({"mutations": [{"type": "insert", "collection": "cart", "documents": [{"_id": "c1"}]}]});
	let path = h.write(
		"seeds/jd/cart.json",
		json!({"type": "diff", "base_id": "initial_data", "transactions": [transaction.clone()]}),
	);
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["jd-cart"]);
	assert_eq!(
		h.orchestrator.events(),
		vec![
			"start:none",
			"create-search-index",
			"seed:jd-initial-data",
			"stop:s-1",
			"start:jd-initial-data",
			"seed:jd-cart",
			"stop:s-2",
		]
	);
	assert_eq!(h.orchestrator.transactions().last(), Some(&transaction));
}

#[tokio::test(start_paused = true)]
async fn test_initial_data_path_sets_app_context() {
	let h = Harness::new();
	let path = h.write("weibo/app/initial_data.json", json!({"posts": []}));
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["weibo-initial-data"]);
}

#[tokio::test(start_paused = true)]
async fn test_bases_are_created_first() {
	let h = Harness::new();
	write_chain(&h);
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &h.root().join("seeds/app/a.json"), CONTEXT, None)
		.await
		.unwrap();

	assert_eq!(names, vec!["app-a"]);
	assert_eq!(
		h.orchestrator.events_with("seed:"),
		vec!["seed:app-c", "seed:app-b", "seed:app-a"]
	);
	assert_eq!(
		h.orchestrator.events_with("start:"),
		vec!["start:none", "start:app-c", "start:app-b"]
	);
}

#[tokio::test(start_paused = true)]
async fn test_existing_base_short_circuits() {
	let h = Harness::new();
	write_chain(&h);
	h.platform.add("app-b", true);
	let resolver = h.resolver(options());

	seed_remote(&resolver, &h.root().join("seeds/app/a.json"), CONTEXT, None)
		.await
		.unwrap();

	assert_eq!(h.orchestrator.events_with("seed:"), vec!["seed:app-a"]);
	assert_eq!(h.orchestrator.events_with("start:"), vec!["start:app-b"]);
}

#[tokio::test(start_paused = true)]
async fn test_directory_shares_processed_snapshots() {
	let h = Harness::new();
	write_chain(&h);
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &h.root().join("seeds/app"), CONTEXT, None)
		.await
		.unwrap();

	assert_eq!(names, vec!["app-a", "app-b", "app-c"]);
	assert_eq!(h.orchestrator.events_with("seed:").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_fails_without_platform_writes() {
	let h = Harness::new();
	h.write(
		"seeds/app/x.json",
		json!({"type": "diff", "base_id": "y", "transactions": []}),
	);
	h.write(
		"seeds/app/y.json",
		json!({"type": "diff", "base_id": "x", "transactions": []}),
	);
	h.platform.add("app-x", true);
	h.platform.add("app-y", true);
	let resolver = h.resolver(ResolveOptions {
		overwrite: true,
		..options()
	});

	let mut ctx = ResolutionContext::new();
	let err = resolver
		.ensure_snapshot_exists(&h.root().join("seeds/app/x.json"), None, None, &mut ctx)
		.await
		.unwrap_err();

	assert!(matches!(err, SeedError::CircularDependency(_)));
	assert!(h.platform.deleted().is_empty());
	assert!(h.orchestrator.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_transaction_stops_session_once() {
	let h = Harness::new();
	*h.orchestrator.fail_transaction.lock().unwrap() = Some(1);
	let path = h.write("seeds/jd/flow.json", json!({"users": [{"_id": "1"}]}));
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap_err();

	assert!(matches!(err, SeedError::Transaction(_)));
	assert_eq!(h.orchestrator.events_with("stop:"), vec!["stop:s-1"]);
	assert!(h.orchestrator.events_with("seed:").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_failure_does_not_mask_error() {
	let h = Harness::new();
	*h.orchestrator.start_status.lock().unwrap() = "FAILED";
	*h.orchestrator.fail_stop.lock().unwrap() = true;
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap_err();

	assert!(matches!(err, SeedError::UnexpectedStatus { .. }));
	assert_eq!(h.orchestrator.events_with("stop:"), vec!["stop:s-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_create_seed_failure_stops_session_once() {
	let h = Harness::new();
	*h.orchestrator.seed_mode.lock().unwrap() = SeedMode::Fail;
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap_err();

	assert!(matches!(err, SeedError::SnapshotCreation { .. }));
	// 500 is retried: max_retries + 1 attempts
	assert_eq!(h.orchestrator.events_with("seed:").len(), 4);
	assert_eq!(h.orchestrator.events_with("stop:"), vec!["stop:s-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_index_stops_session_once() {
	let h = Harness::new();
	h.write("jd/app/indices.json", json!({"indices": [{"collection": "products"}]}));
	h.orchestrator.index_statuses.lock().unwrap().push_back(json!({"indexes": [
		{"collection": "products", "status": "failed"}
	]}));
	let path = h.write("seeds/jd/catalog.json", json!({"products": [{"_id": "p1"}]}));
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap_err();

	let SeedError::SearchIndex(message) = err else {
		panic!("expected search index error, got {:?}", err);
	};
	assert!(message.contains("products"));
	assert_eq!(
		h.orchestrator.events(),
		vec!["start:none", "create-search-index", "stop:s-1"]
	);
	assert!(!h.platform.names().contains("jd-catalog"));
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_symlinked_diff_uses_base_beside_target() {
	let h = Harness::new();
	let target = h.write(
		"shared/x.json",
		json!({"type": "diff", "base_id": "y", "transactions": [{"mutations": []}]}),
	);
	h.write("shared/y.json", json!({"users": [{"_id": "shared"}]}));
	h.write("seeds/jd/y.json", json!({"users": [{"_id": "local"}]}));
	let link = h.root().join("seeds/jd/x.json");
	std::os::unix::fs::symlink(&target, &link).unwrap();
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &link, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["jd-x"]);
	assert_eq!(h.orchestrator.events_with("seed:"), vec!["seed:jd-y", "seed:jd-x"]);
	assert_eq!(
		h.orchestrator.transactions()[1],
		json!({"mutations": [{"type": "insert", "collection": "users", "documents": [{"_id": "shared"}]}]})
	);
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_symlinked_diff_missing_base_fails_before_writes() {
	let h = Harness::new();
	let target = h.write(
		"shared/x.json",
		json!({"type": "diff", "base_id": "y", "transactions": []}),
	);
	h.write("seeds/jd/y.json", json!({"users": []}));
	let link = h.root().join("seeds/jd/x.json");
	std::os::unix::fs::symlink(&target, &link).unwrap();
	h.platform.add("jd-x", true);
	let resolver = h.resolver(ResolveOptions {
		overwrite: true,
		..options()
	});

	let err = seed_remote(&resolver, &link, CONTEXT, None).await.unwrap_err();

	assert!(matches!(err, SeedError::Io { .. }));
	assert!(h.platform.deleted().is_empty());
	assert!(h.orchestrator.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_running_sessions_race_recovers() {
	let h = Harness::new();
	*h.orchestrator.seed_mode.lock().unwrap() = SeedMode::RunningSessionsRace;
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(options());

	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(names, vec!["jd-flow"]);
	// 400 is not retried, and the session is ended by the recovery path only
	assert_eq!(h.orchestrator.events_with("seed:").len(), 1);
	assert_eq!(h.orchestrator.events_with("stop:"), vec!["stop:s-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_running_sessions_race_without_snapshot_fails() {
	let h = Harness::new();
	*h.orchestrator.seed_mode.lock().unwrap() = SeedMode::RunningSessionsLost;
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap_err();

	assert!(matches!(err, SeedError::SnapshotCreation { .. }));
	assert_eq!(h.orchestrator.events_with("stop:"), vec!["stop:s-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_fire_and_forget_never_stops_session() {
	let h = Harness::new();
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(ResolveOptions {
		fire_and_forget: true,
		..options()
	});

	let names = seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();
	tokio::time::sleep(Duration::from_secs(1)).await;

	assert_eq!(names, vec!["jd-flow"]);
	assert_eq!(h.orchestrator.events_with("seed:"), vec!["seed:jd-flow"]);
	assert!(h.orchestrator.events_with("stop:").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fire_and_forget_failure_leaves_session() {
	let h = Harness::new();
	*h.orchestrator.fail_transaction.lock().unwrap() = Some(1);
	let path = h.write("seeds/jd/flow.json", json!({"users": [{"_id": "1"}]}));
	let resolver = h.resolver(ResolveOptions {
		fire_and_forget: true,
		..options()
	});

	assert!(seed_remote(&resolver, &path, CONTEXT, None).await.is_err());
	assert!(h.orchestrator.events_with("stop:").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_overwrite_deletes_snapshot_and_twin() {
	let h = Harness::new();
	h.platform.add("jd-flow", true);
	h.platform.add("meilisearch-jd-flow", true);
	let path = h.write("seeds/jd/flow.json", json!({"users": []}));
	let resolver = h.resolver(ResolveOptions {
		overwrite: true,
		..options()
	});

	seed_remote(&resolver, &path, CONTEXT, None).await.unwrap();

	assert_eq!(h.platform.deleted(), vec!["jd-flow", "meilisearch-jd-flow"]);
	assert_eq!(h.orchestrator.events_with("seed:"), vec!["seed:jd-flow"]);
	assert!(h.platform.names().contains("jd-flow"));
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_touches_nothing() {
	let h = Harness::new();
	write_chain(&h);
	h.platform.add("app-c", true);
	let resolver = h.resolver(ResolveOptions {
		overwrite: true,
		dry_run: true,
		..options()
	});

	let names = seed_remote(&resolver, &h.root().join("seeds/app/a.json"), CONTEXT, None)
		.await
		.unwrap();

	assert_eq!(names, vec!["app-a"]);
	assert!(h.orchestrator.events().is_empty());
	assert!(h.platform.deleted().is_empty());
	assert!(h.platform.contexts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_name_override_needs_single_file() {
	let h = Harness::new();
	write_chain(&h);
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &h.root().join("seeds/app"), CONTEXT, Some("custom"))
		.await
		.unwrap_err();

	assert!(matches!(err, SeedError::NameWithMultipleFiles(3)));
	assert!(h.platform.contexts().is_empty());
	assert!(h.orchestrator.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_name_override_applies_to_top_file_only() {
	let h = Harness::new();
	write_chain(&h);
	let resolver = h.resolver(options());

	let names = seed_remote(
		&resolver,
		&h.root().join("seeds/app/b.json"),
		CONTEXT,
		Some("custom-name"),
	)
	.await
	.unwrap();

	assert_eq!(names, vec!["custom-name"]);
	assert_eq!(
		h.orchestrator.events_with("seed:"),
		vec!["seed:app-c", "seed:custom-name"]
	);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_base_readiness() {
	let h = Harness::new();
	write_chain(&h);
	h.platform.add("app-c", true);
	h.platform.delay_ready("app-c", 3);
	let resolver = h.resolver(options());

	seed_remote(&resolver, &h.root().join("seeds/app/b.json"), CONTEXT, None)
		.await
		.unwrap();

	assert_eq!(h.orchestrator.events_with("seed:"), vec!["seed:app-b"]);
}

#[tokio::test(start_paused = true)]
async fn test_base_never_ready_fails_before_session() {
	let h = Harness::new();
	write_chain(&h);
	h.platform.add("app-c", true);
	h.platform.delay_ready("app-c", usize::MAX);
	let resolver = h.resolver(options());

	let err = seed_remote(&resolver, &h.root().join("seeds/app/b.json"), CONTEXT, None)
		.await
		.unwrap_err();

	assert!(matches!(err, SeedError::SnapshotNotReady { .. }));
	assert!(h.orchestrator.events().is_empty());
}
