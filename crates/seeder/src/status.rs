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

//! Snapshot status report
//!
//! Lists every seed file under `{base}/{app}/*.json`, the state of its
//! snapshot and search index snapshot, and whether the snapshot predates
//! the file's last git commit.

use std::{
	collections::BTreeMap,
	fmt::Write,
	path::{Path, PathBuf},
};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::process::Command;
use tracing::debug;

use crate::error::SeedError;
use crate::platform::{SnapshotInfo, SnapshotPlatform};
use crate::seed_file::{calculate_snapshot_name, meilisearch_snapshot_name};

/// State of one snapshot relative to its seed file
#[derive(Debug, Clone)]
pub struct SnapshotCheck {
	pub name: String,
	pub info: Option<SnapshotInfo>,
	/// Seed file committed after the snapshot was taken
	pub outdated: bool,
}

impl SnapshotCheck {
	fn new(name: String, info: Option<SnapshotInfo>, last_commit: Option<DateTime<Utc>>) -> Self {
		let outdated = match (&info, last_commit) {
			(Some(SnapshotInfo { created_at: Some(created), .. }), Some(commit)) => *created < commit,
			_ => false,
		};
		Self {
			name,
			info,
			outdated,
		}
	}

	pub fn exists(&self) -> bool {
		self.info.is_some()
	}

	pub fn ready(&self) -> bool {
		self.info.as_ref().is_some_and(|info| info.ready_to_use)
	}

	fn age(&self, now: DateTime<Utc>) -> String {
		match self.info.as_ref().and_then(|info| info.created_at) {
			Some(created) => format_age(now - created),
			None => "unknown".to_string(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct FileStatus {
	pub app: String,
	pub file: PathBuf,
	pub last_commit: Option<DateTime<Utc>>,
	pub primary: SnapshotCheck,
	pub meilisearch: SnapshotCheck,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
	pub total: usize,
	pub exists: usize,
	pub missing: usize,
	pub ready: usize,
	pub not_ready: usize,
	pub outdated: usize,
	pub meilisearch_missing: usize,
	pub meilisearch_not_ready: usize,
	pub meilisearch_outdated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
	pub files: Vec<FileStatus>,
}

/// Human-readable age: `Xd Yh`, `Xh Ym` or `Xm`
pub fn format_age(age: TimeDelta) -> String {
	let seconds = age.num_seconds().max(0);
	let days = seconds / 86_400;
	let hours = (seconds % 86_400) / 3_600;
	let minutes = (seconds % 3_600) / 60;

	if days > 0 {
		format!("{}d {}h", days, hours)
	} else if hours > 0 {
		format!("{}h {}m", hours, minutes)
	} else {
		format!("{}m", minutes)
	}
}

/// Seed files per app folder directly under `base_path`
pub fn collect_app_files(base_path: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>, SeedError> {
	if !base_path.exists() {
		return Err(SeedError::InvalidPath(format!(
			"Path does not exist: {}",
			base_path.display()
		)));
	}

	let mut apps = BTreeMap::new();
	let entries = std::fs::read_dir(base_path).map_err(|e| SeedError::io(base_path, e))?;
	for entry in entries {
		let app_dir = entry.map_err(|e| SeedError::io(base_path, e))?.path();
		if !app_dir.is_dir() {
			continue;
		}

		let mut files: Vec<PathBuf> = std::fs::read_dir(&app_dir)
			.map_err(|e| SeedError::io(&app_dir, e))?
			.filter_map(|entry| entry.ok().map(|e| e.path()))
			.filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
			.collect();
		files.sort();

		if !files.is_empty()
			&& let Some(name) = app_dir.file_name()
		{
			apps.insert(name.to_string_lossy().into_owned(), files);
		}
	}

	Ok(apps)
}

/// Author date of the last commit touching `path`, if it is tracked
pub async fn file_last_commit_date(path: &Path) -> Option<DateTime<Utc>> {
	// Run from the file's directory so the file's own repository is used
	let mut command = Command::new("git");
	command.args(["log", "-1", "--format=%aI", "--"]);
	match (path.parent().filter(|dir| !dir.as_os_str().is_empty()), path.file_name()) {
		(Some(dir), Some(name)) => command.arg(name).current_dir(dir),
		_ => command.arg(path),
	};

	let output = command.output().await.ok()?;
	if !output.status.success() {
		debug!(target: "platform", path = %path.display(), "git log failed");
		return None;
	}

	let stdout = String::from_utf8_lossy(&output.stdout);
	let date = stdout.trim();
	if date.is_empty() {
		return None;
	}
	DateTime::parse_from_rfc3339(date)
		.ok()
		.map(|date| date.with_timezone(&Utc))
}

/// Inspect the snapshots of every seed file under `base_path`
///
/// `app_filter` restricts the report to one app folder; an unknown app is
/// an error listing the available ones.
pub async fn check_snapshots(
	platform: &dyn SnapshotPlatform,
	base_path: &Path,
	app_filter: Option<&str>,
) -> Result<StatusReport, SeedError> {
	let mut apps = collect_app_files(base_path)?;

	if let Some(app) = app_filter {
		if !apps.contains_key(app) {
			let available: Vec<&str> = apps.keys().map(String::as_str).collect();
			return Err(SeedError::Config(format!(
				"No app found matching '{}'. Available apps: {}",
				app,
				available.join(", ")
			)));
		}
		apps.retain(|name, _| name == app);
	}

	let mut report = StatusReport::default();
	for (app, files) in apps {
		for file in files {
			let name = calculate_snapshot_name(&file, None);
			let meilisearch_name = meilisearch_snapshot_name(&name);
			let last_commit = file_last_commit_date(&file).await;

			let primary = SnapshotCheck::new(name.clone(), platform.snapshot_info(&name).await?, last_commit);
			let meilisearch = SnapshotCheck::new(
				meilisearch_name.clone(),
				platform.snapshot_info(&meilisearch_name).await?,
				last_commit,
			);

			report.files.push(FileStatus {
				app: app.clone(),
				file,
				last_commit,
				primary,
				meilisearch,
			});
		}
	}

	Ok(report)
}

impl StatusReport {
	pub fn summary(&self) -> StatusSummary {
		let mut summary = StatusSummary::default();

		for status in &self.files {
			summary.total += 1;
			if !status.meilisearch.exists() {
				summary.meilisearch_missing += 1;
			}

			if !status.primary.exists() {
				summary.missing += 1;
				continue;
			}

			summary.exists += 1;
			if status.primary.outdated {
				summary.outdated += 1;
			}
			if status.primary.ready() {
				summary.ready += 1;
			} else {
				summary.not_ready += 1;
			}

			if status.meilisearch.exists() {
				if status.meilisearch.outdated {
					summary.meilisearch_outdated += 1;
				}
				if !status.meilisearch.ready() {
					summary.meilisearch_not_ready += 1;
				}
			}
		}

		summary
	}

	/// Render the report as printed by the `status` command
	pub fn render(&self, now: DateTime<Utc>) -> String {
		let mut out = String::new();
		let rule = "=".repeat(80);
		let thin = "-".repeat(80);

		let mut current_app: Option<&str> = None;
		for status in &self.files {
			if current_app != Some(status.app.as_str()) {
				let _ = writeln!(out, "{}\nApp: {}\n{}", thin, status.app, thin);
				current_app = Some(status.app.as_str());
			}
			render_file(&mut out, status, now);
		}

		let summary = self.summary();
		let percent = |n: usize| {
			if summary.total == 0 {
				0.0
			} else {
				n as f64 / summary.total as f64 * 100.0
			}
		};

		let _ = writeln!(out, "\n{}\nSummary\n{}", rule, rule);
		let _ = writeln!(out, "Total files checked:              {}\n", summary.total);
		let _ = writeln!(out, "Main Snapshots:");
		let _ = writeln!(out, "  Exist:                          {} ({:.1}%)", summary.exists, percent(summary.exists));
		let _ = writeln!(out, "    - Ready:                      {}", summary.ready);
		let _ = writeln!(out, "    - Not ready:                  {}", summary.not_ready);
		let _ = writeln!(out, "    - Outdated:                   {}", summary.outdated);
		let _ = writeln!(out, "  Missing:                        {} ({:.1}%)\n", summary.missing, percent(summary.missing));
		let _ = writeln!(out, "Meilisearch Snapshots:");
		let _ = writeln!(out, "  Missing:                        {}", summary.meilisearch_missing);
		let _ = writeln!(out, "  Not ready:                      {}", summary.meilisearch_not_ready);
		let _ = writeln!(out, "  Outdated:                       {}", summary.meilisearch_outdated);

		let primary: fn(&FileStatus) -> &SnapshotCheck = |s| &s.primary;
		let meilisearch: fn(&FileStatus) -> &SnapshotCheck = |s| &s.meilisearch;
		for (label, check) in [("Snapshots", primary), ("Meilisearch Snapshots", meilisearch)] {
			self.render_section(&mut out, &format!("Missing {}", label), check, |c| !c.exists());
			self.render_section(&mut out, &format!("Not Ready {}", label), check, |c| {
				c.exists() && !c.ready()
			});
			self.render_section(&mut out, &format!("Outdated {}", label), check, |c| c.outdated);
		}

		out
	}

	/// List the snapshots picked by `check` that match `include`, grouped by app
	fn render_section(
		&self,
		out: &mut String,
		title: &str,
		check: fn(&FileStatus) -> &SnapshotCheck,
		include: impl Fn(&SnapshotCheck) -> bool,
	) {
		let mut by_app: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
		for status in &self.files {
			let snapshot = check(status);
			if include(snapshot) {
				by_app
					.entry(status.app.as_str())
					.or_default()
					.push(snapshot.name.as_str());
			}
		}
		if by_app.is_empty() {
			return;
		}

		let count: usize = by_app.values().map(Vec::len).sum();
		let rule = "=".repeat(80);
		let _ = writeln!(out, "\n{}\n{} ({})\n{}", rule, title, count, rule);
		for (app, names) in by_app {
			let _ = writeln!(out, "\n{} ({}):", app, names.len());
			for name in names {
				let _ = writeln!(out, "  - {}", name);
			}
		}
	}
}

fn render_file(out: &mut String, status: &FileStatus, now: DateTime<Utc>) {
	let primary = &status.primary;
	let meilisearch = &status.meilisearch;

	if !primary.exists() {
		let commit = status
			.last_commit
			.map(|date| format!("(last commit: {})", date.format("%Y-%m-%d %H:%M")))
			.unwrap_or_default();
		let _ = writeln!(out, "  x {:60} MISSING {}", primary.name, commit);
		let meili = if meilisearch.exists() { "EXISTS (orphaned)" } else { "MISSING" };
		let _ = writeln!(out, "    meilisearch: {}", meili);
		return;
	}

	let flag = |check: &SnapshotCheck| if check.outdated { " [OUTDATED]" } else { "" };
	let icon = if primary.ready() && !primary.outdated { "ok" } else { "!" };
	let ready = if primary.ready() { "yes" } else { "no" };
	let _ = writeln!(
		out,
		"  {} {:60} EXISTS (age: {}, ready: {}){}",
		icon,
		primary.name,
		primary.age(now),
		ready,
		flag(primary)
	);

	let meili = if !meilisearch.exists() {
		"MISSING".to_string()
	} else if meilisearch.ready() {
		format!("EXISTS (age: {}){}", meilisearch.age(now), flag(meilisearch))
	} else {
		format!("NOT READY (age: {}){}", meilisearch.age(now), flag(meilisearch))
	};
	let _ = writeln!(out, "    meilisearch: {}", meili);
}
