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

//! Seed files and snapshot naming
//!
//! A seed file is either a full dataset (collection -> documents) or a diff
//! against a base seed (`{"type": "diff", "base_id", "transactions"}`).

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::config::{INITIAL_DATA_SPECIAL_ID, MEILISEARCH_SNAPSHOT_PREFIX, SeedConfig};
use crate::error::SeedError;

/// Reserved top-level key marking the seed type
const TYPE_KEY: &str = "type";
const DIFF_TYPE: &str = "diff";
const INITIAL_DATA_FILE: &str = "initial_data.json";

/// One collection of a full seed, replaced wholesale
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
	pub name: String,
	/// Empty when the file holds no array for this collection; the
	/// collection is still wiped
	pub documents: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullSeed {
	/// Collections in file order
	pub collections: Vec<Collection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffSeed {
	pub base_id: String,
	/// Recorded transactions, forwarded verbatim and in order
	pub transactions: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeedFile {
	Full(FullSeed),
	Diff(DiffSeed),
}

impl SeedFile {
	/// Read and parse a seed file
	pub fn load(path: &Path) -> Result<Self, SeedError> {
		let content = std::fs::read_to_string(path).map_err(|e| SeedError::io(path, e))?;
		let value: Value =
			serde_json::from_str(&content).map_err(|e| SeedError::InvalidSeedFile {
				path: path.to_path_buf(),
				reason: e.to_string(),
			})?;
		Self::from_value(path, value)
	}

	pub fn from_value(path: &Path, value: Value) -> Result<Self, SeedError> {
		let invalid = |reason: &str| SeedError::InvalidSeedFile {
			path: path.to_path_buf(),
			reason: reason.to_string(),
		};

		let Value::Object(map) = value else {
			return Err(invalid("top-level value must be an object"));
		};

		if map.get(TYPE_KEY).and_then(Value::as_str) == Some(DIFF_TYPE) {
			let base_id = map
				.get("base_id")
				.and_then(Value::as_str)
				.ok_or_else(|| invalid("diff seed requires a string base_id"))?
				.to_string();
			let transactions = match map.get("transactions") {
				Some(Value::Array(items)) => items.clone(),
				None | Some(Value::Null) => Vec::new(),
				Some(_) => return Err(invalid("transactions must be an array")),
			};
			return Ok(SeedFile::Diff(DiffSeed {
				base_id,
				transactions,
			}));
		}

		let collections = map
			.into_iter()
			.filter(|(name, _)| name != TYPE_KEY)
			.map(|(name, documents)| Collection {
				name,
				documents: match documents {
					Value::Array(items) => items,
					_ => Vec::new(),
				},
			})
			.collect();

		Ok(SeedFile::Full(FullSeed { collections }))
	}
}

/// Make a path absolute and fold `.`/`..` lexically, without touching the
/// filesystem or resolving symlinks
pub fn normalize_path(path: &Path) -> PathBuf {
	let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
	let mut normalized = PathBuf::new();
	for component in absolute.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				normalized.pop();
			}
			other => normalized.push(other.as_os_str()),
		}
	}
	normalized
}

/// Name of the directory containing `path`
pub fn parent_folder_name(path: &Path) -> String {
	normalize_path(path)
		.parent()
		.and_then(Path::file_name)
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_default()
}

/// Snapshot name for a seed file: `{folder}-{stem}` with `_` mapped to `-`
///
/// `folder` is `app_context` when given (initial data files are shared
/// across app folders), otherwise the file's parent directory.
pub fn calculate_snapshot_name(json_path: &Path, app_context: Option<&str>) -> String {
	let path = normalize_path(json_path);
	let stem = path
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default();
	let folder = match app_context {
		Some(app) if !app.is_empty() => app.to_string(),
		_ => parent_folder_name(&path),
	};

	format!("{}-{}", folder, stem).replace('_', "-")
}

/// Name of the search index snapshot paired with `snapshot_name`
pub fn meilisearch_snapshot_name(snapshot_name: &str) -> String {
	format!("{}{}", MEILISEARCH_SNAPSHOT_PREFIX, snapshot_name)
}

/// File a diff seed's `base_id` refers to
///
/// `initial_data` goes through the app mapping; anything else is a sibling
/// file `{base_id}.json` next to the resolved target of `json_path`, so a
/// symlinked diff finds its base beside the real file.
pub fn resolve_base_file_path(
	json_path: &Path,
	base_id: &str,
	app_context: &str,
	config: &SeedConfig,
) -> Result<PathBuf, SeedError> {
	if base_id == INITIAL_DATA_SPECIAL_ID {
		return config.initial_data_path(app_context);
	}

	let resolved = std::fs::canonicalize(json_path).unwrap_or_else(|_| normalize_path(json_path));
	let json_dir = resolved
		.parent()
		.map(Path::to_path_buf)
		.unwrap_or_default();
	Ok(json_dir.join(format!("{}.json", base_id)))
}

/// App context implied by a top-level path
///
/// Initial data files live at `{app}/app/initial_data.json`, so the app is
/// the third-from-last component.
pub fn app_context_for_path(path: &Path) -> Option<String> {
	if path.file_name()? != INITIAL_DATA_FILE {
		return None;
	}
	let parts: Vec<_> = path.iter().collect();
	if parts.len() < 3 {
		return None;
	}
	Some(parts[parts.len() - 3].to_string_lossy().into_owned())
}

fn has_json_extension(path: &Path) -> bool {
	path.extension()
		.map(|ext| ext.eq_ignore_ascii_case("json"))
		.unwrap_or(false)
}

/// Seed files named by `path`: the file itself, or the directory's
/// `*.json` files (non-recursive, sorted)
pub fn collect_json_files(path: &Path) -> Result<Vec<PathBuf>, SeedError> {
	if path.is_file() {
		if !has_json_extension(path) {
			return Err(SeedError::InvalidPath(format!(
				"File must be a JSON file: {}",
				path.display()
			)));
		}
		return Ok(vec![path.to_path_buf()]);
	}

	if path.is_dir() {
		let entries = std::fs::read_dir(path).map_err(|e| SeedError::io(path, e))?;
		let mut files = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|e| SeedError::io(path, e))?;
			let file = entry.path();
			if file.is_file() && has_json_extension(&file) {
				files.push(file);
			}
		}
		files.sort();

		if files.is_empty() {
			return Err(SeedError::InvalidPath(format!(
				"No JSON files found in directory: {}",
				path.display()
			)));
		}
		return Ok(files);
	}

	Err(SeedError::InvalidPath(format!(
		"Path does not exist: {}",
		path.display()
	)))
}
