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

//! Command line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Environment;
use crate::resolver::ResolveOptions;

#[derive(Parser, Debug)]
#[command(
	name = "snapseed",
	version,
	about = "Seed session storage and create volume snapshots",
	after_help = "Examples:\n  snapseed remote --path ../jd/app/initial_data.json --env staging\n  snapseed remote --path seeds/jd --env production --overwrite --dry-run\n  snapseed local --path seeds/jd/login_flow.json --url http://localhost:8081\n  snapseed status --path seeds --env staging --app jd\n  snapseed sessions --env staging xhs jd",
	subcommand_required = true,
	arg_required_else_help = true
)]
pub struct RootArgs {
	/// Configuration file layered over the built-in defaults
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	Remote(RemoteArgs),
	Local(LocalArgs),
	Status(StatusArgs),
	Sessions(SessionsArgs),
}

#[derive(Args, Debug)]
#[command(about = "Seed via orchestrator sessions and create snapshots")]
pub struct RemoteArgs {
	/// Seed JSON file, or a folder of seed files
	#[arg(long, value_name = "JSON_FILE_OR_FOLDER")]
	pub path: PathBuf,

	#[arg(long, value_enum)]
	pub env: Environment,

	/// Override the snapshot name (single JSON file only)
	#[arg(long, value_name = "NAME")]
	pub name: Option<String>,

	/// Delete and recreate every snapshot in the dependency chain
	#[arg(long)]
	pub overwrite: bool,

	/// Show what would be done without creating or deleting snapshots
	#[arg(long)]
	pub dry_run: bool,

	/// Move on right after requesting snapshot creation
	#[arg(long)]
	pub fire_and_forget: bool,
}

impl RemoteArgs {
	pub fn options(&self) -> ResolveOptions {
		ResolveOptions {
			overwrite: self.overwrite,
			dry_run: self.dry_run,
			fire_and_forget: self.fire_and_forget,
		}
	}
}

#[derive(Args, Debug)]
#[command(about = "Seed a local storage service directly")]
pub struct LocalArgs {
	/// Seed JSON file
	#[arg(long, value_name = "JSON_FILE")]
	pub path: PathBuf,

	/// URL of the storage service to seed
	#[arg(long, value_name = "URL")]
	pub url: String,
}

#[derive(Args, Debug)]
#[command(about = "Report snapshot state for every seed file")]
pub struct StatusArgs {
	/// Folder holding one sub-folder of seed files per app
	#[arg(long, value_name = "DIR")]
	pub path: PathBuf,

	#[arg(long, value_enum)]
	pub env: Environment,

	/// Only report this app
	#[arg(long, value_name = "APP")]
	pub app: Option<String>,
}

#[derive(Args, Debug)]
#[command(about = "Start persistent sessions from default snapshots")]
pub struct SessionsArgs {
	#[arg(long, value_enum)]
	pub env: Environment,

	/// Apps to start sessions for (all when omitted)
	#[arg(value_name = "TARGET")]
	pub targets: Vec<String>,
}
