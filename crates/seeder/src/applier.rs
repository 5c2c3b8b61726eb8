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

//! Mutation batch applier
//!
//! A full seed wipes every collection it names and re-inserts the
//! documents. Each HTTP call is atomic on the session side; a failed call
//! aborts the seed but earlier calls stay applied.

use serde_json::Value;
use snapseed_sdk::{Mutation, SessionEndpoint, types::DeleteFilter};
use tokio::task::JoinSet;
use tracing::info;

use crate::error::SeedError;
use crate::seed_file::FullSeed;

/// Documents per insert mutation
pub const DOCUMENTS_PER_MUTATION: usize = 5;

/// Mutations per transaction call
pub const MUTATIONS_PER_BATCH: usize = 5;

/// Insert batches in flight at once
pub const PARALLEL_BATCHES: usize = 20;

const PROGRESS_EVERY: usize = 100;

/// Transaction calls needed to apply a full seed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullSeedPlan {
	pub delete_batches: Vec<Vec<Mutation>>,
	pub insert_batches: Vec<Vec<Mutation>>,
}

impl FullSeedPlan {
	pub fn delete_mutations(&self) -> usize {
		self.delete_batches.iter().map(Vec::len).sum()
	}

	pub fn insert_mutations(&self) -> usize {
		self.insert_batches.iter().map(Vec::len).sum()
	}
}

/// Split a full seed into delete and insert batches
pub fn plan_full_seed(seed: &FullSeed) -> FullSeedPlan {
	let mut deletes = Vec::new();
	let mut inserts = Vec::new();

	for collection in &seed.collections {
		deletes.push(Mutation::Delete {
			collection: collection.name.clone(),
			deletes: vec![DeleteFilter::all()],
		});

		for documents in collection.documents.chunks(DOCUMENTS_PER_MUTATION) {
			inserts.push(Mutation::Insert {
				collection: collection.name.clone(),
				documents: documents.to_vec(),
			});
		}
	}

	FullSeedPlan {
		delete_batches: into_batches(deletes),
		insert_batches: into_batches(inserts),
	}
}

fn into_batches(mutations: Vec<Mutation>) -> Vec<Vec<Mutation>> {
	mutations
		.chunks(MUTATIONS_PER_BATCH)
		.map(<[Mutation]>::to_vec)
		.collect()
}

/// Wipe and re-insert every collection of a full seed
///
/// Deletes go first, one call at a time. Inserts run in groups of
/// [`PARALLEL_BATCHES`] concurrent calls; a group starts only after the
/// previous one finished.
pub async fn apply_full_seed(endpoint: &SessionEndpoint, seed: &FullSeed) -> Result<(), SeedError> {
	let plan = plan_full_seed(seed);

	let total_deletes = plan.delete_batches.len();
	info!(
		target: "applier",
		"Sending {} delete mutations in {} batches",
		plan.delete_mutations(),
		total_deletes
	);
	for (i, batch) in plan.delete_batches.iter().enumerate() {
		endpoint
			.send_batch(batch)
			.await
			.map_err(SeedError::Transaction)?;

		let completed = i + 1;
		if completed % PROGRESS_EVERY == 0 || completed == total_deletes {
			info!(target: "applier", "Delete batches completed: {}/{}", completed, total_deletes);
		}
	}

	let total_inserts = plan.insert_batches.len();
	info!(
		target: "applier",
		"Sending {} insert mutations in {} batches ({} parallel)",
		plan.insert_mutations(),
		total_inserts,
		PARALLEL_BATCHES
	);

	let mut completed = 0;
	for group in plan.insert_batches.chunks(PARALLEL_BATCHES) {
		let mut tasks = JoinSet::new();
		for batch in group {
			let endpoint = endpoint.clone();
			let batch = batch.clone();
			tasks.spawn(async move { endpoint.send_batch(&batch).await });
		}

		// Returning early drops the set, which aborts the rest of the group
		while let Some(joined) = tasks.join_next().await {
			joined
				.map_err(|e| SeedError::Task(e.to_string()))?
				.map_err(SeedError::Transaction)?;
		}

		let previous = completed;
		completed += group.len();
		if completed == total_inserts || previous / PROGRESS_EVERY < completed / PROGRESS_EVERY {
			info!(target: "applier", "Insert batches completed: {}/{}", completed, total_inserts);
		}
	}

	Ok(())
}

/// Replay recorded transactions in order, one call each
pub async fn apply_transactions(
	endpoint: &SessionEndpoint,
	transactions: &[Value],
) -> Result<(), SeedError> {
	let total = transactions.len();
	info!(target: "applier", "Applying {} transactions", total);

	for (i, transaction) in transactions.iter().enumerate() {
		endpoint
			.send_transaction(transaction)
			.await
			.map_err(SeedError::Transaction)?;

		let completed = i + 1;
		if completed % PROGRESS_EVERY == 0 || completed == total {
			info!(target: "applier", "Transactions completed: {}/{}", completed, total);
		}
	}

	Ok(())
}
