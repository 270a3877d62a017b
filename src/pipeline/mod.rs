//! Orchestrator: drives the four stages in sequence over one
//! `RestoreConfig`, fanning each stage out across its independent work units
//! on a local bounded-concurrency pool.

pub mod lister;
pub mod prefix_source;
pub mod restorer;
pub mod selector;
pub mod shuffle;

use std::sync::{Arc, Mutex};

use crate::config::RestoreConfig;
use crate::error::Error;
use crate::io_formats;
use crate::record::{Action, ActionSummary, VersionRecord};
use crate::store::ObjectStore;
use crate::worker;

use lister::{list_prefix, ListedVersion};
use prefix_source::read_prefixes;
use restorer::restore_one;
use selector::{group_by_key, select_all};
use shuffle::{reducer_count_for_prefixes, reducer_count_for_versions, shuffle};

/// Aggregate outcome of one run. A run is successful iff it returns `Ok` —
/// per-key failures are folded into `failed` rather than raised, unless they
/// are fatal, in which case `run` itself returns `Err`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
	pub keys_seen: usize,
	pub copied: usize,
	pub deleted: usize,
	pub noop: usize,
	pub failed: usize,
}

pub struct Orchestrator<'a, S: ObjectStore + ?Sized> {
	store: &'a S,
	cfg: Arc<RestoreConfig>,
}

impl<'a, S: ObjectStore + ?Sized> Orchestrator<'a, S> {
	pub fn new(store: &'a S, cfg: Arc<RestoreConfig>) -> Self {
		Orchestrator { store, cfg }
	}

	/// Run the whole pipeline to completion: Prefix Source → shuffle →
	/// Version Lister → shuffle → Version Selector → Restorer.
	pub async fn run(&self) -> Result<RunSummary, Error> {
		tracing::info!("Running step: read prefixes");
		let prefixes = read_prefixes(self.cfg.prefixes_path.as_deref()).await?;

		tracing::info!("Running step: shuffle prefixes");
		let shuffled_prefixes = self.shuffle_prefixes(prefixes)?;

		tracing::info!("Running step: list versions");
		let listed = self.list_all_prefixes(shuffled_prefixes).await?;

		tracing::info!("Running step: shuffle keys");
		let reshuffled = self.shuffle_versions(listed)?;

		let groups = group_by_key(reshuffled);
		let targets = select_all(groups, &self.cfg.src_bucket, self.cfg.restore_time);

		if let Some(dir) = &self.cfg.version_info_output {
			io_formats::write_versions(dir, &targets).await?;
		}

		tracing::info!("Running step: restore");
		let (summary, action_log) = self.restore_all(targets).await?;

		if let Some(dir) = &self.cfg.version_info_output {
			io_formats::write_restored(dir, &action_log).await?;
		}

		Ok(summary)
	}

	fn shuffle_prefixes(&self, prefixes: Vec<String>) -> Result<Vec<String>, Error> {
		let reducers = reducer_count_for_prefixes(
			self.cfg.concurrency.map_slots,
			self.cfg.concurrency.prefix_shuffle_reducers_per_slot,
		);
		let items: Vec<(String, ())> = prefixes.into_iter().map(|p| (p, ())).collect();
		let buckets = shuffle(items, reducers)?;
		Ok(buckets.into_iter().flatten().map(|(p, ())| p).collect())
	}

	fn shuffle_versions(&self, listed: Vec<(String, ListedVersion)>) -> Result<Vec<(String, ListedVersion)>, Error> {
		let reducers = reducer_count_for_versions(
			self.cfg.concurrency.map_slots,
			self.cfg.concurrency.version_shuffle_reducers_per_slot,
		);
		let buckets = shuffle(listed, reducers)?;
		Ok(buckets.into_iter().flatten().collect())
	}

	async fn list_all_prefixes(&self, prefixes: Vec<String>) -> Result<Vec<(String, ListedVersion)>, Error> {
		// Listing within a single prefix is strictly sequential (the store's
		// cursor dictates it); prefixes are the sole listing-parallelism
		// lever, so they are fanned out with bounded concurrency here, in a
		// shape suited to stages whose work units aren't an internal cursor.
		let concurrency = self.cfg.concurrency.list_concurrency;
		let store = self.store;
		let bucket = self.cfg.src_bucket.clone();
		let src_prefix = self.cfg.src_prefix.clone();
		let collected: Arc<Mutex<Vec<(String, ListedVersion)>>> = Arc::new(Mutex::new(Vec::new()));

		let sink = collected.clone();
		worker::for_each_concurrent(prefixes, concurrency, move |prefix| {
			let bucket = bucket.clone();
			let src_prefix = src_prefix.clone();
			let sink = sink.clone();
			async move {
				let full_prefix = format!("{}{}", src_prefix, prefix);
				let items = list_prefix(store, &bucket, &full_prefix).await?;
				sink.lock().unwrap().extend(items);
				Ok(())
			}
		})
		.await?;

		Ok(Arc::try_unwrap(collected)
			.expect("no outstanding references once for_each_concurrent has returned")
			.into_inner()
			.expect("worker panics propagate through for_each_concurrent's Result, never poisoning this mutex"))
	}

	async fn restore_all(
		&self,
		targets: Vec<(String, VersionRecord)>,
	) -> Result<(RunSummary, Vec<(String, ActionSummary)>), Error> {
		let concurrency = self.cfg.concurrency.restore_concurrency;
		let store = self.store;
		let cfg = self.cfg.clone();
		let collected: Arc<Mutex<Vec<(String, ActionSummary)>>> = Arc::new(Mutex::new(Vec::new()));

		let sink = collected.clone();
		worker::for_each_concurrent(targets, concurrency, move |(key, target)| {
			let cfg = cfg.clone();
			let sink = sink.clone();
			async move {
				let outcome = restore_one(store, &key, &target, &cfg).await?;
				sink.lock().unwrap().push((key, outcome));
				Ok(())
			}
		})
		.await?;

		let action_log = Arc::try_unwrap(collected)
			.expect("no outstanding references once for_each_concurrent has returned")
			.into_inner()
			.expect("worker panics propagate through for_each_concurrent's Result, never poisoning this mutex");

		let mut summary = RunSummary::default();
		for (_, outcome) in &action_log {
			summary.keys_seen += 1;
			match outcome {
				ActionSummary::Applied(Action::Copy { .. }) => summary.copied += 1,
				ActionSummary::Applied(Action::Delete { .. }) => summary.deleted += 1,
				ActionSummary::Applied(Action::Noop) => summary.noop += 1,
				ActionSummary::Failed { .. } => summary.failed += 1,
			}
		}
		Ok((summary, action_log))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::Concurrency;
	use crate::store::test_double::InMemoryStore;
	use chrono::{TimeZone, Utc};

	fn t(secs: i64) -> chrono::DateTime<Utc> {
		Utc.timestamp_opt(secs, 0).unwrap()
	}

	fn cfg(delete: bool, dest_bucket: &str) -> Arc<RestoreConfig> {
		Arc::new(RestoreConfig {
			src_bucket: "BUCKET".into(),
			src_prefix: "".into(),
			dest_bucket: dest_bucket.into(),
			dest_prefix: "".into(),
			restore_time: t(25),
			delete,
			prefixes_path: None,
			version_info_output: None,
			concurrency: Concurrency {
				map_slots: 2,
				list_concurrency: 2,
				restore_concurrency: 4,
				..Concurrency::default()
			},
		})
	}

	fn seed_all_scenarios(store: &InMemoryStore) {
		// Scenario 1: prefix1/a at t=0..9, none after T.
		for i in 0..10 {
			store.put("BUCKET", "prefix1/a", &format!("v{}", i), t(i));
		}
		// Scenario 2: prefix1--x at t=5..199.
		for i in 5..200 {
			store.put("BUCKET", "prefix1--x", &format!("t{}", i), t(i));
		}
		// Scenario 3: prefix1/de/le/ted put at t=5, delete marker at t=10.
		store.put("BUCKET", "prefix1/de/le/ted", "v1", t(5));
		store.put_delete_marker("BUCKET", "prefix1/de/le/ted", "tomb", t(10));
		// Scenario 4: prefix2/y/z only at t=100 (after T=25).
		store.put("BUCKET", "prefix2/y/z", "v1", t(100));
		// Scenario 5: prefix2/x only at t=0.
		store.put("BUCKET", "prefix2/x", "v1", t(0));
	}

	#[tokio::test]
	async fn full_run_in_place_with_delete_matches_all_scenarios() {
		let store = InMemoryStore::new();
		seed_all_scenarios(&store);

		let orchestrator = Orchestrator::new(&store, cfg(true, "BUCKET"));
		let summary = orchestrator.run().await.unwrap();

		assert_eq!(summary.keys_seen, 5);
		assert_eq!(summary.failed, 0);

		// Scenario 1: in-place + is_current -> Noop, nothing written.
		assert!(store.all_versions("BUCKET", "prefix1/a").iter().all(|v| v.version_id != "copy-v9"));

		// Scenario 2: not current -> Copy of t25.
		let head = store.head("BUCKET", "prefix1--x").unwrap();
		assert_eq!(head.version_id, "copy-t25");

		// Scenario 3: delete marker current, delete=true -> Delete applied.
		assert!(store.head("BUCKET", "prefix1/de/le/ted").is_none());

		// Scenario 4: created after T, delete=true -> Delete applied (no-op on an absent key).
		assert!(store.head("BUCKET", "prefix2/y/z").is_none());

		// Scenario 5: unchanged before T, in-place + current -> Noop.
		assert_eq!(summary.copied, 1);
		assert_eq!(summary.deleted, 2);
	}

	#[tokio::test]
	async fn full_run_without_delete_never_emits_delete() {
		let store = InMemoryStore::new();
		seed_all_scenarios(&store);

		let orchestrator = Orchestrator::new(&store, cfg(false, "BUCKET"));
		let summary = orchestrator.run().await.unwrap();

		assert_eq!(summary.deleted, 0);
	}

	#[tokio::test]
	async fn scenario_6_cross_bucket_forces_copy_even_when_current() {
		let store = InMemoryStore::new();
		store.put("BUCKET", "prefix1/a", "t9", t(9));

		let orchestrator = Orchestrator::new(&store, cfg(false, "DEST-BUCKET"));
		let summary = orchestrator.run().await.unwrap();

		assert_eq!(summary.copied, 1);
		let head = store.head("DEST-BUCKET", "prefix1/a").unwrap();
		assert_eq!(head.version_id, "copy-t9");
	}

	#[tokio::test]
	async fn idempotent_rerun_on_freshly_restored_destination_emits_no_further_copies() {
		// Keys whose entire real history sits at or before T: the selected
		// target is already `is_current` on the very first run, so an
		// in-place restore is a no-op both times, demonstrated at its
		// boundary — once a key has any real modification after T, an
		// in-place restore to that fixed T re-copies on every run, since
		// each copy is itself a new "now" version strictly after T and so
		// never becomes the `is_current` version; see the scenarios above
		// for that always-behind case.
		let store = InMemoryStore::new();
		for i in 0..10 {
			store.put("BUCKET", "prefix1/a", &format!("v{}", i), t(i));
		}
		store.put("BUCKET", "prefix2/x", "v1", t(0));

		let cfg = cfg(true, "BUCKET");
		let first = Orchestrator::new(&store, cfg.clone()).run().await.unwrap();
		assert_eq!(first.copied, 0);
		assert_eq!(first.deleted, 0);

		let second = Orchestrator::new(&store, cfg).run().await.unwrap();
		assert_eq!(second.copied, 0);
		assert_eq!(second.deleted, 0);
	}

	#[tokio::test]
	async fn nonempty_src_prefix_scopes_listing_to_declared_subtree() {
		// A source URI of s3://BUCKET/scope/ yields src_prefix = "scope/"; the
		// per-unit prefix from the Prefix Source is relative to that subtree,
		// so the Lister must see the concatenation, not the bare unit.
		let store = InMemoryStore::new();
		store.put("BUCKET", "scope/a", "v0", t(0));
		store.put("BUCKET", "scope/b", "v0", t(0));
		// Out of scope: sibling key sharing a prefix byte sequence but outside
		// the declared subtree, and a key in another top-level prefix entirely.
		store.put("BUCKET", "scoped-but-not-really", "v0", t(0));
		store.put("BUCKET", "other/c", "v0", t(0));

		let cfg = Arc::new(RestoreConfig {
			src_bucket: "BUCKET".into(),
			src_prefix: "scope/".into(),
			dest_bucket: "BUCKET".into(),
			dest_prefix: "".into(),
			restore_time: t(25),
			delete: false,
			prefixes_path: None,
			version_info_output: None,
			concurrency: Concurrency {
				map_slots: 2,
				list_concurrency: 2,
				restore_concurrency: 4,
				..Concurrency::default()
			},
		});

		let orchestrator = Orchestrator::new(&store, cfg);
		let summary = orchestrator.run().await.unwrap();

		assert_eq!(summary.keys_seen, 2, "only the two in-scope keys should ever reach the Restorer");
		assert_eq!(summary.failed, 0, "in-scope keys already match their own in-place target and are a Noop");
	}
}
