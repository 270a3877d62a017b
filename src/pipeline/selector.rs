//! Per-key selection of the version in effect at T.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::pipeline::lister::ListedVersion;
use crate::record::VersionRecord;

/// Group listed versions by key, as they arrive after the Lister→Selector
/// shuffle: the shuffle repartitions but never merges — grouping by
/// key is the Selector's own job, since it is "the only component that
/// observes all versions" for a key.
pub fn group_by_key(items: Vec<(String, ListedVersion)>) -> HashMap<String, Vec<ListedVersion>> {
	let mut groups: HashMap<String, Vec<ListedVersion>> = HashMap::new();
	for (key, lv) in items {
		groups.entry(key).or_default().push(lv);
	}
	groups
}

/// Select the target version for one key.
///
/// `versions` must be non-empty — every key passed in here came from at
/// least one real listed version, so `current` is always a real version,
/// never a synthesized tombstone.
pub fn select_target(key: &str, src_bucket: &str, mut versions: Vec<ListedVersion>, restore_time: DateTime<Utc>) -> VersionRecord {
	assert!(!versions.is_empty(), "select_target called with no versions for key {}", key);

	// Step 2: ascending last_modified, ties broken by the store's emission
	// order (stable) — see DESIGN.md for the tie-break rationale.
	versions.sort_by(|a, b| {
		(a.record.last_modified, a.emission_index).cmp(&(b.record.last_modified, b.emission_index))
	});

	// Step 3: current_version = last element of the sorted list.
	let current = versions.last().expect("checked non-empty above").record.clone();

	// Step 4: candidate = last element with last_modified <= T.
	let candidate = versions
		.iter()
		.rev()
		.find(|lv| lv.record.last_modified.map(|lm| lm <= restore_time).unwrap_or(false));

	// Step 5: target_version, synthesizing a tombstone if no candidate.
	let mut target = match candidate {
		Some(lv) => lv.record.clone(),
		None => VersionRecord::synthesized_tombstone(key.to_string(), src_bucket.to_string()),
	};

	// Step 6: is_current under record equality. `current` is always a real
	// version (is_current == false at this point on both sides), so this is
	// a plain structural comparison.
	target.is_current = target == current;

	target
}

/// Select targets for every key in `groups`: exactly one target per key.
pub fn select_all(groups: HashMap<String, Vec<ListedVersion>>, src_bucket: &str, restore_time: DateTime<Utc>) -> Vec<(String, VersionRecord)> {
	groups
		.into_iter()
		.map(|(key, versions)| {
			let target = select_target(&key, src_bucket, versions, restore_time);
			(key, target)
		})
		.collect()
}
