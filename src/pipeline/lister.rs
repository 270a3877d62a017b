//! Paged, lazily-driven version listing for one prefix.
//!
//! Modeled as an explicit iterator with three states (have-current-page,
//! need-next-page, exhausted) rather than a lazy concatenation of batches —
//! the next page is requested only once the current one is fully drained
//! downstream, preserving back-pressure.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::error::Error;
use crate::record::VersionRecord;
use crate::store::{ListCursor, ObjectStore, VersionPage, MAX_KEYS_PER_PAGE};

/// A version record tagged with the position it was emitted at, within this
/// one prefix's listing. This is the tie-break the Selector uses when two
/// versions of the same key share `last_modified` (stable w.r.t. store
/// emission order — see DESIGN.md). It never appears in the persisted
/// "versions"/"restored" stage outputs — those carry only the plain
/// `VersionRecord` — it exists solely as an internal shuffle payload between
/// the Lister and the Selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedVersion {
	pub record: VersionRecord,
	pub emission_index: u64,
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
const RETRY_CAP_SHIFT: u32 = 6;
const MAX_RETRY_ATTEMPTS: u32 = 8;

enum PageState {
	HaveCurrentPage {
		summaries: VecDeque<crate::store::VersionSummary>,
		truncated: bool,
		cursor: Option<ListCursor>,
	},
	NeedNextPage {
		cursor: Option<ListCursor>,
	},
	Exhausted,
}

/// Lazily lists every version (including delete markers) under
/// `src_prefix ⊕ prefix` in `bucket`, with no delimiter.
pub struct VersionLister<'a, S: ObjectStore + ?Sized> {
	store: &'a S,
	bucket: String,
	prefix: String,
	state: PageState,
	next_emission_index: u64,
}

impl<'a, S: ObjectStore + ?Sized> VersionLister<'a, S> {
	pub fn new(store: &'a S, bucket: String, prefix: String) -> Self {
		VersionLister {
			store,
			bucket,
			prefix,
			state: PageState::NeedNextPage { cursor: None },
			next_emission_index: 0,
		}
	}

	/// Pull the next `(key, ListedVersion)`, or `None` once the prefix is
	/// fully drained. Retries transient store errors with bounded
	/// exponential backoff; permanent errors propagate immediately and are
	/// fatal to the whole run.
	pub async fn next(&mut self) -> Result<Option<(String, ListedVersion)>, Error> {
		loop {
			match &mut self.state {
				PageState::Exhausted => return Ok(None),
				PageState::HaveCurrentPage {
					summaries,
					truncated,
					cursor,
				} => {
					if let Some(s) = summaries.pop_front() {
						let emission_index = self.next_emission_index;
						self.next_emission_index += 1;
						let record = VersionRecord {
							key: s.key.clone(),
							bucket_name: self.bucket.clone(),
							version_id: s.version_id,
							last_modified: s.last_modified,
							delete_marker: s.is_delete_marker,
							is_current: false,
						};
						return Ok(Some((
							s.key,
							ListedVersion {
								record,
								emission_index,
							},
						)));
					} else if *truncated {
						let next_cursor = cursor.take();
						self.state = PageState::NeedNextPage { cursor: next_cursor };
						continue;
					} else {
						self.state = PageState::Exhausted;
						continue;
					}
				}
				PageState::NeedNextPage { cursor } => {
					let page = self.fetch_page_with_retry(cursor.clone()).await?;
					self.state = PageState::HaveCurrentPage {
						summaries: page.summaries.into(),
						truncated: page.truncated,
						cursor: page.cursor,
					};
					continue;
				}
			}
		}
	}

	async fn fetch_page_with_retry(&self, cursor: Option<ListCursor>) -> Result<VersionPage, Error> {
		let mut backoff = Backoff::new(RETRY_BASE_DELAY, RETRY_CAP_SHIFT);
		loop {
			let result = match &cursor {
				None => {
					self.store
						.list_versions(&self.bucket, &self.prefix, MAX_KEYS_PER_PAGE)
						.await
				}
				Some(c) => {
					self.store
						.list_next_batch_of_versions(&self.bucket, &self.prefix, MAX_KEYS_PER_PAGE, c)
						.await
				}
			};

			match result {
				Ok(page) => return Ok(page),
				Err(e @ Error::Transient(_)) => {
					let delay = backoff.record_failure();
					if backoff.attempts() > MAX_RETRY_ATTEMPTS {
						tracing::error!(
							"list-versions on {}/{} exhausted retries: {}",
							self.bucket,
							self.prefix,
							e
						);
						return Err(e);
					}
					tracing::warn!(
						"transient list-versions error on {}/{} (attempt {}): {}, retrying in {:?}",
						self.bucket,
						self.prefix,
						backoff.attempts(),
						e,
						delay
					);
					tokio::time::sleep(delay).await;
				}
				Err(e) => return Err(e),
			}
		}
	}
}

/// Drain an entire prefix's listing into `(key, ListedVersion)` pairs. The
/// pipeline uses this per-prefix-worker rather than exposing the iterator
/// directly, since listing within one prefix is strictly sequential.
pub async fn list_prefix<S: ObjectStore + ?Sized>(
	store: &S,
	bucket: &str,
	prefix: &str,
) -> Result<Vec<(String, ListedVersion)>, Error> {
	let mut lister = VersionLister::new(store, bucket.to_string(), prefix.to_string());
	let mut out = Vec::new();
	while let Some(item) = lister.next().await? {
		out.push(item);
	}
	Ok(out)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::store::test_double::InMemoryStore;
	use chrono::{TimeZone, Utc};

	fn t(secs: i64) -> chrono::DateTime<Utc> {
		Utc.timestamp_opt(secs, 0).unwrap()
	}

	#[tokio::test]
	async fn lists_all_versions_across_pages() {
		let store = InMemoryStore::with_page_size(3);
		for i in 0..10 {
			store.put("BUCKET", &format!("key-{}", i), "v1", t(i));
		}

		let items = list_prefix(&store, "BUCKET", "").await.unwrap();
		assert_eq!(items.len(), 10);
		let indices: Vec<u64> = items.iter().map(|(_, lv)| lv.emission_index).collect();
		assert_eq!(indices, (0..10).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn respects_prefix_filter() {
		let store = InMemoryStore::new();
		store.put("BUCKET", "a/1", "v1", t(0));
		store.put("BUCKET", "b/1", "v1", t(0));

		let items = list_prefix(&store, "BUCKET", "a/").await.unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].0, "a/1");
	}

	#[tokio::test]
	async fn empty_prefix_yields_no_items() {
		let store = InMemoryStore::new();
		let items = list_prefix(&store, "BUCKET", "nope/").await.unwrap();
		assert!(items.is_empty());
	}

	#[tokio::test]
	async fn exact_page_boundary_of_1000_and_1001() {
		let store = InMemoryStore::with_page_size(1000);
		for i in 0..1000 {
			store.put("BUCKET", &format!("key-{:04}", i), "v1", t(i));
		}
		let items = list_prefix(&store, "BUCKET", "").await.unwrap();
		assert_eq!(items.len(), 1000);

		let store2 = InMemoryStore::with_page_size(1000);
		for i in 0..1001 {
			store2.put("BUCKET", &format!("key-{:04}", i), "v1", t(i));
		}
		let items2 = list_prefix(&store2, "BUCKET", "").await.unwrap();
		assert_eq!(items2.len(), 1001);
	}
}
