//! Per-key action computation and idempotent application.

use std::time::Duration;

use crate::backoff::Backoff;
use crate::config::RestoreConfig;
use crate::error::Error;
use crate::record::{Action, ActionSummary, VersionRecord};
use crate::store::{CopyRequest, ObjectStore};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
const RETRY_CAP_SHIFT: u32 = 6;
const MAX_RETRY_ATTEMPTS: u32 = 8;

/// `dest_prefix ⊕ key[len(src_prefix):]`, treating an absent prefix as `""`.
/// Fails with a per-record, non-fatal error if `key` does not start with
/// `src_prefix`.
pub fn switch_prefixes(src_prefix: &str, dest_prefix: &str, key: &str) -> Result<String, Error> {
	match key.strip_prefix(src_prefix) {
		Some(rest) => Ok(format!("{}{}", dest_prefix, rest)),
		None => Err(Error::PrefixMismatch {
			key: key.to_string(),
			prefix: src_prefix.to_string(),
		}),
	}
}

/// Compute the single Action for one key/target pair.
/// Pure and side-effect-free, so the branch table itself is trivially
/// testable without a store.
///
/// The delete-marker branch is checked before the in-place/is_current
/// no-op: a target that is a delete marker is governed purely by the
/// `delete` flag: an in-place, current delete marker with `delete = true`
/// still yields a Delete, not a Noop.
/// The is_current no-op applies only to real versions.
pub fn compute_action(key: &str, target: &VersionRecord, cfg: &RestoreConfig) -> Result<Action, Error> {
	let dest_key = switch_prefixes(&cfg.src_prefix, &cfg.dest_prefix, key)?;

	if target.delete_marker {
		return Ok(if cfg.delete {
			Action::Delete {
				dest_bucket: cfg.dest_bucket.clone(),
				dest_key,
			}
		} else {
			Action::Noop
		});
	}

	if cfg.is_in_place() && target.is_current {
		return Ok(Action::Noop);
	}

	Ok(Action::Copy {
		src_bucket: cfg.src_bucket.clone(),
		src_key: key.to_string(),
		src_version_id: target.version_id.clone(),
		dest_bucket: cfg.dest_bucket.clone(),
		dest_key,
	})
}

async fn apply_action_with_retry<S: ObjectStore + ?Sized>(store: &S, action: &Action) -> Result<(), Error> {
	let mut backoff = Backoff::new(RETRY_BASE_DELAY, RETRY_CAP_SHIFT);
	loop {
		let result = match action {
			Action::Copy {
				src_bucket,
				src_key,
				src_version_id,
				dest_bucket,
				dest_key,
			} => {
				store
					.copy_object(CopyRequest {
						src_bucket: src_bucket.clone(),
						src_key: src_key.clone(),
						src_version_id: src_version_id.clone(),
						dest_bucket: dest_bucket.clone(),
						dest_key: dest_key.clone(),
					})
					.await
			}
			// Idempotent: deleting an already-absent key is success;
			// that idempotence lives in the store implementation, not here.
			Action::Delete { dest_bucket, dest_key } => store.delete_object(dest_bucket, dest_key).await,
			Action::Noop => return Ok(()),
		};

		match result {
			Ok(()) => return Ok(()),
			Err(e @ Error::Transient(_)) => {
				let delay = backoff.record_failure();
				if backoff.attempts() > MAX_RETRY_ATTEMPTS {
					tracing::error!("restore action exhausted retries: {}", e);
					return Err(e);
				}
				tracing::warn!("transient restore error (attempt {}): {}, retrying in {:?}", backoff.attempts(), e, delay);
				tokio::time::sleep(delay).await;
			}
			Err(e) => return Err(e),
		}
	}
}

/// Restore one key: compute its Action and apply it. Per-record failures
/// (prefix mismatch, exhausted retries on a transient error) are captured as
/// `Ok(ActionSummary::Failed { .. })` and do not abort sibling work; a fatal
/// (credential-level) error propagates as `Err` so the orchestrator can stop
/// the run.
pub async fn restore_one<S: ObjectStore + ?Sized>(
	store: &S,
	key: &str,
	target: &VersionRecord,
	cfg: &RestoreConfig,
) -> Result<ActionSummary, Error> {
	let action = match compute_action(key, target, cfg) {
		Ok(a) => a,
		Err(e) => {
			if e.is_fatal() {
				return Err(e);
			}
			tracing::warn!("record failed for key {:?}: {}", key, e);
			return Ok(ActionSummary::Failed { error: e.to_string() });
		}
	};

	match apply_action_with_retry(store, &action).await {
		Ok(()) => Ok(ActionSummary::Applied(action)),
		Err(e) => {
			if e.is_fatal() {
				return Err(e);
			}
			tracing::warn!("restore failed for key {:?}: {}", key, e);
			Ok(ActionSummary::Failed { error: e.to_string() })
		}
	}
}
