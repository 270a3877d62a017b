use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable description of one historical version of one key.
///
/// Equality and ordering are field-wise; the Selector relies on `PartialEq`
/// for the `is_current` check (`target == last(sorted versions)`) and on the
/// explicit sort in `pipeline::selector` (not on `Ord`) for ordering, since
/// `last_modified` alone is not a total order once ties are possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
	pub key: String,
	pub bucket_name: String,
	pub version_id: Option<String>,
	/// Milliseconds since epoch, UTC. Absent for synthesized tombstones.
	#[serde(with = "opt_millis")]
	pub last_modified: Option<DateTime<Utc>>,
	pub delete_marker: bool,
	/// Set downstream by the Selector; always `false` on records as emitted
	/// by the Lister.
	#[serde(default)]
	pub is_current: bool,
}

impl VersionRecord {
	/// Synthesize a tombstone for a key with no version at or before T.
	pub fn synthesized_tombstone(key: String, bucket_name: String) -> VersionRecord {
		VersionRecord {
			key,
			bucket_name,
			version_id: None,
			last_modified: None,
			delete_marker: true,
			is_current: false,
		}
	}
}

/// Serializes `Option<DateTime<Utc>>` as an ISO-8601 string or JSON `null`.
mod opt_millis {
	use chrono::{DateTime, SecondsFormat, Utc};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(v: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
		match v {
			Some(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true).serialize(s),
			None => s.serialize_none(),
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
		let raw: Option<String> = Option::deserialize(d)?;
		match raw {
			Some(s) => DateTime::parse_from_rfc3339(&s)
				.map(|t| Some(t.with_timezone(&Utc)))
				.map_err(serde::de::Error::custom),
			None => Ok(None),
		}
	}
}

/// The Restorer's output. `Noop` is a valid computed value but is
/// never serialized to the "restored" stage output — it is intentionally
/// suppressed before emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
	#[serde(rename = "copy")]
	Copy {
		src_bucket: String,
		src_key: String,
		src_version_id: Option<String>,
		dest_bucket: String,
		dest_key: String,
	},
	#[serde(rename = "delete")]
	Delete { dest_bucket: String, dest_key: String },
	#[serde(rename = "noop")]
	Noop,
}

/// A per-record outcome written to the "restored" stage output: either
/// the action that was (or would be) applied, or an error-shaped value for a
/// per-record failure that does not abort the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionSummary {
	Applied(Action),
	Failed { error: String },
}
