use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Error;

/// An `s3://bucket[/prefix]` or `s3n://bucket[/prefix]` URI, parsed against
/// the grammar `s3n?://([^/]*)(/(.*))?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
	pub bucket: String,
	pub prefix: String,
}

impl Uri {
	pub fn parse(raw: &str) -> Result<Uri, Error> {
		let rest = raw
			.strip_prefix("s3n://")
			.or_else(|| raw.strip_prefix("s3://"))
			.ok_or_else(|| Error::Usage(format!("not an S3 URI (expected s3:// or s3n://): {}", raw)))?;

		match rest.split_once('/') {
			None => {
				if rest.is_empty() {
					return Err(Error::Usage(format!("S3 URI is missing a bucket name: {}", raw)));
				}
				Ok(Uri {
					bucket: rest.to_string(),
					prefix: String::new(),
				})
			}
			Some((bucket, prefix)) => {
				if bucket.is_empty() {
					return Err(Error::Usage(format!("S3 URI is missing a bucket name: {}", raw)));
				}
				Ok(Uri {
					bucket: bucket.to_string(),
					prefix: prefix.to_string(),
				})
			}
		}
	}
}

/// Tunables for the local worker-pool realization of the pipeline.
/// None of these affect pipeline semantics, only how much of it runs at once.
#[derive(Debug, Clone)]
pub struct Concurrency {
	/// Map-slot stand-in used to size shuffle reducer counts.
	pub map_slots: usize,
	/// How many prefixes are listed concurrently.
	pub list_concurrency: usize,
	/// How many keys are restored concurrently.
	pub restore_concurrency: usize,
	/// Reducers per map slot for the Prefix Source → Lister shuffle.
	pub prefix_shuffle_reducers_per_slot: f64,
	/// Reducers per map slot for the Lister → Selector shuffle.
	pub version_shuffle_reducers_per_slot: f64,
}

impl Default for Concurrency {
	fn default() -> Self {
		let map_slots = num_cpus::get().max(1);
		Concurrency {
			map_slots,
			list_concurrency: map_slots,
			restore_concurrency: map_slots * 4,
			prefix_shuffle_reducers_per_slot: 3.5,
			version_shuffle_reducers_per_slot: 1.0,
		}
	}
}

/// Configuration for one pipeline run, immutable after construction and
/// broadcast to every worker as an `Arc<RestoreConfig>` — never as mutable
/// process-wide state.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
	pub src_bucket: String,
	pub src_prefix: String,
	pub dest_bucket: String,
	pub dest_prefix: String,
	pub restore_time: DateTime<Utc>,
	pub delete: bool,

	/// Optional path to a newline-separated prefix file.
	pub prefixes_path: Option<PathBuf>,
	/// Optional directory to persist the "versions"/"restored" stage outputs.
	pub version_info_output: Option<PathBuf>,

	pub concurrency: Concurrency,
}

impl RestoreConfig {
	/// True for an in-place restore: same bucket and same prefix for source
	/// and destination. Enables the `is_current` no-op optimization.
	pub fn is_in_place(&self) -> bool {
		self.src_bucket == self.dest_bucket && self.src_prefix == self.dest_prefix
	}

	pub fn into_shared(self) -> Arc<RestoreConfig> {
		Arc::new(self)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_s3_uri_with_prefix() {
		let u = Uri::parse("s3://my-bucket/some/prefix").unwrap();
		assert_eq!(u.bucket, "my-bucket");
		assert_eq!(u.prefix, "some/prefix");
	}

	#[test]
	fn parses_s3n_uri() {
		let u = Uri::parse("s3n://my-bucket/p").unwrap();
		assert_eq!(u.bucket, "my-bucket");
		assert_eq!(u.prefix, "p");
	}

	#[test]
	fn parses_bare_bucket_with_no_prefix() {
		let u = Uri::parse("s3://my-bucket").unwrap();
		assert_eq!(u.bucket, "my-bucket");
		assert_eq!(u.prefix, "");
	}

	#[test]
	fn rejects_non_s3_uri() {
		assert!(Uri::parse("http://my-bucket/x").is_err());
	}

	#[test]
	fn rejects_missing_bucket() {
		assert!(Uri::parse("s3://").is_err());
		assert!(Uri::parse("s3:///prefix").is_err());
	}

	#[test]
	fn in_place_detection() {
		let mut cfg = RestoreConfig {
			src_bucket: "b".into(),
			src_prefix: "p".into(),
			dest_bucket: "b".into(),
			dest_prefix: "p".into(),
			restore_time: Utc::now(),
			delete: false,
			prefixes_path: None,
			version_info_output: None,
			concurrency: Concurrency::default(),
		};
		assert!(cfg.is_in_place());
		cfg.dest_bucket = "other".into();
		assert!(!cfg.is_in_place());
	}
}
