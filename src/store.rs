//! The object store client consumed by the pipeline.
//!
//! The four operations below are the entire surface the pipeline needs:
//! paged version listing, and copy/delete against the destination. Everything
//! about how the store itself replicates, versions, or persists data is out
//! of scope — the pipeline only ever sees this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;

/// One entry in a `list-versions` page: either a real version or a delete
/// marker, before the Lister turns it into a `VersionRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
	pub key: String,
	pub version_id: Option<String>,
	pub last_modified: Option<DateTime<Utc>>,
	pub is_delete_marker: bool,
}

/// Opaque pagination cursor threaded between `list_versions` and
/// `list_next_batch_of_versions`. The pipeline never inspects its
/// contents, only whether one was returned.
#[derive(Debug, Clone)]
pub struct ListCursor {
	pub(crate) key_marker: Option<String>,
	pub(crate) version_id_marker: Option<String>,
}

/// One page of a `list-versions` response.
#[derive(Debug, Clone)]
pub struct VersionPage {
	pub summaries: Vec<VersionSummary>,
	pub truncated: bool,
	pub cursor: Option<ListCursor>,
}

/// A copy request as issued by the Restorer: copy one specific source
/// version to a destination key, in the same or a different bucket.
#[derive(Debug, Clone)]
pub struct CopyRequest {
	pub src_bucket: String,
	pub src_key: String,
	pub src_version_id: Option<String>,
	pub dest_bucket: String,
	pub dest_key: String,
}

/// The object store client interface this pipeline consumes. How an
/// implementation fulfills these calls is entirely its own concern.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	/// First page of `list-versions` for `bucket`/`prefix`, no delimiter,
	/// at most `max_keys` (capped at 1000) entries.
	async fn list_versions(
		&self,
		bucket: &str,
		prefix: &str,
		max_keys: u32,
	) -> Result<VersionPage, Error>;

	/// Next page, given the cursor from a prior truncated page.
	async fn list_next_batch_of_versions(
		&self,
		bucket: &str,
		prefix: &str,
		max_keys: u32,
		cursor: &ListCursor,
	) -> Result<VersionPage, Error>;

	async fn copy_object(&self, req: CopyRequest) -> Result<(), Error>;

	/// Idempotent: deleting an already-absent key is success.
	async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error>;
}

pub const MAX_KEYS_PER_PAGE: u32 = 1000;

/// Production implementation backed by `aws-sdk-s3`, the S3-compatible
/// client this crate depends on directly since talking to an S3-compatible
/// store is its entire job.
pub struct S3ObjectStore {
	client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
	pub fn new(client: aws_sdk_s3::Client) -> S3ObjectStore {
		S3ObjectStore { client }
	}

	/// Build a store from the ambient AWS configuration (environment,
	/// profile, instance metadata), the same discovery chain `aws-config`
	/// always uses.
	pub async fn from_env() -> S3ObjectStore {
		let config = aws_config::load_from_env().await;
		S3ObjectStore::new(aws_sdk_s3::Client::new(&config))
	}

	fn page_from_output(out: aws_sdk_s3::output::ListObjectVersionsOutput) -> VersionPage {
		let mut summaries: Vec<VersionSummary> = out
			.versions()
			.unwrap_or_default()
			.iter()
			.map(|v| VersionSummary {
				key: v.key().unwrap_or_default().to_string(),
				version_id: v.version_id().map(|s| s.to_string()),
				last_modified: v.last_modified().and_then(|t| {
					DateTime::from_timestamp(t.secs(), t.subsec_nanos()).map(|d| d.with_timezone(&Utc))
				}),
				is_delete_marker: false,
			})
			.collect();

		summaries.extend(out.delete_markers().unwrap_or_default().iter().map(|m| VersionSummary {
			key: m.key().unwrap_or_default().to_string(),
			version_id: m.version_id().map(|s| s.to_string()),
			last_modified: m.last_modified().and_then(|t| {
				DateTime::from_timestamp(t.secs(), t.subsec_nanos()).map(|d| d.with_timezone(&Utc))
			}),
			is_delete_marker: true,
		}));

		let truncated = out.is_truncated();
		let cursor = if truncated {
			Some(ListCursor {
				key_marker: out.next_key_marker().map(|s| s.to_string()),
				version_id_marker: out.next_version_id_marker().map(|s| s.to_string()),
			})
		} else {
			None
		};

		VersionPage {
			summaries,
			truncated,
			cursor,
		}
	}

	fn classify(err: aws_sdk_s3::error::SdkError<impl std::error::Error + Send + Sync + 'static>) -> Error {
		use aws_sdk_s3::error::SdkError;
		match &err {
			SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
				Error::Transient(format!("{}", err))
			}
			SdkError::ResponseError(resp) => {
				let status = resp.raw().status().as_u16();
				if status == 429 || (500..600).contains(&status) {
					Error::Transient(format!("{}", err))
				} else {
					Error::Permanent(format!("{}", err))
				}
			}
			_ => Error::Permanent(format!("{}", err)),
		}
	}
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
	async fn list_versions(
		&self,
		bucket: &str,
		prefix: &str,
		max_keys: u32,
	) -> Result<VersionPage, Error> {
		let out = self
			.client
			.list_object_versions()
			.bucket(bucket)
			.prefix(prefix)
			.max_keys(max_keys.min(MAX_KEYS_PER_PAGE) as i32)
			.send()
			.await
			.map_err(Self::classify)?;
		Ok(Self::page_from_output(out))
	}

	async fn list_next_batch_of_versions(
		&self,
		bucket: &str,
		prefix: &str,
		max_keys: u32,
		cursor: &ListCursor,
	) -> Result<VersionPage, Error> {
		let mut req = self
			.client
			.list_object_versions()
			.bucket(bucket)
			.prefix(prefix)
			.max_keys(max_keys.min(MAX_KEYS_PER_PAGE) as i32);
		if let Some(km) = &cursor.key_marker {
			req = req.key_marker(km);
		}
		if let Some(vm) = &cursor.version_id_marker {
			req = req.version_id_marker(vm);
		}
		let out = req.send().await.map_err(Self::classify)?;
		Ok(Self::page_from_output(out))
	}

	async fn copy_object(&self, req: CopyRequest) -> Result<(), Error> {
		let mut copy_source = format!("{}/{}", req.src_bucket, req.src_key);
		if let Some(v) = &req.src_version_id {
			copy_source = format!("{}?versionId={}", copy_source, v);
		}
		self.client
			.copy_object()
			.bucket(&req.dest_bucket)
			.key(&req.dest_key)
			.copy_source(copy_source)
			.send()
			.await
			.map_err(Self::classify)?;
		Ok(())
	}

	async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
		self.client
			.delete_object()
			.bucket(bucket)
			.key(key)
			.send()
			.await
			.map_err(Self::classify)?;
		Ok(())
	}
}
