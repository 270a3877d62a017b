//! Command-line interface: one flag per field, each with an
//! `env = "..."` fallback so the same binary can be driven from a process
//! supervisor without a shell wrapper.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use structopt::StructOpt;

use crate::config::{Concurrency, RestoreConfig, Uri};
use crate::error::Error;

#[derive(StructOpt, Debug)]
#[structopt(
	name = "s3-pit-restore",
	about = "Bulk point-in-time restore of a versioned object store prefix"
)]
pub struct Opt {
	/// Source S3 URI, of the form s3://bucket[/prefix] or s3n://...
	#[structopt(long, env = "RESTORE_SRC")]
	pub src: String,

	/// Point in time to restore to, as an ISO-8601 timestamp.
	#[structopt(long, env = "RESTORE_TIME")]
	pub restore_time: String,

	/// Destination S3 URI. Defaults to --src (an in-place restore).
	#[structopt(long, env = "RESTORE_DEST")]
	pub dest: Option<String>,

	/// Path to a newline-separated file of prefixes to restore. If absent,
	/// the whole source prefix is restored as one unit.
	#[structopt(long, env = "RESTORE_PREFIXES")]
	pub prefixes: Option<PathBuf>,

	/// Directory to persist the "versions" and "restored" stage outputs to.
	#[structopt(long, env = "RESTORE_VERSION_INFO_OUTPUT")]
	pub version_info_output: Option<PathBuf>,

	/// Turn synthesized tombstones (and real delete markers in effect at T)
	/// into actual deletes against the destination. Takes an explicit
	/// `true`/`false` (e.g. `--delete true`) rather than being a bare
	/// presence flag, so that `RESTORE_DELETE`'s value, not just its
	/// presence, is honored.
	#[structopt(long, env = "RESTORE_DELETE", default_value = "false", parse(try_from_str))]
	pub delete: bool,
}

impl Opt {
	/// Validate and lower the parsed flags into a `RestoreConfig`: catches
	/// missing/non-S3 `--src`, non-S3 `--dest`, and an unparseable
	/// `--restore-time`.
	pub fn into_config(self) -> Result<Arc<RestoreConfig>, Error> {
		let src = Uri::parse(&self.src)?;
		let dest = match &self.dest {
			Some(raw) => Uri::parse(raw)?,
			None => src.clone(),
		};
		let restore_time: DateTime<Utc> = self
			.restore_time
			.parse()
			.map_err(|_: chrono::ParseError| Error::Usage(format!("unparseable --restore-time: {}", self.restore_time)))?;

		Ok(Arc::new(RestoreConfig {
			src_bucket: src.bucket,
			src_prefix: src.prefix,
			dest_bucket: dest.bucket,
			dest_prefix: dest.prefix,
			restore_time,
			delete: self.delete,
			prefixes_path: self.prefixes,
			version_info_output: self.version_info_output,
			concurrency: Concurrency::default(),
		}))
	}
}
