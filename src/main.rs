//! Bulk point-in-time restore of a versioned S3-compatible bucket prefix.
//!
//! Bootstrap: parse flags, initialize `tracing-subscriber` from `RUST_LOG`
//! (falling back to a sane default directive when unset), run the
//! operation, and map the outcome to one of the three process exit codes.

mod backoff;
mod cli;
mod config;
mod error;
mod io_formats;
mod pipeline;
mod record;
mod store;
mod worker;

use structopt::StructOpt;

use cli::Opt;
use error::Error;
use pipeline::Orchestrator;
use store::S3ObjectStore;

#[tokio::main]
async fn main() {
	if std::env::var("RUST_LOG").is_err() {
		std::env::set_var("RUST_LOG", "warn,s3_pit_restore=info");
	}
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	let opt = Opt::from_args();

	if let Err(e) = run(opt).await {
		eprintln!("Error: {}", e);
		std::process::exit(e.exit_code());
	}
}

async fn run(opt: Opt) -> Result<(), Error> {
	let cfg = opt.into_config()?;
	let store = S3ObjectStore::from_env().await;
	let orchestrator = Orchestrator::new(&store, cfg);
	let summary = orchestrator.run().await?;

	tracing::info!(
		"Restore complete: {} keys seen, {} copied, {} deleted, {} no-op, {} failed",
		summary.keys_seen,
		summary.copied,
		summary.deleted,
		summary.noop,
		summary.failed
	);

	Ok(())
}
