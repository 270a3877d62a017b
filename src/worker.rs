//! A local, bounded-concurrency realization of a pipeline stage's work units.
//!
//! A named unit of work that reports its own progress and advances one step
//! at a time, plus a bounded-concurrency fan-out for stages whose work units
//! are independent items rather than an internal cursor.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::watch;

/// What happened after one `work()` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	/// There is more work; call `work()` again.
	Busy,
	/// This worker has drained its input; stop calling it.
	Done,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
	pub progress: Option<String>,
}

/// A cooperative, single-threaded-per-item unit of work. Each call to
/// `work()` performs exactly one suspension-point operation (a store call or
/// a shuffle I/O read/write) and returns whether more remains.
#[async_trait]
pub trait Worker: Send {
	fn name(&self) -> String;

	fn status(&self) -> WorkerStatus {
		WorkerStatus::default()
	}

	async fn work(&mut self, must_exit: &mut watch::Receiver<bool>) -> Result<WorkerState, crate::error::Error>;
}

/// Drive a `Worker` to completion or until cancellation, logging its name
/// once at start.
pub async fn run_to_completion<W: Worker>(
	mut worker: W,
	mut must_exit: watch::Receiver<bool>,
) -> Result<(), crate::error::Error> {
	tracing::info!("Starting worker: {}", worker.name());
	loop {
		if *must_exit.borrow() {
			tracing::info!("Worker {} cancelled", worker.name());
			return Ok(());
		}
		match worker.work(&mut must_exit).await? {
			WorkerState::Busy => continue,
			WorkerState::Done => {
				tracing::info!("Worker {} finished", worker.name());
				return Ok(());
			}
		}
	}
}

/// Run `f` over every item in `items` with at most `concurrency` in flight at
/// once, never serializing on one item's failure onto its siblings. No
/// in-worker concurrency for object-store calls is introduced; concurrency
/// is only ever across items, never within one.
pub async fn for_each_concurrent<T, F, Fut>(
	items: Vec<T>,
	concurrency: usize,
	f: F,
) -> Result<(), crate::error::Error>
where
	T: Send,
	F: Fn(T) -> Fut + Send + Sync,
	Fut: std::future::Future<Output = Result<(), crate::error::Error>> + Send,
{
	stream::iter(items.into_iter().map(Ok::<T, crate::error::Error>))
		.try_for_each_concurrent(concurrency.max(1), f)
		.await
}
