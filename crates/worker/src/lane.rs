use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::TaskClass;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queued work. Flush markers are not counted as pending.
struct Queued {
	job: Job,
	counted: bool,
}

/// Single-concurrency execution lane.
///
/// Jobs run one at a time, in submission order, on the blocking pool of the
/// worker runtime. A job never starts before the previous one has returned.
/// A panicking job is logged and does not stop the lane.
///
/// Clones share the lane. The runner exits after the last clone is dropped
/// and queued jobs have drained.
#[derive(Debug, Clone)]
pub struct SerialLane {
	inner: Arc<LaneInner>,
}

#[derive(Debug)]
struct LaneInner {
	name: Arc<str>,
	tx: mpsc::UnboundedSender<Queued>,
	pending: Arc<AtomicUsize>,
}

impl SerialLane {
	/// Creates a lane and starts its runner.
	pub fn new(class: TaskClass, name: impl Into<Arc<str>>) -> Self {
		let name: Arc<str> = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();
		let pending = Arc::new(AtomicUsize::new(0));

		let runner_name = Arc::clone(&name);
		let runner_pending = Arc::clone(&pending);
		crate::spawn(class, async move {
			while let Some(Queued { job, counted }) = rx.recv().await {
				if let Err(err) = crate::spawn_blocking(class, job).await {
					tracing::error!(lane = %runner_name, error = %err, "worker.lane.job_panicked");
				}
				if counted {
					runner_pending.fetch_sub(1, Ordering::AcqRel);
				}
			}
			tracing::trace!(lane = %runner_name, "worker.lane.closed");
		});

		tracing::debug!(lane = %name, worker_class = class.as_str(), "worker.lane.started");
		Self {
			inner: Arc::new(LaneInner { name, tx, pending }),
		}
	}

	/// Returns the lane name.
	pub fn name(&self) -> &str {
		&self.inner.name
	}

	/// Number of submitted jobs that have not finished yet.
	pub fn pending(&self) -> usize {
		self.inner.pending.load(Ordering::Acquire)
	}

	/// Queues a job. Returns `false` if the lane runner is gone.
	pub fn submit<F>(&self, job: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		self.enqueue(Box::new(job), true)
	}

	/// Blocks until every job submitted before this call has finished.
	///
	/// Must not be called from inside an async runtime thread or from a job on
	/// this lane.
	pub fn flush_blocking(&self) {
		let (tx, rx) = oneshot::channel();
		if self.enqueue(flush_marker(tx), false) {
			let _ = rx.blocking_recv();
		}
	}

	/// Waits until every job submitted before this call has finished.
	pub async fn flush(&self) {
		let (tx, rx) = oneshot::channel();
		if self.enqueue(flush_marker(tx), false) {
			let _ = rx.await;
		}
	}

	fn enqueue(&self, job: Job, counted: bool) -> bool {
		if counted {
			self.inner.pending.fetch_add(1, Ordering::AcqRel);
		}
		if self.inner.tx.send(Queued { job, counted }).is_err() {
			if counted {
				self.inner.pending.fetch_sub(1, Ordering::AcqRel);
			}
			tracing::warn!(lane = %self.inner.name, "worker.lane.submit_closed");
			return false;
		}
		true
	}
}

fn flush_marker(tx: oneshot::Sender<()>) -> Job {
	Box::new(move || {
		let _ = tx.send(());
	})
}
