//! Distribution of samples to the worker pool.

use flume::{Receiver, Sender};

use crate::keyspace::Sample;

/// Creates a bounded task queue holding at most `capacity` pending samples.
///
/// The [`TaskDispatcher`] is the only producer. Workers share clones of the receiver and
/// stop once the queue is closed and drained.
pub fn task_queue(capacity: usize) -> (TaskDispatcher, Receiver<Sample>) {
    let (sender, receiver) = flume::bounded(capacity);
    (TaskDispatcher { sender }, receiver)
}

/// Feeds sample indices into the task queue.
#[derive(Debug)]
pub struct TaskDispatcher {
    sender: Sender<Sample>,
}

impl TaskDispatcher {
    /// Submits samples `1..=sample_count` in order, then closes the queue.
    ///
    /// Suspends whenever the queue is full. If every worker has gone away, submission
    /// stops early. Returns the number of samples that were accepted by the queue.
    pub async fn submit(self, sample_count: u64) -> u64 {
        for index in 1..=sample_count {
            if self.sender.send_async(Sample::new(index)).await.is_err() {
                tracing::debug!(index, "task queue has no consumers left");
                return index - 1;
            }
        }

        tracing::trace!(sample_count, "all samples submitted");
        // Dropping `self` closes the queue.
        sample_count
    }
}
