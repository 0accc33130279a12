// src/sched/queue.rs

//! Bounded FIFO task queue.
//!
//! A thin mpmc layer over `tokio::sync::mpsc`: the sender side is the plain
//! bounded channel, and the receiver is wrapped in an `Arc<Mutex<..>>` so a
//! fixed pool of workers can share it. FIFO submission order is preserved;
//! which worker receives which task is unspecified.
//!
//! Closing the queue is the sole end-of-stream signal: dropping the last
//! [`TaskSender`] lets consumers drain the remaining buffered tasks and then
//! observe `None` from [`TaskReceiver::recv`].

use std::sync::Arc;

use tokio::sync::mpsc;

use super::task::Task;

/// Create a bounded task queue.
///
/// `capacity` should normally be at least the expected submission burst; an
/// undersized queue blocks the submitter until workers drain, it never drops
/// tasks.
pub fn bounded(capacity: usize) -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        TaskSender { tx },
        TaskReceiver {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        },
    )
}

/// Producer half of the task queue.
///
/// Dropping the last clone closes the queue. Sending after close is a
/// programming error and surfaces as [`SendError`].
#[derive(Clone)]
pub struct TaskSender {
    tx: mpsc::Sender<Task>,
}

/// Error returned when enqueueing into a closed queue; carries the task back.
pub type SendError = mpsc::error::SendError<Task>;

impl TaskSender {
    /// Enqueue one task, blocking while the queue is at capacity.
    pub async fn send(&self, task: Task) -> Result<(), SendError> {
        self.tx.send(task).await
    }
}

/// Consumer half of the task queue, shareable across workers.
#[derive(Clone)]
pub struct TaskReceiver {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
}

impl TaskReceiver {
    /// Receive the next task in FIFO order.
    ///
    /// Blocks while the queue is empty and open; returns `None` once the
    /// queue is closed and fully drained.
    pub async fn recv(&self) -> Option<Task> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            image: "alpine".to_string(),
            command: "sleep 2".to_string(),
        }
    }

    #[tokio::test]
    async fn tasks_come_out_in_fifo_order() {
        let (tx, rx) = bounded(8);

        for id in ["job-1", "job-2", "job-3"] {
            tx.send(task(id)).await.unwrap();
        }
        drop(tx);

        assert_eq!(rx.recv().await.unwrap().id, "job-1");
        assert_eq!(rx.recv().await.unwrap().id, "job-2");
        assert_eq!(rx.recv().await.unwrap().id, "job-3");
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn buffered_tasks_survive_close() {
        let (tx, rx) = bounded(8);
        tx.send(task("job-1")).await.unwrap();
        drop(tx);

        // Still drainable after the queue closed.
        assert_eq!(rx.recv().await.unwrap().id, "job-1");
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn each_task_is_consumed_exactly_once() {
        let (tx, rx) = bounded(16);

        for i in 1..=10 {
            tx.send(task(&format!("job-{i}"))).await.unwrap();
        }
        drop(tx);

        let mut consumers = Vec::new();
        for _ in 0..3 {
            let rx = rx.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(t) = rx.recv().await {
                    seen.push(t.id);
                }
                seen
            }));
        }

        let mut all: Vec<String> = Vec::new();
        for handle in consumers {
            all.extend(handle.await.unwrap());
        }

        all.sort();
        let expected: Vec<String> = {
            let mut v: Vec<String> = (1..=10).map(|i| format!("job-{i}")).collect();
            v.sort();
            v
        };
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn sending_into_a_closed_queue_fails() {
        let (tx, rx) = bounded(1);
        drop(rx);

        let err = tx.send(task("job-1")).await.unwrap_err();
        assert_eq!(err.0.id, "job-1");
    }

    #[tokio::test]
    async fn send_blocks_at_capacity_until_a_consumer_drains() {
        let (tx, rx) = bounded(1);
        tx.send(task("job-1")).await.unwrap();

        let blocked = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.send(task("job-2")).await })
        };

        // The second send cannot complete while the queue is full.
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        assert_eq!(rx.recv().await.unwrap().id, "job-1");
        blocked.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().id, "job-2");
    }
}
