use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use braid_core::ids::{MessageRowId, ThreadRowId};
use braid_store::messages::MessageRow;
use braid_store::Track;

use crate::reply::ReplyEngine;
use crate::title::TitleGenerator;

/// Work deferred past the triggering request. Tasks carry everything they
/// need; there is no return channel to the enqueuer.
#[derive(Debug)]
pub enum Task {
    GenerateReply {
        track: Track,
        placeholder: MessageRowId,
        model: String,
        history: Vec<MessageRow>,
    },
    GenerateTitle {
        track: Track,
        thread: ThreadRowId,
        first_message: String,
    },
}

/// Post-commit task dispatch. Enqueueing never blocks; the worker picks
/// tasks up after the triggering operation has already returned.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, task: Task) {
        if self.tx.send(task).is_err() {
            warn!("task worker gone — deferred task dropped");
        }
    }
}

/// Execute one deferred task to completion. Upstream failures are handled
/// inside the engines; nothing propagates out of here.
pub async fn run_task(task: Task, reply: &ReplyEngine, titler: &TitleGenerator) {
    match task {
        Task::GenerateReply { track, placeholder, model, history } => {
            reply.generate(track, placeholder, &model, &history).await;
        }
        Task::GenerateTitle { track, thread, first_message } => {
            titler.generate(track, thread, &first_message).await;
        }
    }
}

/// Consume the queue, running each task as an independent tokio task.
/// Tasks spawned from the same operation have no defined relative ordering.
pub fn spawn_worker(
    mut rx: mpsc::UnboundedReceiver<Task>,
    reply: Arc<ReplyEngine>,
    titler: Arc<TitleGenerator>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            let reply = Arc::clone(&reply);
            let titler = Arc::clone(&titler);
            tokio::spawn(async move {
                run_task(task, &reply, &titler).await;
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_delivers_in_order() {
        let (queue, mut rx) = TaskQueue::new();
        queue.enqueue(Task::GenerateTitle {
            track: Track::Permanent,
            thread: ThreadRowId::from_raw(1),
            first_message: "a".into(),
        });
        queue.enqueue(Task::GenerateTitle {
            track: Track::Permanent,
            thread: ThreadRowId::from_raw(2),
            first_message: "b".into(),
        });

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, Task::GenerateTitle { thread, .. } if thread.as_i64() == 1));
        let second = rx.try_recv().unwrap();
        assert!(matches!(second, Task::GenerateTitle { thread, .. } if thread.as_i64() == 2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn enqueue_after_receiver_dropped_does_not_panic() {
        let (queue, rx) = TaskQueue::new();
        drop(rx);
        queue.enqueue(Task::GenerateTitle {
            track: Track::Temporary,
            thread: ThreadRowId::from_raw(1),
            first_message: "orphan".into(),
        });
    }
}
