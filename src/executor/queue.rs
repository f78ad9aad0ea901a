/*!
 * Task Queues
 * Pluggable queue disciplines for the worker pool
 */

use crate::core::config::QueueKind;
use crate::core::id::{ProcessIdentity, ProcessKey};
use crate::process::ProcessTask;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Result of polling a queue
pub enum Poll {
    /// A task to run now
    Ready(Arc<ProcessTask>),
    /// Nothing runnable; wait until the instant (or for a push)
    Wait(Option<Instant>),
}

pub trait TaskQueue: Send {
    fn push(&mut self, task: Arc<ProcessTask>);

    fn poll(&mut self, now: Instant) -> Poll;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in no particular order
    fn tasks(&self) -> Vec<Arc<ProcessTask>>;

    /// Remove and return every task for which `remove` is true
    fn extract(&mut self, remove: &mut dyn FnMut(&ProcessTask) -> bool) -> Vec<Arc<ProcessTask>>;

    fn drain(&mut self) -> Vec<Arc<ProcessTask>> {
        self.extract(&mut |_| true)
    }

    fn contains(&self, key: &ProcessKey) -> bool {
        self.tasks().iter().any(|t| &t.process_key() == key)
    }
}

/// Earliest due instant first; a task is not handed out before it is due
#[derive(Default)]
pub struct DelayQueue {
    heap: BinaryHeap<Reverse<Arc<ProcessTask>>>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for DelayQueue {
    fn push(&mut self, task: Arc<ProcessTask>) {
        self.heap.push(Reverse(task));
    }

    fn poll(&mut self, now: Instant) -> Poll {
        match self.heap.peek().map(|Reverse(head)| head.due()) {
            Some(due) if due <= now => match self.heap.pop() {
                Some(Reverse(task)) => Poll::Ready(task),
                None => Poll::Wait(None),
            },
            Some(due) => Poll::Wait(Some(due)),
            None => Poll::Wait(None),
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn tasks(&self) -> Vec<Arc<ProcessTask>> {
        self.heap.iter().map(|Reverse(t)| t.clone()).collect()
    }

    fn extract(&mut self, remove: &mut dyn FnMut(&ProcessTask) -> bool) -> Vec<Arc<ProcessTask>> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .partition(|Reverse(t)| remove(t));
        self.heap = BinaryHeap::from(kept);
        let mut removed: Vec<Arc<ProcessTask>> = removed.into_iter().map(|Reverse(t)| t).collect();
        removed.sort();
        removed
    }
}

/// Submission order, delays ignored
#[derive(Default)]
pub struct FifoQueue {
    tasks: VecDeque<Arc<ProcessTask>>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for FifoQueue {
    fn push(&mut self, task: Arc<ProcessTask>) {
        self.tasks.push_back(task);
    }

    fn poll(&mut self, _now: Instant) -> Poll {
        match self.tasks.pop_front() {
            Some(task) => Poll::Ready(task),
            None => Poll::Wait(None),
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn tasks(&self) -> Vec<Arc<ProcessTask>> {
        self.tasks.iter().cloned().collect()
    }

    fn extract(&mut self, remove: &mut dyn FnMut(&ProcessTask) -> bool) -> Vec<Arc<ProcessTask>> {
        extract_deque(&mut self.tasks, remove)
    }
}

/// Most recent submission first, delays ignored
#[derive(Default)]
pub struct LifoQueue {
    tasks: VecDeque<Arc<ProcessTask>>,
}

impl LifoQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for LifoQueue {
    fn push(&mut self, task: Arc<ProcessTask>) {
        self.tasks.push_back(task);
    }

    fn poll(&mut self, _now: Instant) -> Poll {
        match self.tasks.pop_back() {
            Some(task) => Poll::Ready(task),
            None => Poll::Wait(None),
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn tasks(&self) -> Vec<Arc<ProcessTask>> {
        self.tasks.iter().cloned().collect()
    }

    fn extract(&mut self, remove: &mut dyn FnMut(&ProcessTask) -> bool) -> Vec<Arc<ProcessTask>> {
        extract_deque(&mut self.tasks, remove)
    }
}

fn extract_deque(
    tasks: &mut VecDeque<Arc<ProcessTask>>,
    remove: &mut dyn FnMut(&ProcessTask) -> bool,
) -> Vec<Arc<ProcessTask>> {
    let mut removed = Vec::new();
    tasks.retain(|t| {
        if remove(t) {
            removed.push(t.clone());
            false
        } else {
            true
        }
    });
    removed
}

pub fn make_queue(kind: QueueKind) -> Box<dyn TaskQueue> {
    match kind {
        QueueKind::Fifo => Box::new(FifoQueue::new()),
        QueueKind::Lifo => Box::new(LifoQueue::new()),
        QueueKind::Delay => Box::new(DelayQueue::new()),
    }
}
