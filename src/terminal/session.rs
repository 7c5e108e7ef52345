use crate::events::{ListenerSet, Subscription};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Exited,
    Killed,
}

/// Payload of the exit event: `{ code, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub command: String,
    pub cwd: PathBuf,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

type ExitListener = Box<dyn FnOnce(&ExitReport) + Send>;

struct ExitSlot {
    report: Option<ExitReport>,
    next_id: u64,
    waiters: Vec<(u64, ExitListener)>,
}

/// Recent output, oldest first, capped at `limit` bytes.
struct Backlog {
    chunks: VecDeque<String>,
    bytes: usize,
    limit: usize,
    closed: bool,
}

impl Backlog {
    fn push(&mut self, chunk: &str) {
        self.chunks.push_back(chunk.to_string());
        self.bytes += chunk.len();
        while self.bytes > self.limit {
            match self.chunks.pop_front() {
                Some(old) => self.bytes -= old.len(),
                None => break,
            }
        }
    }
}

/// Per-session broadcast: ordered data chunks, then exactly one exit.
///
/// Only the session's pump thread publishes, so data and exit for one
/// session can never reorder. Publishing and subscribing to data both hold
/// the backlog lock, so a new subscriber sees the backlog and then every
/// live chunk exactly once. The lock is reentrant so a data listener may
/// subscribe to its own session.
pub(crate) struct SessionEvents {
    data: ListenerSet<str>,
    backlog: ReentrantMutex<RefCell<Backlog>>,
    exit: Mutex<ExitSlot>,
}

impl SessionEvents {
    pub(crate) fn new(backlog_bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            data: ListenerSet::new(),
            backlog: ReentrantMutex::new(RefCell::new(Backlog {
                chunks: VecDeque::new(),
                bytes: 0,
                limit: backlog_bytes,
                closed: false,
            })),
            exit: Mutex::new(ExitSlot {
                report: None,
                next_id: 1,
                waiters: Vec::new(),
            }),
        })
    }

    /// Replays the retained output to `listener`, then subscribes it to live
    /// chunks. After exit only the replay happens.
    pub(crate) fn on_data(&self, listener: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        let guard = self.backlog.lock();
        let (replay, closed) = {
            let backlog = guard.borrow();
            (backlog.chunks.iter().cloned().collect::<Vec<_>>(), backlog.closed)
        };
        for chunk in &replay {
            listener(chunk.as_str());
        }
        if closed {
            return Subscription::inert();
        }
        self.data.subscribe(listener)
    }

    /// Registers `listener` for the exit event. If the session is already
    /// gone the recorded report is replayed immediately.
    pub(crate) fn on_exit(
        self: &Arc<Self>,
        listener: impl FnOnce(&ExitReport) + Send + 'static,
    ) -> Subscription {
        let mut slot = self.exit.lock();
        if let Some(report) = slot.report.clone() {
            drop(slot);
            listener(&report);
            return Subscription::inert();
        }

        let id = slot.next_id;
        slot.next_id += 1;
        slot.waiters.push((id, Box::new(listener)));
        drop(slot);

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(events) = weak.upgrade() {
                events.exit.lock().waiters.retain(|(w, _)| *w != id);
            }
        })
    }

    pub(crate) fn publish_data(&self, chunk: &str) {
        let guard = self.backlog.lock();
        guard.borrow_mut().push(chunk);
        self.data.emit(chunk);
    }

    pub(crate) fn publish_exit(&self, report: ExitReport) {
        let waiters = {
            let mut slot = self.exit.lock();
            if slot.report.is_some() {
                return;
            }
            slot.report = Some(report.clone());
            std::mem::take(&mut slot.waiters)
        };
        {
            let guard = self.backlog.lock();
            guard.borrow_mut().closed = true;
            self.data.clear();
        }
        for (_, waiter) in waiters {
            waiter(&report);
        }
    }
}
