//! Named task registry

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::channel::{RelayReceiver, RelaySender};
use crate::error::RelayError;
use crate::message::Envelope;

/// Identifier handed out at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u16);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

struct Registration {
    id: TaskId,
    inbox: mpsc::Sender<Envelope>,
    lost: Arc<AtomicU64>,
}

#[derive(Default)]
struct DirectoryState {
    next_id: u16,
    tasks: HashMap<String, Registration>,
}

/// Registry of tasks by name. Clones share the same registry.
#[derive(Clone, Default)]
pub struct TaskDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl TaskDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with an inbox of `depth` messages
    pub fn register(&self, name: &str, depth: usize) -> Result<Endpoint, RelayError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.tasks.contains_key(name) {
            return Err(RelayError::DuplicateTask(name.to_string()));
        }

        let id = TaskId(state.next_id);
        state.next_id = state.next_id.wrapping_add(1);

        let (tx, rx) = mpsc::channel(depth.max(1));
        let lost = Arc::new(AtomicU64::new(0));
        state.tasks.insert(
            name.to_string(),
            Registration {
                id,
                inbox: tx,
                lost: lost.clone(),
            },
        );
        debug!(name, %id, depth, "task registered");

        Ok(Endpoint {
            id,
            name: name.to_string(),
            inbox: rx,
            lost,
            directory: self.clone(),
        })
    }

    /// Look up a task id by name
    pub fn resolve(&self, name: &str) -> Result<TaskId, RelayError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .tasks
            .get(name)
            .map(|reg| reg.id)
            .ok_or_else(|| RelayError::UnknownTask(name.to_string()))
    }

    fn sender_for(&self, from: TaskId, to: &str) -> Result<RelaySender, RelayError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let reg = state
            .tasks
            .get(to)
            .ok_or_else(|| RelayError::UnknownTask(to.to_string()))?;
        Ok(RelaySender::new(from, reg.id, reg.inbox.clone(), reg.lost.clone()))
    }
}

/// A registered task: its identity and its inbox
pub struct Endpoint {
    id: TaskId,
    name: String,
    inbox: mpsc::Receiver<Envelope>,
    lost: Arc<AtomicU64>,
    directory: TaskDirectory,
}

impl Endpoint {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender posting into the inbox of the task registered as `peer`
    pub fn connect(&self, peer: &str) -> Result<RelaySender, RelayError> {
        self.directory.sender_for(self.id, peer)
    }

    /// Turn this endpoint into a receiver that accepts messages from `peer`
    /// only. The peer is resolved once, here.
    pub fn listen(self, peer: &str) -> Result<RelayReceiver, RelayError> {
        let peer_id = self.directory.resolve(peer)?;
        debug!(task = %self.name, peer, %peer_id, "listening");
        Ok(RelayReceiver::new(peer_id, self.inbox, self.lost))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
