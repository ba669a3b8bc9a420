//! Host audio context: lifecycle state and live-graph accounting.
//!
//! A context starts suspended (host autoplay rules) and must be resumed
//! before nodes can be connected. It admits one live graph at a time; the
//! [`GraphSlot`] returned on admission frees the slot when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

#[derive(Debug)]
pub struct AudioContext {
    state: ContextState,
    live_graphs: Arc<AtomicUsize>,
    graphs_built: AtomicU64,
}

impl Default for AudioContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioContext {
    pub fn new() -> Self {
        Self {
            state: ContextState::Suspended,
            live_graphs: Arc::new(AtomicUsize::new(0)),
            graphs_built: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Wait for the context to leave the suspended state.
    pub async fn resume(&mut self) -> Result<(), GraphError> {
        match self.state {
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                log::debug!("audio context resumed");
                self.state = ContextState::Running;
                Ok(())
            }
            ContextState::Closed => Err(GraphError::ContextClosed),
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    /// Close for good. Later builds fail.
    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    /// Number of graphs currently holding a slot.
    pub fn live_graph_count(&self) -> usize {
        self.live_graphs.load(Ordering::SeqCst)
    }

    /// Total graphs admitted over the context's life.
    pub fn graphs_built(&self) -> u64 {
        self.graphs_built.load(Ordering::SeqCst)
    }

    /// Admit a new graph, or refuse while another is live.
    pub(crate) fn admit_graph(&self) -> Result<GraphSlot, GraphError> {
        if self.state != ContextState::Running {
            return Err(GraphError::ContextSuspended);
        }
        self.live_graphs
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| GraphError::GraphAlreadyLive)?;
        let id = self.graphs_built.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GraphSlot {
            id,
            live_graphs: self.live_graphs.clone(),
        })
    }
}

/// Proof that a graph holds the context's single live slot.
#[derive(Debug)]
pub(crate) struct GraphSlot {
    id: u64,
    live_graphs: Arc<AtomicUsize>,
}

impl GraphSlot {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for GraphSlot {
    fn drop(&mut self) {
        self.live_graphs.fetch_sub(1, Ordering::SeqCst);
    }
}
