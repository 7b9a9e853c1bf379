//! Call logging and fault injection for the in-memory provider sandboxes

use crate::TransportError;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Error returned by an operation, optionally after some successful calls
#[derive(Clone, Debug)]
pub struct Fault {
    error: TransportError,
    skip: u32,
    remaining: Option<u32>,
}

impl Fault {
    /// Fail every call
    pub fn always(error: TransportError) -> Self {
        Self {
            error,
            skip: 0,
            remaining: None,
        }
    }

    /// Fail the next `count` calls, then succeed
    pub fn times(count: u32, error: TransportError) -> Self {
        Self {
            error,
            skip: 0,
            remaining: Some(count),
        }
    }

    /// Let the first `skip` calls through before failing
    pub fn after(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    fn trigger(&mut self) -> Option<TransportError> {
        if self.skip > 0 {
            self.skip -= 1;
            return None;
        }
        match self.remaining {
            None => Some(self.error.clone()),
            Some(0) => None,
            Some(n) => {
                self.remaining = Some(n - 1);
                Some(self.error.clone())
            }
        }
    }
}

#[derive(Debug)]
struct State<Op> {
    calls: Vec<Op>,
    faults: HashMap<Op, Fault>,
}

/// Per-client record of issued operations and the faults armed for them.
///
/// Clones share the same record.
#[derive(Clone, Debug)]
pub struct FaultInjector<Op> {
    state: Arc<Mutex<State<Op>>>,
}

impl<Op> Default for FaultInjector<Op> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                calls: Vec::new(),
                faults: HashMap::new(),
            })),
        }
    }
}

impl<Op> FaultInjector<Op>
where
    Op: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `fault` for `op`, replacing any previous one
    pub fn inject(&self, op: Op, fault: Fault) {
        self.lock().faults.insert(op, fault);
    }

    pub fn clear(&self) {
        self.lock().faults.clear();
    }

    /// Record a call to `op` and return the armed error, if any
    pub fn check(&self, op: Op) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(op);
        match state.faults.get_mut(&op).and_then(Fault::trigger) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<Op> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|call| **call == op).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<Op>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
