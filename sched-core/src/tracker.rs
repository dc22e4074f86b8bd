//! Per-front completion tracking.
//!
//! Two signal slots per front plus a memo of whether the pull was issued:
//!
//! - `ready[f]`: handed over by the kernel launch, consumed by the pull.
//! - `pulled[f]`: created by the pull, consumed by the finish.
//! - `data_pulled[f]`: set once the pull is issued, never cleared.

use crate::signal::CompletionSignal;

#[derive(Debug)]
pub struct CompletionTracker<S> {
    ready: Vec<Option<S>>,
    pulled: Vec<Option<S>>,
    data_pulled: Vec<bool>,
}

impl<S: CompletionSignal> CompletionTracker<S> {
    pub fn new(num_fronts: usize) -> Self {
        Self {
            ready: (0..num_fronts).map(|_| None).collect(),
            pulled: (0..num_fronts).map(|_| None).collect(),
            data_pulled: vec![false; num_fronts],
        }
    }

    pub fn has_ready(&self, f: usize) -> bool {
        self.ready[f].is_some()
    }

    pub fn has_pulled(&self, f: usize) -> bool {
        self.pulled[f].is_some()
    }

    pub fn is_data_pulled(&self, f: usize) -> bool {
        self.data_pulled[f]
    }

    pub fn ready_signal(&self, f: usize) -> Option<&S> {
        self.ready[f].as_ref()
    }

    pub fn pulled_signal(&self, f: usize) -> Option<&S> {
        self.pulled[f].as_ref()
    }

    /// Store the ready signal. Gives the signal back if the slot is taken.
    pub fn set_ready(&mut self, f: usize, signal: S) -> Result<(), S> {
        match self.ready[f] {
            Some(_) => Err(signal),
            None => {
                self.ready[f] = Some(signal);
                Ok(())
            }
        }
    }

    pub fn take_ready(&mut self, f: usize) -> Option<S> {
        self.ready[f].take()
    }

    pub fn set_pulled(&mut self, f: usize, signal: S) {
        self.pulled[f] = Some(signal);
        self.data_pulled[f] = true;
    }

    pub fn take_pulled(&mut self, f: usize) -> Option<S> {
        self.pulled[f].take()
    }

    /// Outstanding (ready, pulled) signal counts.
    pub fn outstanding(&self) -> (usize, usize) {
        let ready = self.ready.iter().filter(|s| s.is_some()).count();
        let pulled = self.pulled.iter().filter(|s| s.is_some()).count();
        (ready, pulled)
    }

    /// Remove every outstanding signal, returning them for destruction.
    pub fn drain(&mut self) -> Vec<S> {
        self.ready
            .iter_mut()
            .chain(self.pulled.iter_mut())
            .filter_map(Option::take)
            .collect()
    }
}
