//! Two-priority deferred job queues and the module "loading finished" signal.
//!
//! The immediate queue is always drained before the next tick job runs, so work queued with
//! [`Runtime::queue_immediate`] behaves like a microtask relative to [`Runtime::queue_tick`].

use std::collections::VecDeque;

use tracing::{error, trace, warn};

use crate::runner::ds::error::ClassError;
use crate::runner::runtime::Runtime;

pub type Job = Box<dyn FnOnce(&mut Runtime) -> Result<(), ClassError>>;

/// Receives `true` if loading had already finished when the callback was registered.
pub type LoadedCallback = Box<dyn FnOnce(&mut Runtime, bool) -> Result<(), ClassError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loading,
    Loaded,
}

pub struct Scheduler {
    immediate: VecDeque<Job>,
    tick: VecDeque<Job>,
    state: LoadState,
    loaded_callbacks: Vec<LoadedCallback>,
}
impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            immediate: VecDeque::new(),
            tick: VecDeque::new(),
            state: LoadState::Pending,
            loaded_callbacks: vec![],
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn pending_jobs(&self) -> usize {
        self.immediate.len() + self.tick.len()
    }

    fn next_job(&mut self) -> Option<Job> {
        self.immediate.pop_front().or_else(|| self.tick.pop_front())
    }
}
impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Runtime {
    pub fn queue_immediate<F>(&mut self, job: F)
    where
        F: FnOnce(&mut Runtime) -> Result<(), ClassError> + 'static,
    {
        self.scheduler.immediate.push_back(Box::new(job));
    }

    pub fn queue_tick<F>(&mut self, job: F)
    where
        F: FnOnce(&mut Runtime) -> Result<(), ClassError> + 'static,
    {
        self.scheduler.tick.push_back(Box::new(job));
    }

    pub fn is_loaded(&self) -> bool {
        self.scheduler.state == LoadState::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.scheduler.state == LoadState::Loading
    }

    /// Runs `callback(true)` now if loading already finished, otherwise keeps it for
    /// [`Runtime::finish_loading`].
    pub fn on_loaded<F>(&mut self, callback: F) -> Result<(), ClassError>
    where
        F: FnOnce(&mut Runtime, bool) -> Result<(), ClassError> + 'static,
    {
        if self.is_loaded() {
            callback(self, true)
        } else {
            self.scheduler.loaded_callbacks.push(Box::new(callback));
            Ok(())
        }
    }

    pub fn begin_loading(&mut self) {
        if self.scheduler.state == LoadState::Pending {
            self.scheduler.state = LoadState::Loading;
        }
    }

    /// Marks loading as finished and runs every parked load callback in registration order.
    /// All callbacks run even if one fails; the first failure is returned.
    pub fn finish_loading(&mut self) -> Result<(), ClassError> {
        if self.is_loaded() {
            return Ok(());
        }
        self.scheduler.state = LoadState::Loaded;
        let callbacks = std::mem::take(&mut self.scheduler.loaded_callbacks);
        trace!(callbacks = callbacks.len(), "loading finished");
        let mut first_error = None;
        for callback in callbacks {
            if let Err(e) = callback(self, false) {
                warn!(error = %e, "load callback failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drives both queues until they are empty. Returns the number of jobs run.
    ///
    /// A failing job stops the drive and its error is returned; jobs still queued stay queued.
    pub fn run_until_idle(&mut self) -> Result<usize, ClassError> {
        let budget = self.config.scheduler.job_budget;
        let mut ran = 0;
        while self.scheduler.pending_jobs() > 0 {
            if let Some(limit) = budget {
                if ran >= limit {
                    error!(limit, "scheduler job budget exhausted");
                    return Err(ClassError::BudgetExhausted(limit));
                }
            }
            let job = match self.scheduler.next_job() {
                Some(job) => job,
                None => break,
            };
            ran += 1;
            if let Err(e) = job(self) {
                warn!(error = %e, "deferred job failed");
                return Err(e);
            }
        }
        Ok(ran)
    }
}
