use std::thread;
use std::time::Duration;

use log::debug;

use crate::services::{BatchPredictionService, JobHandle, JobState, ServiceError};

/// Cadencia de sondeo de jobs remotos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Tope de consultas; `None` espera indefinidamente.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30),
               max_polls: None }
    }
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self { interval,
               max_polls: None }
    }
}

/// Bloquea hasta que el job llegue a un estado terminal y lo devuelve.
pub fn wait_for_job(service: &dyn BatchPredictionService,
                    handle: &JobHandle,
                    policy: &PollPolicy)
                    -> Result<JobState, ServiceError> {
    let mut polls = 0u32;
    loop {
        let state = service.state(handle)?;
        polls += 1;
        if state.is_terminal() {
            debug!("job {} terminal after {polls} polls: {state:?}", handle.resource_name);
            return Ok(state);
        }
        if policy.max_polls.is_some_and(|max| polls >= max) {
            return Err(ServiceError::Unavailable(format!("job {} still {state:?} after {polls} polls",
                                                         handle.resource_name)));
        }
        thread::sleep(policy.interval);
    }
}
