use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use morph_contracts::{
    EventLog, GeneratedImage, SourceImage, TransformError, TransportFailure, WorkflowSnapshot,
};

use crate::client::{TransformProvider, TransformRequest};
use crate::encoder::encode;
use crate::estimator::estimate;
use crate::workflow::Workflow;

/// Estimates the aspect ratio, encodes the photo and makes the single remote call.
pub fn run_attempt(
    provider: &dyn TransformProvider,
    source: &SourceImage,
) -> Result<GeneratedImage, TransformError> {
    let aspect_ratio = estimate(source)?;
    let image = encode(source)?;
    provider.transform(&TransformRequest::new(image, aspect_ratio))
}

/// Entry points for the presentation layer.
///
/// The workflow lives behind a mutex; each attempt's network call runs on its
/// own worker thread and reports back through the attempt token, so the
/// caller stays free to read snapshots, reset or pick another photo meanwhile.
pub struct Session {
    workflow: Arc<Mutex<Workflow>>,
    provider: Arc<dyn TransformProvider>,
}

impl Session {
    pub fn new(provider: Arc<dyn TransformProvider>, events: Option<EventLog>) -> Self {
        Self {
            workflow: Arc::new(Mutex::new(Workflow::new(events))),
            provider,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn select_file(&self, source: SourceImage) {
        self.lock().select_file(source);
    }

    /// Returns the worker handle, or `None` when nothing was started. The
    /// handle yields whether the outcome was applied to the workflow.
    pub fn start_transform(&self) -> Option<JoinHandle<bool>> {
        let attempt = self.lock().start_transform()?;
        let workflow = Arc::clone(&self.workflow);
        let provider = Arc::clone(&self.provider);
        let id = attempt.id;

        let spawned = thread::Builder::new()
            .name(format!("morph-{id}"))
            .spawn(move || {
                let outcome = run_attempt(provider.as_ref(), &attempt.source);
                let mut guard = workflow.lock().unwrap_or_else(PoisonError::into_inner);
                guard.complete(attempt.id, outcome)
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.lock().complete_failure(
                    id,
                    TransformError::transport(
                        TransportFailure::Network,
                        format!("could not start transform worker: {err}"),
                    ),
                );
                None
            }
        }
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, Workflow> {
        self.workflow.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
