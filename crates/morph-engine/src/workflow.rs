use morph_contracts::{
    AttemptId, EventLog, GeneratedImage, SourceImage, TransformError, WorkflowEvent,
    WorkflowSnapshot, WorkflowState,
};
use sha2::{Digest, Sha256};

use crate::preview::PreviewHandle;

const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong during transformation.";

/// Work handed out by [`Workflow::start_transform`]: the token that must come
/// back with the outcome, plus the source to transform.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: AttemptId,
    pub source: SourceImage,
}

/// Lifecycle of one photo through the transform: idle, processing, success or error.
///
/// Every transition goes through a method here. Completions carry the
/// [`AttemptId`] they were started with and are ignored unless that attempt
/// is still the one in flight, so a reset or a new selection made while a
/// call is outstanding cannot be overwritten by its late result.
#[derive(Debug)]
pub struct Workflow {
    state: WorkflowState,
    source: Option<SourceImage>,
    preview: Option<PreviewHandle>,
    result: Option<GeneratedImage>,
    error_message: Option<String>,
    credential_error: bool,
    attempt: Option<AttemptId>,
    attempts_started: u64,
    events: Option<EventLog>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Workflow {
    pub fn new(events: Option<EventLog>) -> Self {
        Self {
            state: WorkflowState::Idle,
            source: None,
            preview: None,
            result: None,
            error_message: None,
            credential_error: false,
            attempt: None,
            attempts_started: 0,
            events,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&GeneratedImage> {
        self.result.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Starts over with a new photo, dropping any result, error or in-flight attempt.
    pub fn select_file(&mut self, source: SourceImage) {
        let superseded = self.in_flight();
        self.release_preview();
        self.preview = match PreviewHandle::create(&source) {
            Ok(preview) => Some(preview),
            Err(err) => {
                tracing::warn!(error = %err, "could not write preview file");
                None
            }
        };

        let summary = source.summary();
        let digest = hex::encode(Sha256::digest(source.bytes()));
        self.source = Some(source);
        self.clear_outcome();
        self.attempt = None;
        self.state = WorkflowState::Idle;

        self.emit(WorkflowEvent::FileSelected {
            mime_type: summary.mime_type,
            width: summary.width,
            height: summary.height,
            byte_len: summary.byte_len,
            sha256: digest,
            superseded_attempt: superseded,
        });
    }

    /// Enters `Processing` and returns the attempt to run, or `None` when there
    /// is no photo or an attempt is already in flight.
    pub fn start_transform(&mut self) -> Option<Attempt> {
        if self.state == WorkflowState::Processing {
            tracing::debug!("transform already in flight; ignoring start");
            return None;
        }
        let source = self.source.clone()?;

        // Regenerating from Success must not keep showing the previous image.
        self.clear_outcome();
        self.attempts_started += 1;
        let id = AttemptId::new(self.attempts_started);
        self.attempt = Some(id);
        self.state = WorkflowState::Processing;

        self.emit(WorkflowEvent::TransformStarted { attempt: id });
        Some(Attempt { id, source })
    }

    pub fn complete_success(&mut self, id: AttemptId, image: GeneratedImage) -> bool {
        if !self.accepts_completion(id, "success") {
            return false;
        }
        self.emit(WorkflowEvent::TransformSucceeded {
            attempt: id,
            mime_type: image.mime_type.clone(),
            payload_chars: image.data.len(),
        });
        self.result = Some(image);
        self.state = WorkflowState::Success;
        true
    }

    pub fn complete_failure(&mut self, id: AttemptId, error: TransformError) -> bool {
        if !self.accepts_completion(id, "failure") {
            return false;
        }
        let rendered = error.to_string();
        let message = if rendered.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            rendered
        };
        self.emit(WorkflowEvent::TransformFailed {
            attempt: id,
            error_kind: error.kind_label().to_string(),
            message: message.clone(),
        });
        self.credential_error = error.is_credential_error();
        self.error_message = Some(message);
        self.state = WorkflowState::Error;
        true
    }

    pub fn complete(
        &mut self,
        id: AttemptId,
        outcome: Result<GeneratedImage, TransformError>,
    ) -> bool {
        match outcome {
            Ok(image) => self.complete_success(id, image),
            Err(error) => self.complete_failure(id, error),
        }
    }

    /// Clears everything, including the selected photo.
    pub fn reset(&mut self) {
        let superseded = self.in_flight();
        self.release_preview();
        self.source = None;
        self.clear_outcome();
        self.attempt = None;
        self.state = WorkflowState::Idle;
        self.emit(WorkflowEvent::WorkflowReset {
            superseded_attempt: superseded,
        });
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            state: self.state,
            source: self.source.as_ref().map(SourceImage::summary),
            preview_path: self
                .preview
                .as_ref()
                .map(|preview| preview.path().to_path_buf()),
            result: self.result.clone(),
            error: self.error_message.clone(),
            credential_error: self.credential_error,
            attempt: self.attempt,
        }
    }

    fn in_flight(&self) -> Option<AttemptId> {
        if self.state == WorkflowState::Processing {
            self.attempt
        } else {
            None
        }
    }

    fn accepts_completion(&mut self, id: AttemptId, outcome: &str) -> bool {
        if self.in_flight() == Some(id) {
            return true;
        }
        tracing::info!(
            attempt = id.value(),
            current = ?self.attempt.map(AttemptId::value),
            state = self.state.as_str(),
            outcome,
            "discarding stale transform completion"
        );
        self.emit(WorkflowEvent::CompletionDiscarded {
            attempt: id,
            outcome: outcome.to_string(),
            state: self.state,
        });
        false
    }

    fn clear_outcome(&mut self) {
        self.result = None;
        self.error_message = None;
        self.credential_error = false;
    }

    fn release_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            let path = preview.path().to_path_buf();
            drop(preview);
            self.emit(WorkflowEvent::PreviewReleased { path });
        }
    }

    fn emit(&self, event: WorkflowEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.record(&event) {
            tracing::warn!(event = event.kind(), error = %err, "failed to append workflow event");
        }
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        self.release_preview();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use morph_contracts::{
        AttemptId, EventLog, GeneratedImage, SourceImage, TransformError, TransportFailure,
        WorkflowEvent, WorkflowState,
    };

    use super::Workflow;

    fn source_for_test(tag: u8) -> SourceImage {
        SourceImage::new(vec![tag; 64], "image/png", 40, 30).expect("valid test source")
    }

    #[test]
    fn new_workflow_is_idle_and_empty() {
        let workflow = Workflow::default();
        let snapshot = workflow.snapshot();
        assert_eq!(snapshot.state, WorkflowState::Idle);
        assert!(snapshot.source.is_none());
        assert!(snapshot.result.is_none());
        assert!(snapshot.error.is_none());
        assert!(snapshot.attempt.is_none());
    }

    #[test]
    fn start_without_source_is_a_noop() {
        let mut workflow = Workflow::default();
        assert!(workflow.start_transform().is_none());
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[test]
    fn success_path_stores_result() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        assert_eq!(workflow.state(), WorkflowState::Processing);
        assert!(workflow.result().is_none());
        assert!(workflow.error_message().is_none());

        assert!(workflow.complete_success(attempt.id, GeneratedImage::png("SU1H")));
        let snapshot = workflow.snapshot();
        assert_eq!(snapshot.state, WorkflowState::Success);
        assert_eq!(snapshot.result, Some(GeneratedImage::png("SU1H")));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn second_start_while_processing_is_refused() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let first = workflow.start_transform().expect("attempt starts");
        assert!(workflow.start_transform().is_none());
        assert_eq!(workflow.snapshot().attempt, Some(first.id));
    }

    #[test]
    fn refusal_reaches_error_with_verbatim_message_and_allows_retry() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        assert!(workflow.complete_failure(
            attempt.id,
            TransformError::Refusal("unsafe content".to_string())
        ));

        let snapshot = workflow.snapshot();
        assert_eq!(snapshot.state, WorkflowState::Error);
        assert_eq!(snapshot.error.as_deref(), Some("unsafe content"));
        assert!(snapshot.result.is_none());
        assert!(!snapshot.credential_error);

        let retry = workflow.start_transform().expect("retry reuses the source");
        assert!(retry.id > attempt.id);
        assert_eq!(retry.source, source_for_test(1));
        assert!(workflow.error_message().is_none());
    }

    #[test]
    fn credential_failures_are_flagged_in_snapshot() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.complete(attempt.id, Err(TransformError::credential("API key not set")));
        let snapshot = workflow.snapshot();
        assert!(snapshot.credential_error);
        assert_eq!(snapshot.error.as_deref(), Some("API key not set"));
    }

    #[test]
    fn empty_failure_text_falls_back_to_generic_message() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.complete_failure(attempt.id, TransformError::Refusal("  ".to_string()));
        assert_eq!(
            workflow.error_message(),
            Some("Something went wrong during transformation.")
        );
    }

    #[test]
    fn regenerate_clears_previous_result_before_processing() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let first = workflow.start_transform().expect("attempt starts");
        workflow.complete_success(first.id, GeneratedImage::png("Rk9P"));

        let second = workflow.start_transform().expect("regenerate starts");
        assert_ne!(first.id, second.id);
        assert_eq!(workflow.state(), WorkflowState::Processing);
        assert!(workflow.result().is_none());
    }

    #[test]
    fn selecting_new_file_after_success_clears_result() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.complete_success(attempt.id, GeneratedImage::png("Rk9P"));

        workflow.select_file(source_for_test(2));
        let snapshot = workflow.snapshot();
        assert_eq!(snapshot.state, WorkflowState::Idle);
        assert!(snapshot.result.is_none());
        assert!(snapshot.attempt.is_none());
        assert_eq!(workflow.source(), Some(&source_for_test(2)));
    }

    #[test]
    fn late_completion_after_reset_is_discarded() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.reset();

        assert!(!workflow.complete_success(attempt.id, GeneratedImage::png("TEFURQ==")));
        let snapshot = workflow.snapshot();
        assert_eq!(snapshot.state, WorkflowState::Idle);
        assert!(snapshot.result.is_none());
        assert!(snapshot.source.is_none());
    }

    #[test]
    fn late_completion_for_superseded_attempt_is_discarded() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let stale = workflow.start_transform().expect("attempt starts");
        workflow.select_file(source_for_test(2));
        let fresh = workflow.start_transform().expect("attempt starts");

        assert!(!workflow.complete_failure(
            stale.id,
            TransformError::transport(TransportFailure::Network, "socket closed")
        ));
        assert_eq!(workflow.state(), WorkflowState::Processing);

        assert!(workflow.complete_success(fresh.id, GeneratedImage::png("TkVX")));
        assert!(!workflow.complete_success(fresh.id, GeneratedImage::png("RFVQ")));
        assert_eq!(workflow.result(), Some(&GeneratedImage::png("TkVX")));
        assert!(!workflow.complete_success(AttemptId::new(99), GeneratedImage::png("WA==")));
    }

    #[test]
    fn preview_is_released_on_replace_reset_and_drop() {
        let mut workflow = Workflow::default();
        workflow.select_file(source_for_test(1));
        let first = workflow.snapshot().preview_path.expect("preview written");
        assert!(first.exists());

        workflow.select_file(source_for_test(2));
        let second = workflow.snapshot().preview_path.expect("preview written");
        assert!(!first.exists());
        assert!(second.exists());

        workflow.reset();
        assert!(!second.exists());
        assert!(workflow.snapshot().preview_path.is_none());

        workflow.select_file(source_for_test(3));
        let third = workflow.snapshot().preview_path.expect("preview written");
        drop(workflow);
        assert!(!third.exists());
    }

    fn read_events(path: &std::path::Path) -> anyhow::Result<Vec<WorkflowEvent>> {
        Ok(fs::read_to_string(path)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?)
    }

    #[test]
    fn transitions_are_logged_as_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let log = EventLog::open(&events_path, "session-test")?;
        let mut workflow = Workflow::new(Some(log));

        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.reset();
        workflow.complete_success(attempt.id, GeneratedImage::png("SU1H"));

        let events = read_events(&events_path)?;
        let kinds: Vec<&str> = events.iter().map(WorkflowEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "file_selected",
                "transform_started",
                "preview_released",
                "workflow_reset",
                "completion_discarded",
            ]
        );
        assert_eq!(
            events[3],
            WorkflowEvent::WorkflowReset {
                superseded_attempt: Some(attempt.id),
            }
        );
        assert_eq!(
            events[4],
            WorkflowEvent::CompletionDiscarded {
                attempt: attempt.id,
                outcome: "success".to_string(),
                state: WorkflowState::Idle,
            }
        );
        Ok(())
    }

    #[test]
    fn failure_event_carries_kind_and_rendered_message() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut workflow = Workflow::new(Some(EventLog::open(&events_path, "session-test")?));

        workflow.select_file(source_for_test(1));
        let attempt = workflow.start_transform().expect("attempt starts");
        workflow.complete_failure(attempt.id, TransformError::credential("rejected (401)"));

        let events = read_events(&events_path)?;
        assert!(matches!(
            events.first(),
            Some(WorkflowEvent::FileSelected {
                width: 40,
                height: 30,
                byte_len: 64,
                superseded_attempt: None,
                ..
            })
        ));
        assert_eq!(
            events.last(),
            Some(&WorkflowEvent::TransformFailed {
                attempt: attempt.id,
                error_kind: "credential".to_string(),
                message: "API key problem: rejected (401)".to_string(),
            })
        );
        Ok(())
    }
}
