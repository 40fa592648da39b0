use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::dispatch::{GenerateRequest, Provider};
use crate::error::CxError;
use crate::parsers::Detail;

/// Staged changes as plain text, as produced by the version-control wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    pub diff: String,
    /// `git diff --cached --stat` output.
    pub summary: String,
}

/// What the user has fixed so far in the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub commit_type: Option<String>,
    pub scope: Option<String>,
    pub subject: Option<String>,
}

/// Single result message for a background generation.
#[derive(Debug)]
pub enum GenerationEvent {
    Subjects(Result<Vec<String>, CxError>),
    Detail(Result<Detail, CxError>),
}

/// The two calls an interactive front end makes into the generation core.
///
/// Both are single blocking (awaited) calls that return a result or one
/// descriptive error. Nothing is retried here; a "regenerate" action simply
/// calls again.
#[derive(Clone)]
pub struct CommitPipeline {
    provider: Arc<dyn Provider>,
    candidates: usize,
}

impl CommitPipeline {
    pub fn new(provider: Arc<dyn Provider>, candidates: usize) -> Self {
        Self {
            provider,
            candidates: candidates.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn supports_detail(&self) -> bool {
        self.provider.supports_detail()
    }

    fn request(&self, changes: &StagedChanges, selection: &Selection) -> GenerateRequest {
        GenerateRequest {
            diff: changes.diff.clone(),
            file_summary: changes.summary.clone(),
            commit_type: selection.commit_type.clone(),
            scope: selection.scope.clone(),
            subject: selection.subject.clone(),
            candidate_count: self.candidates,
        }
    }

    /// Phase one: candidate subject lines.
    pub async fn suggest_subjects(
        &self,
        changes: &StagedChanges,
        selection: &Selection,
    ) -> Result<Vec<String>, CxError> {
        let req = self.request(changes, selection);
        self.provider.generate(&req).await
    }

    /// Phase two: body and footer for the chosen subject.
    pub async fn suggest_detail(
        &self,
        changes: &StagedChanges,
        selection: &Selection,
    ) -> Result<Detail, CxError> {
        let detail = self
            .provider
            .as_detail()
            .ok_or_else(|| CxError::DetailUnsupported {
                backend: self.provider.name().to_string(),
            })?;

        let req = self.request(changes, selection);
        if req.subject().is_none() {
            return Err(CxError::config(
                "subject",
                "a subject must be chosen before generating body and footer",
            ));
        }
        detail.generate_detail(&req).await
    }

    /// Run [`Self::suggest_subjects`] on a background task; exactly one
    /// [`GenerationEvent::Subjects`] is sent on `events`.
    pub fn spawn_subjects(
        &self,
        changes: StagedChanges,
        selection: Selection,
        events: UnboundedSender<GenerationEvent>,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let result = pipeline.suggest_subjects(&changes, &selection).await;
            // Receiver gone means the UI quit; nothing left to report to.
            let _ = events.send(GenerationEvent::Subjects(result));
        })
    }

    /// Run [`Self::suggest_detail`] on a background task; exactly one
    /// [`GenerationEvent::Detail`] is sent on `events`.
    pub fn spawn_detail(
        &self,
        changes: StagedChanges,
        selection: Selection,
        events: UnboundedSender<GenerationEvent>,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let result = pipeline.suggest_detail(&changes, &selection).await;
            let _ = events.send(GenerationEvent::Detail(result));
        })
    }
}
