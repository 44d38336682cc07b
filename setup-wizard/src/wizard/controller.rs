// Wizard controller
//
// Owns the session and the backend handle. Every user action is split into `begin_*` (validate,
// issue a request token, return the request to send) and `complete` (apply the reply). Front ends
// that run requests on their own executor use the two halves; everything else can call the async
// conveniences, which send and complete in one go.

use super::form::{FormId, FormValues};
use super::formatter::format_source_system;
use super::requests::{RequestKind, RequestToken};
use super::state::{transition, ConnectionOutcome, Control, Effect, WizardEvent};
use super::WizardError;
use crate::api::client::{ApiError, SetupBackend};
use crate::models::requests::InitialRequest;
use crate::models::responses::InitialResponse;
use crate::models::state::SetupSession;
use crate::models::system::{FormattedSourceSystem, SystemRecord, SystemType};
use crate::utils::validation::trimmed_folder_path;

use log::{debug, info, warn};
use std::sync::Arc;

/// A request that has been issued a token and is ready to send.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub token: RequestToken,
    pub form: FormId,
    pub request: InitialRequest,
}

/// Effects to render now, plus at most one request to send next.
#[derive(Debug, Default)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub follow_up: Option<PendingRequest>,
}

impl Outcome {
    fn effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            follow_up: None,
        }
    }
}

pub struct WizardController {
    backend: Arc<dyn SetupBackend>,
    session: SetupSession,
}

impl WizardController {
    pub fn new(backend: Arc<dyn SetupBackend>, session: SetupSession) -> Self {
        Self { backend, session }
    }

    pub fn session(&self) -> &SetupSession {
        &self.session
    }

    pub fn backend(&self) -> Arc<dyn SetupBackend> {
        Arc::clone(&self.backend)
    }

    fn apply(&mut self, event: WizardEvent) -> Result<Vec<Effect>, WizardError> {
        let t = transition(&self.session.state, &event)?;
        if t.state != self.session.state {
            debug!(
                "[PHASE: wizard] [STEP: transition] {} -> {}",
                self.session.state, t.state
            );
        }
        self.session.state = t.state;
        Ok(t.effects)
    }

    /// Pre-fill effects from the developer seed. Nothing is submitted.
    pub fn startup_effects(&self) -> Vec<Effect> {
        let Some(seed) = self.session.seed.as_ref() else {
            return vec![];
        };
        info!("[PHASE: wizard] [STEP: dev_seed] Pre-filling forms from developer seed");

        let mut effects = Vec::new();
        if let Some(path) = seed.folder_path.as_ref() {
            let values: FormValues = [("path", path.as_str())].into_iter().collect();
            effects.push(Effect::PrefillForm {
                form: FormId::Folder,
                values,
            });
        }
        if !seed.source.is_empty() {
            effects.push(Effect::PrefillForm {
                form: FormId::Source(0),
                values: seed.source.clone(),
            });
        }
        effects
    }

    // =========================
    // Step 1: folder setup
    // =========================

    /// The folder path field lost focus.
    pub fn folder_path_blurred(&mut self, raw: &str) -> Result<Vec<Effect>, WizardError> {
        self.apply(WizardEvent::FolderPathBlurred {
            has_path: trimmed_folder_path(raw).is_some(),
        })
    }

    pub fn begin_folder_setup(&mut self, raw: &str) -> Result<Outcome, WizardError> {
        let path = trimmed_folder_path(raw).ok_or(WizardError::EmptyFolderPath)?;

        let kind = RequestKind::FsSetup;
        let token = self.session.requests.begin(kind)?;
        let effects = match self.apply(WizardEvent::FolderSubmitted) {
            Ok(effects) => effects,
            Err(e) => {
                self.session.requests.cancel(kind);
                return Err(e);
            }
        };

        info!(
            "[PHASE: wizard] [STEP: fs_setup] Submitting folder path (correlation_id={})",
            token.id()
        );
        Ok(Outcome {
            effects,
            follow_up: Some(PendingRequest {
                token,
                form: FormId::Folder,
                request: InitialRequest::FsSetup {
                    path: path.to_string(),
                },
            }),
        })
    }

    // =========================
    // Connection tests
    // =========================

    pub fn begin_connection_test(
        &mut self,
        form: FormId,
        values: &FormValues,
    ) -> Result<Outcome, WizardError> {
        let system_type = form.system_type().ok_or(WizardError::NotASystemForm(form))?;
        let system_info = SystemRecord::from_form(values);

        let kind = RequestKind::TestConnection(form);
        let token = self.session.requests.begin(kind)?;
        let effects = match self.apply(WizardEvent::ConnectionTestStarted { form }) {
            Ok(effects) => effects,
            Err(e) => {
                self.session.requests.cancel(kind);
                return Err(e);
            }
        };

        info!(
            "[PHASE: wizard] [STEP: test_connection] Testing {} system ({}, correlation_id={})",
            system_type.as_str(),
            system_info.redacted_summary(),
            token.id()
        );
        Ok(Outcome {
            effects,
            follow_up: Some(PendingRequest {
                token,
                form,
                request: InitialRequest::TestConnection {
                    system_info,
                    system_type,
                },
            }),
        })
    }

    // =========================
    // Source persistence
    // =========================

    /// Merge `formatted` into the registry and build a save of the whole registry. A save still in
    /// flight is superseded, since the new payload already contains everything it carried. Every
    /// form waiting on the superseded save gets its note when the newest save succeeds.
    pub fn begin_save_source(
        &mut self,
        formatted: FormattedSourceSystem,
        form: FormId,
    ) -> Outcome {
        let name = formatted.name.clone();
        if self.session.source_systems.insert(formatted).is_some() {
            info!(
                "[PHASE: wizard] [STEP: save_source_systems] Overwriting source system '{}'",
                name
            );
        }

        if !self.session.pending_save_forms.contains(&form) {
            self.session.pending_save_forms.push(form);
        }
        let (token, superseded) = self.session.requests.supersede(RequestKind::SaveSource);
        if let Some(old) = superseded {
            info!(
                "[PHASE: wizard] [STEP: save_source_systems] Superseding pending save (correlation_id={})",
                old.id()
            );
        }

        info!(
            "[PHASE: wizard] [STEP: save_source_systems] Saving {} source system(s) (correlation_id={})",
            self.session.source_systems.len(),
            token.id()
        );
        Outcome {
            effects: vec![],
            follow_up: Some(PendingRequest {
                token,
                form,
                request: InitialRequest::SaveSourceSystems {
                    source_systems: self.session.source_systems.clone(),
                },
            }),
        }
    }

    // =========================
    // Step 2 -> 3
    // =========================

    pub fn advance_to_target(&mut self) -> Result<Vec<Effect>, WizardError> {
        let mut effects = self.apply(WizardEvent::AdvanceToTarget)?;
        if let Some(seed) = self.session.seed.as_ref() {
            if !seed.target.is_empty() {
                effects.push(Effect::PrefillForm {
                    form: FormId::Target,
                    values: seed.target.clone(),
                });
            }
        }
        Ok(effects)
    }

    // =========================
    // Completion / cancellation
    // =========================

    /// Drop a pending request; its reply will be ignored when it arrives.
    pub fn cancel(&mut self, kind: RequestKind) -> Vec<Effect> {
        let Some(token) = self.session.requests.cancel(kind) else {
            return vec![];
        };
        info!(
            "[PHASE: wizard] [STEP: cancel] Cancelled {} (correlation_id={})",
            kind,
            token.id()
        );
        match kind {
            RequestKind::FsSetup => vec![Effect::SetLoading {
                control: Control::FolderNext,
                loading: false,
            }],
            RequestKind::TestConnection(form) => vec![Effect::SetLoading {
                control: Control::TestConnection(form),
                loading: false,
            }],
            RequestKind::SaveSource => {
                self.session.pending_save_forms.clear();
                vec![]
            }
        }
    }

    /// Apply the backend's reply to a request previously returned by a `begin_*` call.
    pub fn complete(
        &mut self,
        pending: PendingRequest,
        reply: Result<InitialResponse, ApiError>,
    ) -> Result<Outcome, WizardError> {
        if !self.session.requests.finish(&pending.token) {
            info!(
                "[PHASE: wizard] [STEP: complete] Discarding stale {} response (correlation_id={})",
                pending.token.kind(),
                pending.token.id()
            );
            return Ok(Outcome::default());
        }

        let form = pending.form;
        match pending.request {
            InitialRequest::FsSetup { path } => match reply {
                Ok(_) => {
                    info!("[PHASE: wizard] [STEP: fs_setup] Folder configuration set");
                    self.session.folder_path = Some(path);
                    Ok(Outcome::effects(self.apply(WizardEvent::FolderSaved)?))
                }
                Err(e) => {
                    warn!("[PHASE: wizard] [STEP: fs_setup] Folder setup failed: {}", e);
                    Ok(Outcome::effects(self.apply(WizardEvent::FolderSaveFailed)?))
                }
            },

            InitialRequest::TestConnection {
                system_info,
                system_type,
            } => {
                let outcome = match reply {
                    Ok(InitialResponse::ConnectionTest(r)) if r.conn_status => {
                        ConnectionOutcome::Connected
                    }
                    Ok(InitialResponse::ConnectionTest(r)) => {
                        let message = r.error_msg.unwrap_or_default();
                        info!(
                            "[PHASE: wizard] [STEP: test_connection] Connection rejected: {}",
                            message
                        );
                        ConnectionOutcome::Rejected(message)
                    }
                    Ok(InitialResponse::Ack) => {
                        warn!("[PHASE: wizard] [STEP: test_connection] Reply carried no connection status");
                        ConnectionOutcome::Unreachable
                    }
                    Err(e) => {
                        warn!(
                            "[PHASE: wizard] [STEP: test_connection] Connection test request failed: {}",
                            e
                        );
                        ConnectionOutcome::Unreachable
                    }
                };
                let connected = outcome == ConnectionOutcome::Connected;
                let effects = self.apply(WizardEvent::ConnectionTestFinished { form, outcome })?;

                let mut result = Outcome::effects(effects);
                if connected {
                    match system_type {
                        SystemType::Source => {
                            let save = self.begin_save_source(format_source_system(&system_info), form);
                            result.effects.extend(save.effects);
                            result.follow_up = save.follow_up;
                        }
                        SystemType::Target => {
                            info!(
                                "[PHASE: wizard] [STEP: test_connection] Target system accepted ({})",
                                system_info.redacted_summary()
                            );
                            self.session.target_system = Some(system_info);
                        }
                    }
                }
                Ok(result)
            }

            InitialRequest::SaveSourceSystems { .. } => {
                let mut saved_forms = std::mem::take(&mut self.session.pending_save_forms);
                if saved_forms.is_empty() {
                    saved_forms.push(form);
                }
                match reply {
                    Ok(_) => {
                        info!(
                            "[PHASE: wizard] [STEP: save_source_systems] Source systems updated ({} form(s))",
                            saved_forms.len()
                        );
                        let mut effects = Vec::new();
                        for saved in saved_forms {
                            effects
                                .extend(self.apply(WizardEvent::SourceSaveSucceeded { form: saved })?);
                        }
                        Ok(Outcome::effects(effects))
                    }
                    Err(e) => {
                        warn!(
                            "[PHASE: wizard] [STEP: save_source_systems] Save failed: {}",
                            e
                        );
                        Ok(Outcome::effects(
                            self.apply(WizardEvent::SourceSaveFailed { form })?,
                        ))
                    }
                }
            }
        }
    }

    // =========================
    // Async conveniences
    // =========================

    /// Send `outcome`'s follow-up requests one after another until none remain.
    pub async fn run_to_completion(&mut self, outcome: Outcome) -> Vec<Effect> {
        let mut effects = outcome.effects;
        let mut next = outcome.follow_up;
        while let Some(pending) = next.take() {
            let reply = self.backend.send(&pending.request).await;
            match self.complete(pending, reply) {
                Ok(done) => {
                    effects.extend(done.effects);
                    next = done.follow_up;
                }
                Err(e) => {
                    warn!("[PHASE: wizard] [STEP: complete] Reply could not be applied: {}", e);
                }
            }
        }
        effects
    }

    pub async fn submit_folder(&mut self, raw: &str) -> Result<Vec<Effect>, WizardError> {
        let outcome = self.begin_folder_setup(raw)?;
        Ok(self.run_to_completion(outcome).await)
    }

    pub async fn test_connection(
        &mut self,
        form: FormId,
        values: &FormValues,
    ) -> Result<Vec<Effect>, WizardError> {
        let outcome = self.begin_connection_test(form, values)?;
        Ok(self.run_to_completion(outcome).await)
    }

    pub async fn save_source(
        &mut self,
        formatted: FormattedSourceSystem,
        form: FormId,
    ) -> Vec<Effect> {
        let outcome = self.begin_save_source(formatted, form);
        self.run_to_completion(outcome).await
    }
}
