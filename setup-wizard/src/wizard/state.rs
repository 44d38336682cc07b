// Wizard state machine
//
// Pure transition table: `transition(state, event)` returns the next state plus the UI effects a
// front end must render. No I/O happens here; the controller feeds in events as requests start and
// finish.

use super::form::{FormId, FormValues};
use super::WizardError;
use std::fmt;

// =========================
// Steps
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    FolderSetup,
    SourceConfig,
    TargetConfig,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::FolderSetup,
        WizardStep::SourceConfig,
        WizardStep::TargetConfig,
    ];

    pub fn number(&self) -> usize {
        match self {
            WizardStep::FolderSetup => 1,
            WizardStep::SourceConfig => 2,
            WizardStep::TargetConfig => 3,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::FolderSetup => "Folder Setup",
            WizardStep::SourceConfig => "Source Systems",
            WizardStep::TargetConfig => "Target System",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
}

// =========================
// States and events
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    FolderUnset,
    FolderSet,
    SourceUntested,
    /// `next_revealed` stays true once any source test has succeeded.
    SourceTested {
        status: FormStatus,
        next_revealed: bool,
    },
    SourceSaved,
    TargetStepActive,
}

impl WizardState {
    /// The step currently shown. Exactly one step is active in every state.
    pub fn active_step(&self) -> WizardStep {
        match self {
            WizardState::FolderUnset | WizardState::FolderSet => WizardStep::FolderSetup,
            WizardState::SourceUntested
            | WizardState::SourceTested { .. }
            | WizardState::SourceSaved => WizardStep::SourceConfig,
            WizardState::TargetStepActive => WizardStep::TargetConfig,
        }
    }

    pub fn step_status(&self, step: WizardStep) -> StepStatus {
        let active = self.active_step().number();
        match step.number() {
            n if n < active => StepStatus::Completed,
            n if n == active => StepStatus::Active,
            _ => StepStatus::Pending,
        }
    }

    /// Whether the step 2 -> 3 trigger is visible.
    pub fn source_next_revealed(&self) -> bool {
        match self {
            WizardState::SourceTested { next_revealed, .. } => *next_revealed,
            WizardState::SourceSaved | WizardState::TargetStepActive => true,
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            WizardState::FolderUnset => "FOLDER_UNSET",
            WizardState::FolderSet => "FOLDER_SET",
            WizardState::SourceUntested => "SOURCE_UNTESTED",
            WizardState::SourceTested {
                status: FormStatus::Success,
                ..
            } => "SOURCE_TESTED(success)",
            WizardState::SourceTested {
                status: FormStatus::Error,
                ..
            } => "SOURCE_TESTED(error)",
            WizardState::SourceSaved => "SOURCE_SAVED",
            WizardState::TargetStepActive => "TARGET_STEP_ACTIVE",
        }
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a connection test as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Connected,
    Rejected(String),
    /// Transport or HTTP failure; never shown to the user.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    FolderPathBlurred { has_path: bool },
    FolderSubmitted,
    FolderSaved,
    FolderSaveFailed,
    ConnectionTestStarted { form: FormId },
    ConnectionTestFinished { form: FormId, outcome: ConnectionOutcome },
    SourceSaveSucceeded { form: FormId },
    SourceSaveFailed { form: FormId },
    AdvanceToTarget,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::FolderPathBlurred { .. } => "folder_path_blurred",
            WizardEvent::FolderSubmitted => "folder_submitted",
            WizardEvent::FolderSaved => "folder_saved",
            WizardEvent::FolderSaveFailed => "folder_save_failed",
            WizardEvent::ConnectionTestStarted { .. } => "connection_test_started",
            WizardEvent::ConnectionTestFinished { .. } => "connection_test_finished",
            WizardEvent::SourceSaveSucceeded { .. } => "source_save_succeeded",
            WizardEvent::SourceSaveFailed { .. } => "source_save_failed",
            WizardEvent::AdvanceToTarget => "advance_to_target",
        }
    }
}

// =========================
// Effects
// =========================

/// Clickable controls whose visibility / loading state the wizard drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    FolderNext,
    SourceNext,
    TestConnection(FormId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetLoading { control: Control, loading: bool },
    RevealTrigger(Control),
    ClearFormStatus(FormId),
    SetFormStatus { form: FormId, status: FormStatus },
    ShowErrorMessage { form: FormId, message: String },
    AppendSuccessNote { form: FormId, note: String },
    CompleteStep(WizardStep),
    ActivateStep(WizardStep),
    SlideTransition { from: WizardStep, to: WizardStep },
    PrefillForm { form: FormId, values: FormValues },
}

pub const SAVED_NOTE: &str = " System configuration saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: WizardState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: &WizardState, effects: Vec<Effect>) -> Self {
        Self {
            state: state.clone(),
            effects,
        }
    }

    fn to(state: WizardState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

fn advance_effects(from: WizardStep, to: WizardStep) -> Vec<Effect> {
    vec![
        Effect::CompleteStep(from),
        Effect::ActivateStep(to),
        Effect::SlideTransition { from, to },
    ]
}

fn is_source_step(state: &WizardState) -> bool {
    state.active_step() == WizardStep::SourceConfig
}

pub fn transition(state: &WizardState, event: &WizardEvent) -> Result<Transition, WizardError> {
    use WizardEvent as E;
    use WizardState as S;

    let invalid = || WizardError::InvalidTransition {
        state: state.to_string(),
        event: event.name(),
    };

    let t = match (state, event) {
        // Step 1: the Next trigger appears once the path field loses focus with a value.
        (S::FolderUnset | S::FolderSet, E::FolderPathBlurred { has_path: true }) => Transition::to(
            S::FolderSet,
            vec![Effect::RevealTrigger(Control::FolderNext)],
        ),
        (_, E::FolderPathBlurred { .. }) => Transition::stay(state, vec![]),

        (S::FolderSet, E::FolderSubmitted) => Transition::stay(
            state,
            vec![Effect::SetLoading {
                control: Control::FolderNext,
                loading: true,
            }],
        ),
        (S::FolderSet, E::FolderSaved) => {
            let mut effects = vec![Effect::SetLoading {
                control: Control::FolderNext,
                loading: false,
            }];
            effects.extend(advance_effects(
                WizardStep::FolderSetup,
                WizardStep::SourceConfig,
            ));
            Transition::to(S::SourceUntested, effects)
        }
        (S::FolderSet, E::FolderSaveFailed) => Transition::stay(
            state,
            vec![Effect::SetLoading {
                control: Control::FolderNext,
                loading: false,
            }],
        ),

        // Connection tests: source forms on step 2, the target form on step 3.
        (_, E::ConnectionTestStarted { form }) if form_accepts_tests(state, *form) => {
            Transition::stay(
                state,
                vec![
                    Effect::SetLoading {
                        control: Control::TestConnection(*form),
                        loading: true,
                    },
                    Effect::ClearFormStatus(*form),
                ],
            )
        }
        // A source test started on step 2 may finish after the user moved on to step 3.
        (_, E::ConnectionTestFinished { form, outcome })
            if form_accepts_tests(state, *form)
                || (matches!(form, FormId::Source(_)) && *state == S::TargetStepActive) =>
        {
            finish_connection_test(state, *form, outcome)
        }

        // Source saves may land after the user has re-tested or moved on; only the note is
        // guaranteed. A save only starts after a successful test, so the Next trigger is
        // revealed even when the current status is an error.
        (_, E::SourceSaveSucceeded { form }) if is_source_step(state) || *state == S::TargetStepActive => {
            let next = match state {
                S::SourceTested {
                    status: FormStatus::Success,
                    ..
                } => S::SourceSaved,
                S::SourceTested {
                    status: FormStatus::Error,
                    ..
                } => S::SourceTested {
                    status: FormStatus::Error,
                    next_revealed: true,
                },
                other => other.clone(),
            };
            Transition::to(
                next,
                vec![Effect::AppendSuccessNote {
                    form: *form,
                    note: SAVED_NOTE.to_string(),
                }],
            )
        }
        (_, E::SourceSaveFailed { .. }) => Transition::stay(state, vec![]),

        // Step 2 -> 3. Re-triggering from step 3 replays the same effects.
        (S::SourceTested {
            next_revealed: true,
            ..
        }
        | S::SourceSaved
        | S::TargetStepActive, E::AdvanceToTarget) => Transition::to(
            S::TargetStepActive,
            advance_effects(WizardStep::SourceConfig, WizardStep::TargetConfig),
        ),

        _ => return Err(invalid()),
    };

    Ok(t)
}

fn form_accepts_tests(state: &WizardState, form: FormId) -> bool {
    match form {
        FormId::Source(_) => is_source_step(state),
        FormId::Target => *state == WizardState::TargetStepActive,
        FormId::Folder => false,
    }
}

fn finish_connection_test(
    state: &WizardState,
    form: FormId,
    outcome: &ConnectionOutcome,
) -> Transition {
    let stop_loading = Effect::SetLoading {
        control: Control::TestConnection(form),
        loading: false,
    };
    let is_source = matches!(form, FormId::Source(_));
    let past_source_step = *state == WizardState::TargetStepActive;

    match outcome {
        ConnectionOutcome::Unreachable => Transition::stay(state, vec![stop_loading]),
        ConnectionOutcome::Connected => {
            let mut effects = vec![
                Effect::SetFormStatus {
                    form,
                    status: FormStatus::Success,
                },
                stop_loading,
            ];
            if is_source && !past_source_step {
                effects.push(Effect::RevealTrigger(Control::SourceNext));
                Transition::to(
                    WizardState::SourceTested {
                        status: FormStatus::Success,
                        next_revealed: true,
                    },
                    effects,
                )
            } else {
                Transition::stay(state, effects)
            }
        }
        ConnectionOutcome::Rejected(message) => {
            let effects = vec![
                stop_loading,
                Effect::SetFormStatus {
                    form,
                    status: FormStatus::Error,
                },
                Effect::ShowErrorMessage {
                    form,
                    message: message.clone(),
                },
            ];
            if is_source && !past_source_step {
                Transition::to(
                    WizardState::SourceTested {
                        status: FormStatus::Error,
                        next_revealed: state.source_next_revealed(),
                    },
                    effects,
                )
            } else {
                Transition::stay(state, effects)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(state: &WizardState, event: WizardEvent) -> Transition {
        transition(state, &event).expect("transition should be valid")
    }

    fn source_untested() -> WizardState {
        let s = apply(
            &WizardState::FolderUnset,
            WizardEvent::FolderPathBlurred { has_path: true },
        )
        .state;
        apply(&s, WizardEvent::FolderSaved).state
    }

    // -------------------------------------------------------------------------
    // Step 1
    // -------------------------------------------------------------------------

    #[test]
    fn blur_without_path_keeps_trigger_hidden() {
        let t = apply(
            &WizardState::FolderUnset,
            WizardEvent::FolderPathBlurred { has_path: false },
        );
        assert_eq!(t.state, WizardState::FolderUnset);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn blur_with_path_reveals_folder_next() {
        let t = apply(
            &WizardState::FolderUnset,
            WizardEvent::FolderPathBlurred { has_path: true },
        );
        assert_eq!(t.state, WizardState::FolderSet);
        assert_eq!(t.effects, vec![Effect::RevealTrigger(Control::FolderNext)]);
    }

    #[test]
    fn submit_requires_revealed_trigger() {
        let err = transition(&WizardState::FolderUnset, &WizardEvent::FolderSubmitted)
            .expect_err("cannot submit before the path is set");
        assert!(err.to_string().contains("FOLDER_UNSET"), "{}", err);
    }

    #[test]
    fn folder_saved_advances_to_source_step() {
        let t = apply(&WizardState::FolderSet, WizardEvent::FolderSaved);
        assert_eq!(t.state, WizardState::SourceUntested);
        assert!(t.effects.contains(&Effect::CompleteStep(WizardStep::FolderSetup)));
        assert!(t.effects.contains(&Effect::ActivateStep(WizardStep::SourceConfig)));
        assert!(t.effects.contains(&Effect::SlideTransition {
            from: WizardStep::FolderSetup,
            to: WizardStep::SourceConfig
        }));
    }

    #[test]
    fn folder_save_failure_only_clears_loading() {
        let t = apply(&WizardState::FolderSet, WizardEvent::FolderSaveFailed);
        assert_eq!(t.state, WizardState::FolderSet);
        assert_eq!(
            t.effects,
            vec![Effect::SetLoading {
                control: Control::FolderNext,
                loading: false
            }]
        );
    }

    // -------------------------------------------------------------------------
    // Step 2
    // -------------------------------------------------------------------------

    #[test]
    fn source_success_reveals_next_trigger() {
        let form = FormId::Source(0);
        let t = apply(
            &source_untested(),
            WizardEvent::ConnectionTestFinished {
                form,
                outcome: ConnectionOutcome::Connected,
            },
        );
        assert!(t.state.source_next_revealed());
        assert!(t.effects.contains(&Effect::RevealTrigger(Control::SourceNext)));
        assert!(t.effects.contains(&Effect::SetFormStatus {
            form,
            status: FormStatus::Success
        }));
    }

    #[test]
    fn source_rejection_shows_error_and_keeps_trigger_hidden() {
        let form = FormId::Source(0);
        let t = apply(
            &source_untested(),
            WizardEvent::ConnectionTestFinished {
                form,
                outcome: ConnectionOutcome::Rejected("auth failed".to_string()),
            },
        );
        assert!(!t.state.source_next_revealed());
        assert!(t.effects.contains(&Effect::ShowErrorMessage {
            form,
            message: "auth failed".to_string()
        }));
        assert!(!t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::RevealTrigger(_))));
    }

    #[test]
    fn unreachable_server_applies_no_status() {
        let form = FormId::Source(0);
        let start = source_untested();
        let t = apply(
            &start,
            WizardEvent::ConnectionTestFinished {
                form,
                outcome: ConnectionOutcome::Unreachable,
            },
        );
        assert_eq!(t.state, start);
        assert_eq!(
            t.effects,
            vec![Effect::SetLoading {
                control: Control::TestConnection(form),
                loading: false
            }]
        );
    }

    #[test]
    fn failure_after_success_keeps_next_trigger_visible() {
        let form = FormId::Source(0);
        let saved = apply(
            &apply(
                &source_untested(),
                WizardEvent::ConnectionTestFinished {
                    form,
                    outcome: ConnectionOutcome::Connected,
                },
            )
            .state,
            WizardEvent::SourceSaveSucceeded { form },
        )
        .state;
        assert_eq!(saved, WizardState::SourceSaved);

        let t = apply(
            &saved,
            WizardEvent::ConnectionTestFinished {
                form: FormId::Source(1),
                outcome: ConnectionOutcome::Rejected("bad host".to_string()),
            },
        );
        assert!(t.state.source_next_revealed());
        assert!(transition(&t.state, &WizardEvent::AdvanceToTarget).is_ok());
    }

    #[test]
    fn save_success_appends_note() {
        let form = FormId::Source(0);
        let tested = WizardState::SourceTested {
            status: FormStatus::Success,
            next_revealed: true,
        };
        let t = apply(&tested, WizardEvent::SourceSaveSucceeded { form });
        assert_eq!(t.state, WizardState::SourceSaved);
        assert_eq!(
            t.effects,
            vec![Effect::AppendSuccessNote {
                form,
                note: SAVED_NOTE.to_string()
            }]
        );
    }

    #[test]
    fn save_landing_after_later_rejection_reveals_next() {
        // Source(0) connected and its save is pending when Source(1) gets rejected.
        let rejected_later = WizardState::SourceTested {
            status: FormStatus::Error,
            next_revealed: true,
        };
        let t = apply(
            &rejected_later,
            WizardEvent::SourceSaveSucceeded {
                form: FormId::Source(0),
            },
        );
        assert_eq!(
            t.state,
            WizardState::SourceTested {
                status: FormStatus::Error,
                next_revealed: true,
            },
            "error status is kept, Next stays revealed"
        );
        assert!(transition(&t.state, &WizardEvent::AdvanceToTarget).is_ok());
    }

    #[test]
    fn save_failure_is_silent() {
        let tested = WizardState::SourceTested {
            status: FormStatus::Success,
            next_revealed: true,
        };
        let t = apply(
            &tested,
            WizardEvent::SourceSaveFailed {
                form: FormId::Source(0),
            },
        );
        assert_eq!(t.state, tested);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn target_tests_are_rejected_before_step_three() {
        assert!(transition(
            &source_untested(),
            &WizardEvent::ConnectionTestStarted {
                form: FormId::Target
            }
        )
        .is_err());
    }

    // -------------------------------------------------------------------------
    // Step 2 -> 3
    // -------------------------------------------------------------------------

    #[test]
    fn advance_requires_revealed_trigger() {
        assert!(transition(&source_untested(), &WizardEvent::AdvanceToTarget).is_err());
    }

    #[test]
    fn advance_is_replayable() {
        let first = apply(&WizardState::SourceSaved, WizardEvent::AdvanceToTarget);
        assert_eq!(first.state, WizardState::TargetStepActive);

        let replay = apply(&first.state, WizardEvent::AdvanceToTarget);
        assert_eq!(replay.state, WizardState::TargetStepActive);
        assert_eq!(replay.effects, first.effects, "re-trigger replays the transition");
    }

    #[test]
    fn target_success_does_not_change_state() {
        let t = apply(
            &WizardState::TargetStepActive,
            WizardEvent::ConnectionTestFinished {
                form: FormId::Target,
                outcome: ConnectionOutcome::Connected,
            },
        );
        assert_eq!(t.state, WizardState::TargetStepActive);
        assert!(!t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::RevealTrigger(_))));
    }

    #[test]
    fn late_source_result_on_step_three_keeps_target_step() {
        let form = FormId::Source(1);
        let t = apply(
            &WizardState::TargetStepActive,
            WizardEvent::ConnectionTestFinished {
                form,
                outcome: ConnectionOutcome::Connected,
            },
        );
        assert_eq!(t.state, WizardState::TargetStepActive);
        assert!(t.effects.contains(&Effect::SetLoading {
            control: Control::TestConnection(form),
            loading: false
        }));
        assert!(t.effects.contains(&Effect::SetFormStatus {
            form,
            status: FormStatus::Success
        }));

        let rejected = apply(
            &WizardState::TargetStepActive,
            WizardEvent::ConnectionTestFinished {
                form,
                outcome: ConnectionOutcome::Rejected("auth failed".to_string()),
            },
        );
        assert_eq!(rejected.state, WizardState::TargetStepActive);

        assert!(
            transition(
                &WizardState::TargetStepActive,
                &WizardEvent::ConnectionTestStarted { form }
            )
            .is_err(),
            "new source tests still belong to step 2"
        );
    }

    #[test]
    fn exactly_one_step_is_active_in_every_state() {
        let states = [
            WizardState::FolderUnset,
            WizardState::FolderSet,
            WizardState::SourceUntested,
            WizardState::SourceTested {
                status: FormStatus::Error,
                next_revealed: false,
            },
            WizardState::SourceSaved,
            WizardState::TargetStepActive,
        ];
        for state in states {
            let active = WizardStep::ALL
                .iter()
                .filter(|s| state.step_status(**s) == StepStatus::Active)
                .count();
            assert_eq!(active, 1, "state {} should have one active step", state);
        }
        assert_eq!(
            WizardState::TargetStepActive.step_status(WizardStep::FolderSetup),
            StepStatus::Completed
        );
        assert_eq!(
            WizardState::FolderSet.step_status(WizardStep::TargetConfig),
            StepStatus::Pending
        );
    }
}
