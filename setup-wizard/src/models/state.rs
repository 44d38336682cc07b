// Wizard session state (in-memory)
//
// NOTE: This is NOT persisted; the server is the durable owner of the configuration. The session
// mirrors what has been accepted so far so each save can resend the full registry.

use crate::models::system::{SourceSystemsRegistry, SystemRecord};
use crate::wizard::form::{FormId, FormValues};
use crate::wizard::requests::RequestTracker;
use crate::wizard::state::WizardState;

/// Developer seed values used to pre-fill forms. Never submits anything on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevSeed {
    pub folder_path: Option<String>,
    pub source: FormValues,
    pub target: FormValues,
}

#[derive(Debug, Default)]
pub struct SetupSession {
    pub(crate) state: WizardState,
    pub(crate) folder_path: Option<String>,
    pub(crate) source_systems: SourceSystemsRegistry,
    pub(crate) target_system: Option<SystemRecord>,
    pub(crate) requests: RequestTracker,
    /// Forms whose connected test is covered by the save in flight.
    pub(crate) pending_save_forms: Vec<FormId>,
    pub(crate) seed: Option<DevSeed>,
}

impl SetupSession {
    pub fn new(seed: Option<DevSeed>) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Path accepted by the server on the folder step.
    pub fn folder_path(&self) -> Option<&str> {
        self.folder_path.as_deref()
    }

    pub fn source_systems(&self) -> &SourceSystemsRegistry {
        &self.source_systems
    }

    /// Last target profile that passed a connection test. Kept here only; nothing sends it.
    pub fn target_system(&self) -> Option<&SystemRecord> {
        self.target_system.as_ref()
    }

    pub fn seed(&self) -> Option<&DevSeed> {
        self.seed.as_ref()
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }
}
