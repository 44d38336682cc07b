pub mod controller;
pub mod form;
pub mod formatter;
pub mod requests;
pub mod state;

use form::FormId;
use requests::RequestKind;

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("invalid transition: '{event}' is not allowed in state {state}")]
    InvalidTransition { state: String, event: &'static str },

    #[error("a {0} request is already in flight")]
    RequestInFlight(RequestKind),

    #[error("folder path is required")]
    EmptyFolderPath,

    #[error("form '{0}' does not describe a database system")]
    NotASystemForm(FormId),
}
