// Request tokens
//
// Each backend call is tagged with a token. At most one request per kind is in flight; a response
// whose token is no longer current (cancelled or superseded) is dropped without touching the UI.

use super::form::FormId;
use super::WizardError;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    FsSetup,
    TestConnection(FormId),
    SaveSource,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::FsSetup => f.write_str("fs_setup"),
            RequestKind::TestConnection(form) => write!(f, "test_connection({})", form),
            RequestKind::SaveSource => f.write_str("save_source_systems"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    kind: RequestKind,
    id: Uuid,
}

impl RequestToken {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Correlation id for logs.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    in_flight: HashMap<RequestKind, Uuid>,
}

impl RequestTracker {
    /// Start a request; rejected while another request of the same kind is pending.
    pub fn begin(&mut self, kind: RequestKind) -> Result<RequestToken, WizardError> {
        if self.in_flight.contains_key(&kind) {
            return Err(WizardError::RequestInFlight(kind));
        }
        Ok(self.issue(kind))
    }

    /// Start a request, invalidating any pending one of the same kind.
    pub fn supersede(&mut self, kind: RequestKind) -> (RequestToken, Option<RequestToken>) {
        let previous = self.cancel(kind);
        (self.issue(kind), previous)
    }

    /// Close out `token`. Returns false when the token was cancelled or superseded.
    pub fn finish(&mut self, token: &RequestToken) -> bool {
        match self.in_flight.get(&token.kind) {
            Some(id) if *id == token.id => {
                self.in_flight.remove(&token.kind);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, kind: RequestKind) -> Option<RequestToken> {
        self.in_flight
            .remove(&kind)
            .map(|id| RequestToken { kind, id })
    }

    pub fn is_in_flight(&self, kind: RequestKind) -> bool {
        self.in_flight.contains_key(&kind)
    }

    fn issue(&mut self, kind: RequestKind) -> RequestToken {
        let id = Uuid::new_v4();
        self.in_flight.insert(kind, id);
        RequestToken { kind, id }
    }
}
