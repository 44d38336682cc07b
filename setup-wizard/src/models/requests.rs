// `/initial` request models
//
// Every request is a JSON object discriminated by `post_name`.

use super::system::{SourceSystemsRegistry, SystemRecord, SystemType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "post_name")]
pub enum InitialRequest {
    /// Working folder chosen on the first step.
    #[serde(rename = "FS_SETUP")]
    FsSetup { path: String },

    /// Live connectivity probe for one system profile.
    #[serde(rename = "TEST_CONNECTION")]
    TestConnection {
        system_info: SystemRecord,
        system_type: SystemType,
    },

    /// The full accumulated registry, never a delta.
    #[serde(rename = "SAVE_SOURCE_SYSTEMS")]
    SaveSourceSystems {
        source_systems: SourceSystemsRegistry,
    },
}

impl InitialRequest {
    pub fn post_name(&self) -> &'static str {
        match self {
            InitialRequest::FsSetup { .. } => "FS_SETUP",
            InitialRequest::TestConnection { .. } => "TEST_CONNECTION",
            InitialRequest::SaveSourceSystems { .. } => "SAVE_SOURCE_SYSTEMS",
        }
    }
}
