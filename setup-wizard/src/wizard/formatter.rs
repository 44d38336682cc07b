// Source system formatting
//
// Turns a source profile as entered on the form into the shape the server persists.

use crate::models::system::{FormattedSourceSystem, Logmech, SourceSystemEntry, SystemRecord};

/// `regular` means "no explicit mechanism" on the server side and is sent as an empty string.
pub fn format_source_system(record: &SystemRecord) -> FormattedSourceSystem {
    let logmech = match &record.logmech {
        Logmech::Regular => String::new(),
        other => other.as_str().to_string(),
    };

    FormattedSourceSystem {
        name: record.system_name.clone(),
        entry: SourceSystemEntry {
            siteid: record.site_id.clone(),
            active: "true".to_string(),
            host: record.host.clone(),
            username: record.username.clone(),
            password: record.password.clone(),
            logmech,
            environment: record.environment.clone(),
        },
    }
}
