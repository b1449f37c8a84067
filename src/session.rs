//! Session state shared between the profile store and its callers.

use std::sync::Mutex;

use crate::storage::Profile;

/// The most recently loaded profile.
///
/// Owned by whoever drives a session (the CLI, a test) and passed by
/// reference into store operations. It is a single slot: every successful
/// load overwrites it, regardless of the order in which loads were started.
#[derive(Debug, Default)]
pub struct SessionState {
    current: Mutex<Option<CurrentProfile>>,
}

/// Snapshot of the active profile.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentProfile {
    pub name: String,
    pub data: Profile,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active profile.
    pub fn set_current(&self, name: &str, data: Profile) {
        let mut slot = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(CurrentProfile {
            name: name.to_string(),
            data,
        });
    }

    /// The active profile, if one was loaded.
    pub fn current(&self) -> Option<CurrentProfile> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_set_wins() {
        let session = SessionState::new();
        assert!(session.current().is_none());

        session.set_current("dev", Profile::new("us-east-1", "b", "dev.ini"));
        session.set_current("prod", Profile::new("eu-west-1", "b", "prod.ini"));

        let current = session.current().unwrap();
        assert_eq!(current.name, "prod");
        assert_eq!(current.data.region.as_deref(), Some("eu-west-1"));
    }
}
