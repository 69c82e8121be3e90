//! Ambient context supplied by the location collaborators.
//!
//! The orchestrator reads the latest [`AmbientContext`] at session start.
//! Any change since the previous session means the earlier turns no longer
//! apply, so the conversation window is reset.

use crate::config::AmbientConfig;

/// Where the user is and what is around them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    pub location: Option<String>,
    pub points_of_interest: Vec<String>,
}

impl AmbientContext {
    pub fn new(location: Option<String>, points_of_interest: Vec<String>) -> Self {
        Self {
            location: location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            points_of_interest: points_of_interest
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.points_of_interest.is_empty()
    }
}

impl From<&AmbientConfig> for AmbientContext {
    fn from(config: &AmbientConfig) -> Self {
        Self::new(config.location.clone(), config.points_of_interest.clone())
    }
}
