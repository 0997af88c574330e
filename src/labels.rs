//! Release pull request lifecycle labels
//!
//! The labels on a release pull request encode where it is in its lifecycle.
//! [`ReleasePhase`] reads that state and [`ReleasePhase::transition`] yields the
//! label changes for each legal move.

use serde::{Deserialize, Serialize};

/// Label names used to track release pull requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseLabels {
    /// Merged or open, not yet tagged
    pub pending: String,
    /// Releases have been created
    pub tagged: String,
    /// Forces releases to be marked as prerelease
    pub prerelease: String,
    /// Closed on purpose; stays closed until new changes arrive
    pub snooze: String,
    /// Version in the title was edited by a human and should be trusted
    pub custom_version: String,
}

impl Default for ReleaseLabels {
    fn default() -> Self {
        Self {
            pending: "autorelease: pending".to_string(),
            tagged: "autorelease: tagged".to_string(),
            prerelease: "autorelease: pre-release".to_string(),
            snooze: "autorelease: snooze".to_string(),
            custom_version: "autorelease: custom version".to_string(),
        }
    }
}

impl ReleaseLabels {
    /// Whether the label set marks a human-edited version
    pub fn has_custom_version(&self, labels: &[String]) -> bool {
        labels.contains(&self.custom_version)
    }

    /// Whether the label set forces prereleases
    pub fn has_prerelease(&self, labels: &[String]) -> bool {
        labels.contains(&self.prerelease)
    }
}

/// Lifecycle phase of a release pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePhase {
    /// Awaiting merge, or merged and awaiting tagging
    Pending,
    /// Releases created
    Tagged,
    /// Closed and snoozed
    Snoozed,
    /// Carries none of the lifecycle labels
    Untracked,
}

/// Event that moves a release pull request between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEvent {
    /// A release was created from the merged pull request
    Released {
        /// Whether the pre-release label should be added
        prerelease: bool,
    },
    /// A snoozed pull request was reopened because new changes arrived
    Reopened,
}

/// Labels to add and remove for a transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelChange {
    /// Labels to add
    pub add: Vec<String>,
    /// Labels to remove
    pub remove: Vec<String>,
}

impl LabelChange {
    /// Whether the change does nothing
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

impl ReleasePhase {
    /// Read the phase from a pull request's labels
    pub fn from_labels(labels: &[String], names: &ReleaseLabels) -> Self {
        if labels.contains(&names.tagged) {
            Self::Tagged
        } else if labels.contains(&names.snooze) {
            Self::Snoozed
        } else if labels.contains(&names.pending) {
            Self::Pending
        } else {
            Self::Untracked
        }
    }

    /// Apply an event, returning the next phase and label changes.
    ///
    /// Returns `None` for transitions that are not legal from this phase.
    pub fn transition(
        self,
        event: ReleaseEvent,
        names: &ReleaseLabels,
    ) -> Option<(Self, LabelChange)> {
        match (self, event) {
            (Self::Pending, ReleaseEvent::Released { prerelease }) => {
                let mut add = vec![names.tagged.clone()];
                if prerelease {
                    add.push(names.prerelease.clone());
                }
                Some((
                    Self::Tagged,
                    LabelChange {
                        add,
                        remove: vec![names.pending.clone()],
                    },
                ))
            }
            (Self::Tagged, ReleaseEvent::Released { prerelease }) => {
                // Later components of the same pull request
                let add = if prerelease {
                    vec![names.prerelease.clone()]
                } else {
                    Vec::new()
                };
                Some((
                    Self::Tagged,
                    LabelChange {
                        add,
                        remove: Vec::new(),
                    },
                ))
            }
            (Self::Snoozed, ReleaseEvent::Reopened) => Some((
                Self::Pending,
                LabelChange {
                    add: vec![names.pending.clone()],
                    remove: vec![names.snooze.clone()],
                },
            )),
            _ => None,
        }
    }
}
