//! Launch lifecycle.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// State of one launch.
///
/// `Idle -> ResolvingDependencies -> Loading -> Starting -> Running`, with
/// `Failed` reachable from every state. A launch replaced by a newer one in
/// the same container before it mounted ends in `Superseded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchState {
    Idle,
    ResolvingDependencies,
    Loading,
    Starting,
    Running,
    Superseded,
    Failed,
}

impl LaunchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Running | Self::Superseded | Self::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(&self, next: LaunchState) -> bool {
        use LaunchState::*;
        match (self, next) {
            (Running | Superseded | Failed, _) => false,
            (_, Failed) => true,
            (Idle, ResolvingDependencies)
            | (ResolvingDependencies, Loading)
            | (Loading, Starting)
            | (Starting, Running) => true,
            (Loading | Starting, Superseded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ResolvingDependencies => "resolving-dependencies",
            Self::Loading => "loading",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a launch as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchStatus {
    pub id: Uuid,
    pub container: String,
    pub address: String,
    pub state: LaunchState,
}
