use crate::error::{DeployError, DeployResult};

/// Phases of a single container replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Idle,
    StoppingOld,
    Pulling,
    Starting,
    Verifying,
    Running,
    Failed,
}

impl DeployPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }

    /// The previous instance is gone from this phase on.
    pub fn old_instance_removed(self) -> bool {
        !matches!(self, Self::Idle | Self::StoppingOld)
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::StoppingOld),
            Self::StoppingOld => Some(Self::Pulling),
            Self::Pulling => Some(Self::Starting),
            Self::Starting => Some(Self::Verifying),
            Self::Verifying => Some(Self::Running),
            Self::Running | Self::Failed => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployProgress {
    phase: DeployPhase,
    history: Vec<DeployPhase>,
}

impl Default for DeployProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployProgress {
    pub fn new() -> Self {
        Self {
            phase: DeployPhase::Idle,
            history: vec![DeployPhase::Idle],
        }
    }

    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    pub fn history(&self) -> &[DeployPhase] {
        &self.history
    }

    /// Move forward one phase; skipping or going back is rejected.
    pub fn advance(&mut self, to: DeployPhase) -> DeployResult<()> {
        if self.phase.next() != Some(to) {
            return Err(DeployError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.set(to);
        Ok(())
    }

    /// Any non-terminal phase may fail. There is no way back from `Failed`.
    pub fn fail(&mut self) -> DeployResult<()> {
        if self.phase.is_terminal() {
            return Err(DeployError::InvalidTransition {
                from: self.phase,
                to: DeployPhase::Failed,
            });
        }
        self.set(DeployPhase::Failed);
        Ok(())
    }

    fn set(&mut self, phase: DeployPhase) {
        tracing::debug!("deploy phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.history.push(phase);
    }
}
