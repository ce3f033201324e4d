//! Play modes: solo and versus

/// How a board is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// Solo play, speeds up with level
    #[default]
    Single,
    /// Paired with a remote opponent, fixed pace for the whole match
    Versus,
}

impl PlayMode {
    pub fn name(&self) -> &'static str {
        match self {
            PlayMode::Single => "Solo",
            PlayMode::Versus => "Versus",
        }
    }

    /// Whether a level-up restarts the scheduler with a faster interval.
    /// Versus holds the session's interval so both sides keep a comparable pace.
    pub fn speeds_up(&self) -> bool {
        matches!(self, PlayMode::Single)
    }

    /// Whether a manual practice floor raise is allowed
    pub fn allows_manual_raise(&self) -> bool {
        matches!(self, PlayMode::Single)
    }
}
