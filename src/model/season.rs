use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type SeasonId = u32;

/// States in the election season lifecycle. Transitions are monotonic:
/// New -> Initiated -> Concluding -> Concluded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonState {
    /// Set up but not yet opened for voting.
    New,
    /// Open for voting.
    Initiated,
    /// Voting closed, tally pending or in progress.
    Concluding,
    /// Tallied, winners resolved.
    Concluded,
}

impl SeasonState {
    /// Does this state count towards the "at most one active season"
    /// invariant?
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initiated | Self::Concluding)
    }

    pub fn can_accept_ballots(self) -> bool {
        self == Self::Initiated
    }
}

/// One run of an election, with its own offered offices, candidacies and
/// ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    /// Label for the season, e.g. "2021-2022".
    pub academic_year: String,
    pub state: SeasonState,
    pub initiated_at: Option<DateTime<Utc>>,
    pub concluded_at: Option<DateTime<Utc>>,
}

impl Season {
    pub fn new(id: SeasonId, academic_year: String) -> Self {
        Self {
            id,
            academic_year,
            state: SeasonState::New,
            initiated_at: None,
            concluded_at: None,
        }
    }

    /// Open the season for voting. The cross-season "no other active
    /// season" check is the store's responsibility; this only guards the
    /// season's own lifecycle.
    pub fn initiate(&mut self) -> Result<()> {
        if self.state != SeasonState::New {
            return Err(Error::InvalidTransition(format!(
                "cannot initiate season {} from state {:?}",
                self.id, self.state
            )));
        }
        self.state = SeasonState::Initiated;
        self.initiated_at = Some(Utc::now());
        Ok(())
    }

    /// Close the voting window. The season stays in `Concluding` until the
    /// tally completes, so no further ballots are accepted while the tally
    /// job runs (or reruns after a crash).
    pub fn begin_conclusion(&mut self) -> Result<()> {
        if self.state != SeasonState::Initiated {
            return Err(Error::InvalidTransition(format!(
                "cannot conclude season {} from state {:?}",
                self.id, self.state
            )));
        }
        self.state = SeasonState::Concluding;
        self.concluded_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the tally as complete. Idempotent for an already-concluded
    /// season, since the tally job may legitimately run more than once.
    pub fn complete_conclusion(&mut self) -> Result<()> {
        match self.state {
            SeasonState::Concluding => {
                self.state = SeasonState::Concluded;
                Ok(())
            }
            SeasonState::Concluded => Ok(()),
            state => Err(Error::InvalidTransition(format!(
                "cannot complete conclusion of season {} from state {:?}",
                self.id, state
            ))),
        }
    }
}
