use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::candidacy::CandidacyId;
use crate::model::catalog::{OfficeId, ScopeId};
use crate::model::season::SeasonId;

pub type BallotId = u64;

/// A voter's single, final set of choices for a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: BallotId,
    pub season: SeasonId,
    /// Opaque voter identity supplied by the authentication collaborator.
    pub voter: String,
    /// The scope the voter declared for eligibility filtering.
    pub scope: ScopeId,
    pub cast_at: DateTime<Utc>,
    pub choices: Vec<CandidacyId>,
}

/// A ballot that a voter wishes to cast.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub scope: ScopeId,
    pub choices: Vec<CandidacyId>,
}

/// Acknowledgement of a cast ballot.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub ballot_id: BallotId,
    pub cast_at: DateTime<Utc>,
}

/// The structured ballot paper presented to a voter: for each offered
/// office visible to the voter's declared scope, the selectable candidacies
/// and the maximum number of choices.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaper {
    pub season: SeasonId,
    pub scope: ScopeId,
    pub offices: Vec<BallotPaperOffice>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaperOffice {
    pub office: OfficeId,
    pub office_label: String,
    pub max_choices: u16,
    pub candidacies: Vec<BallotPaperEntry>,
}

/// A selectable candidacy. Disqualified candidacies are never listed.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaperEntry {
    pub candidacy: CandidacyId,
    pub ballot_number: u16,
    pub candidate_name: String,
    pub party: Option<String>,
}
