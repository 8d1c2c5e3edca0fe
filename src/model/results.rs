//! Read-side projection of a concluded season's tally and winners into a
//! display-ready summary. Pure transform, no mutation.

use serde::{Deserialize, Serialize};

use crate::model::candidacy::CandidacyId;
use crate::model::catalog::OfficeId;
use crate::model::season::Season;
use crate::model::winners::WinningCandidate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonResults {
    pub season: Season,
    pub offices: Vec<OfficeResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeResults {
    pub office: OfficeId,
    pub office_label: String,
    pub seats_to_fill: u16,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
    pub winners: Vec<WinningCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidacy: CandidacyId,
    pub ballot_number: u16,
    pub candidate_name: String,
    pub party: Option<String>,
    pub is_disqualified: bool,
    pub votes: u64,
    /// Fraction of the office's total votes, 0 when no votes were cast
    /// for the office at all.
    pub share: f64,
}

/// Share of `votes` in `total`, guarding the all-undervote case.
pub fn vote_share(votes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        votes as f64 / total as f64
    }
}
