use serde::{Deserialize, Serialize};

use crate::model::catalog::{CandidateId, OfficeId};
use crate::model::season::SeasonId;

pub type CandidacyId = u32;

/// An office contested in a given season, with the number of seats to fill.
/// The seat count may differ from the office's nominal default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedOffice {
    pub season: SeasonId,
    pub office: OfficeId,
    pub seats_to_fill: u16,
}

/// A candidate registered to contest a specific office within a season.
/// Unique per (season, office, ballot_number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    pub id: CandidacyId,
    pub season: SeasonId,
    pub candidate: CandidateId,
    pub office: OfficeId,
    pub ballot_number: u16,
    pub is_disqualified: bool,
    pub disqualification_reason: Option<String>,
    /// Written exclusively by the tally engine; `None` until the season
    /// has been tallied.
    pub tallied_votes: Option<u64>,
}
