use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::{candidacy::CandidacyId, season::SeasonId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("No season found with ID {0}")]
    UnknownSeason(SeasonId),
    #[error("No candidacy found with ID {0}")]
    UnknownCandidacy(CandidacyId),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Season {0} is already active; only one season may run at a time")]
    ConflictingActiveSeason(SeasonId),
    #[error("A ballot has already been cast by this voter in season {0}")]
    AlreadyVoted(SeasonId),
    #[error("Season {0} is not accepting ballots")]
    SeasonNotOpen(SeasonId),
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Convenience constructor for referential-integrity failures in
    /// catalog and season setup.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        warn!("{self}");
        Err(match self {
            Self::UnknownSeason(_) | Self::UnknownCandidacy(_) => Status::NotFound,
            Self::ConflictingActiveSeason(_) | Self::AlreadyVoted(_) => Status::Conflict,
            Self::InvalidChoice(_) => Status::UnprocessableEntity,
            Self::InvalidTransition(_) | Self::SeasonNotOpen(_) | Self::BadRequest(_) => {
                Status::BadRequest
            }
        })
    }
}
