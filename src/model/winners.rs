//! The winner resolver: derives, per offered office, the winning
//! candidacies from a tally.
//!
//! Candidacies are ranked by tallied votes descending and the top
//! `seats_to_fill` are seated. An exact tie at the seat boundary is
//! resolved by an unweighted random draw among the boundary-tied
//! candidacies. The draw is recorded as a [`TieBreak`] event referenced by
//! the winner records, and the stored tally is never mutated to mark the
//! winner; re-resolving with the recorded events replays the same draw, so
//! refreshing winners is reproducible even in the presence of ties.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::candidacy::CandidacyId;
use crate::model::catalog::OfficeId;
use crate::model::season::SeasonId;

/// One candidacy's standing within an office, as input to the resolver.
/// Disqualified candidacies are excluded before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlateEntry {
    pub candidacy: CandidacyId,
    pub ballot_number: u16,
    pub candidate_name: String,
    pub votes: u64,
}

/// All standings for one offered office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeSlate {
    pub office: OfficeId,
    pub office_label: String,
    pub seats_to_fill: u16,
    pub entries: Vec<SlateEntry>,
}

/// A summary record for a winning candidacy. Derived data: deleted and
/// regenerated wholesale whenever winners are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningCandidate {
    pub season: SeasonId,
    pub office: OfficeId,
    pub office_label: String,
    pub candidacy: CandidacyId,
    pub ballot_number: u16,
    pub candidate_name: String,
}

/// An auditable record of a random draw among boundary-tied candidacies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieBreak {
    pub season: SeasonId,
    pub office: OfficeId,
    /// The tied candidacies, sorted by ID.
    pub tied: Vec<CandidacyId>,
    /// The candidacies the draw seated, sorted by ID.
    pub chosen: Vec<CandidacyId>,
    pub drawn_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub winners: Vec<WinningCandidate>,
    pub tie_breaks: Vec<TieBreak>,
}

/// Resolve winners for every offered office of a season.
///
/// `prior` holds tie-break events recorded by an earlier resolution; a
/// prior draw over the same office and tied set is replayed instead of
/// re-drawing, which makes a refresh reproduce the original winners.
pub fn resolve_winners(
    season: SeasonId,
    slates: Vec<OfficeSlate>,
    prior: &[TieBreak],
    rng: &mut impl Rng,
) -> Resolution {
    let mut resolution = Resolution {
        winners: Vec::new(),
        tie_breaks: Vec::new(),
    };
    for slate in slates {
        resolve_office(season, slate, prior, rng, &mut resolution);
    }
    resolution
}

fn resolve_office(
    season: SeasonId,
    mut slate: OfficeSlate,
    prior: &[TieBreak],
    rng: &mut impl Rng,
    resolution: &mut Resolution,
) {
    let mut entries = std::mem::take(&mut slate.entries);
    entries.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then(a.ballot_number.cmp(&b.ballot_number))
    });

    let seats = usize::from(slate.seats_to_fill);
    let seated: Vec<SlateEntry> = if entries.len() <= seats {
        // Every candidacy is seated; nothing to break.
        entries
    } else {
        // The boundary vote count is the k-th ranked one. Everyone above
        // it is seated outright; an exact tie at the boundary goes to a
        // draw for the remaining seats.
        let boundary = entries[seats - 1].votes;
        let (certain, rest): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| entry.votes > boundary);
        let tied: Vec<SlateEntry> = rest
            .into_iter()
            .filter(|entry| entry.votes == boundary)
            .collect();
        let remaining = seats - certain.len();

        if tied.len() == remaining {
            certain.into_iter().chain(tied).collect()
        } else {
            let chosen = draw_tie_break(season, &slate, &tied, remaining, prior, rng, resolution);
            certain
                .into_iter()
                .chain(
                    tied.into_iter()
                        .filter(|entry| chosen.contains(&entry.candidacy)),
                )
                .collect()
        }
    };

    for entry in seated {
        resolution.winners.push(WinningCandidate {
            season,
            office: slate.office,
            office_label: slate.office_label.clone(),
            candidacy: entry.candidacy,
            ballot_number: entry.ballot_number,
            candidate_name: entry.candidate_name,
        });
    }
}

/// Replay a prior draw over the same tied set if one is on record,
/// otherwise draw fresh. Either way the event ends up in the resolution.
fn draw_tie_break(
    season: SeasonId,
    slate: &OfficeSlate,
    tied: &[SlateEntry],
    remaining: usize,
    prior: &[TieBreak],
    rng: &mut impl Rng,
    resolution: &mut Resolution,
) -> Vec<CandidacyId> {
    let mut tied_ids: Vec<CandidacyId> = tied.iter().map(|entry| entry.candidacy).collect();
    tied_ids.sort_unstable();

    let replayed = prior.iter().find(|event| {
        event.office == slate.office && event.tied == tied_ids && event.chosen.len() == remaining
    });
    let event = match replayed {
        Some(event) => event.clone(),
        None => {
            let mut chosen = tied_ids.clone();
            chosen.shuffle(rng);
            chosen.truncate(remaining);
            chosen.sort_unstable();
            TieBreak {
                season,
                office: slate.office,
                tied: tied_ids,
                chosen,
                drawn_at: Utc::now(),
            }
        }
    };
    let chosen = event.chosen.clone();
    resolution.tie_breaks.push(event);
    chosen
}
