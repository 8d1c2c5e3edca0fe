//! The tally engine: a pure aggregation of ballot choices into
//! per-candidacy vote counts. Because it is a pure function over an
//! immutable ballot set, it is safe to re-run at-least-once after a crash.

use std::collections::HashMap;

use crate::model::ballot::Ballot;
use crate::model::candidacy::CandidacyId;

pub type VoteCounts = HashMap<CandidacyId, u64>;

/// Count one vote per chosen candidacy per ballot. Every candidacy of the
/// season is initialised to zero, so an empty ballot set yields all-zero
/// counts rather than missing entries.
pub fn tally_ballots<'a>(
    candidacies: impl IntoIterator<Item = CandidacyId>,
    ballots: impl IntoIterator<Item = &'a Ballot>,
) -> VoteCounts {
    let mut counts: VoteCounts = candidacies.into_iter().map(|id| (id, 0)).collect();
    for ballot in ballots {
        for choice in &ballot.choices {
            // Choices are validated against the season's candidacies at
            // cast time, so every choice has an entry.
            if let Some(count) = counts.get_mut(choice) {
                *count += 1;
            }
        }
    }
    counts
}
