//! The storage seam for the election core. Persistence technology is an
//! external concern; this store keeps everything in memory behind a single
//! `RwLock`. Every operation that must be atomic (the single-active-season
//! check-and-set, the one-ballot-per-voter insert) runs under one write
//! acquisition, the in-process equivalent of a serializable transaction
//! plus a unique index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rocket::{
    request::{FromRequest, Outcome, Request},
    tokio::sync::RwLock,
    State,
};

use crate::error::{Error, Result};
use crate::model::{
    ballot::{Ballot, BallotId, BallotPaper, BallotPaperEntry, BallotPaperOffice, BallotReceipt, BallotSpec},
    candidacy::{Candidacy, CandidacyId, OfferedOffice},
    catalog::{Catalog, ScopeId},
    results::{vote_share, CandidateResult, OfficeResults, SeasonResults},
    season::{Season, SeasonId, SeasonState},
    spec::SeasonSpec,
    tally::{tally_ballots, VoteCounts},
    winners::{resolve_winners, OfficeSlate, SlateEntry, TieBreak, WinningCandidate},
};

#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    catalog: Catalog,
    seasons: BTreeMap<SeasonId, Season>,
    offered: HashMap<SeasonId, Vec<OfferedOffice>>,
    candidacies: BTreeMap<CandidacyId, Candidacy>,
    ballots: BTreeMap<BallotId, Ballot>,
    /// Unique index on (season, voter), checked at append time.
    voted: HashSet<(SeasonId, String)>,
    winners: HashMap<SeasonId, Vec<WinningCandidate>>,
    tie_breaks: HashMap<SeasonId, Vec<TieBreak>>,
    next_season_id: SeasonId,
    next_candidacy_id: CandidacyId,
    next_ballot_id: BallotId,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
        }
    }

    /// Load the reference data. Rejected once any season exists, since
    /// seasons hold references into the catalog.
    pub async fn replace_catalog(&self, catalog: Catalog) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.seasons.is_empty() {
            return Err(Error::bad_request(
                "The catalog cannot be replaced once seasons exist",
            ));
        }
        inner.catalog = catalog;
        Ok(())
    }

    /// Set up a new season from an administrative spec: the offered
    /// offices and the candidacies contesting them.
    pub async fn create_season(&self, spec: SeasonSpec) -> Result<Season> {
        let mut inner = self.inner.write().await;

        if spec.offered.is_empty() {
            return Err(Error::bad_request(
                "A season must offer at least one office",
            ));
        }

        let season_id = inner.next_season_id + 1;

        // Resolve the offered offices.
        let mut offered = Vec::new();
        for offered_spec in &spec.offered {
            let office = inner
                .catalog
                .office_by_name(&offered_spec.office, offered_spec.scope.as_deref())
                .ok_or_else(|| {
                    Error::bad_request(format!("No office named {}", offered_spec.office))
                })?;
            if offered.iter().any(|o: &OfferedOffice| o.office == office.id) {
                return Err(Error::bad_request(format!(
                    "Office {} is offered twice",
                    offered_spec.office
                )));
            }
            let seats_to_fill = offered_spec.seats_to_fill.unwrap_or(office.to_fill);
            if seats_to_fill == 0 {
                return Err(Error::bad_request(format!(
                    "Office {} must fill at least one seat",
                    offered_spec.office
                )));
            }
            offered.push(OfferedOffice {
                season: season_id,
                office: office.id,
                seats_to_fill,
            });
        }

        // Resolve the candidacies against the offered offices.
        let mut candidacies = Vec::new();
        let mut ballot_numbers = HashSet::new();
        for candidacy_spec in &spec.candidacies {
            let candidate = inner
                .catalog
                .candidate_by_student_number(&candidacy_spec.student_number)
                .ok_or_else(|| {
                    Error::bad_request(format!(
                        "No candidate with student number {}",
                        candidacy_spec.student_number
                    ))
                })?;
            let office = inner
                .catalog
                .office_by_name(&candidacy_spec.office, candidacy_spec.scope.as_deref())
                .ok_or_else(|| {
                    Error::bad_request(format!("No office named {}", candidacy_spec.office))
                })?;
            if !offered.iter().any(|o| o.office == office.id) {
                return Err(Error::bad_request(format!(
                    "Office {} is not offered this season",
                    candidacy_spec.office
                )));
            }
            // Ballot numbers are assigned per office by the commission.
            if !ballot_numbers.insert((office.id, candidacy_spec.ballot_number)) {
                return Err(Error::bad_request(format!(
                    "Duplicate ballot number {} for office {}",
                    candidacy_spec.ballot_number, candidacy_spec.office
                )));
            }
            let id = inner.next_candidacy_id + candidacies.len() as u32 + 1;
            candidacies.push(Candidacy {
                id,
                season: season_id,
                candidate: candidate.id,
                office: office.id,
                ballot_number: candidacy_spec.ballot_number,
                is_disqualified: candidacy_spec.is_disqualified,
                disqualification_reason: candidacy_spec.disqualification_reason.clone(),
                tallied_votes: None,
            });
        }

        // All validated; commit.
        inner.next_season_id = season_id;
        inner.next_candidacy_id += candidacies.len() as u32;
        let season = Season::new(season_id, spec.academic_year);
        inner.seasons.insert(season_id, season.clone());
        inner.offered.insert(season_id, offered);
        for candidacy in candidacies {
            inner.candidacies.insert(candidacy.id, candidacy);
        }
        info!("Created season {} ({})", season_id, season.academic_year);
        Ok(season)
    }

    pub async fn season(&self, season_id: SeasonId) -> Result<Season> {
        let inner = self.inner.read().await;
        inner.season(season_id).cloned()
    }

    pub async fn seasons(&self) -> Vec<Season> {
        let inner = self.inner.read().await;
        inner.seasons.values().cloned().collect()
    }

    /// Seasons whose tally job is pending, i.e. stuck in `Concluding`.
    /// Used at startup to recover tallies interrupted by a crash.
    pub async fn seasons_pending_tally(&self) -> Vec<SeasonId> {
        let inner = self.inner.read().await;
        inner
            .seasons
            .values()
            .filter(|season| season.state == SeasonState::Concluding)
            .map(|season| season.id)
            .collect()
    }

    /// Open a season for voting. The "no other active season" check and
    /// the state change happen under one write acquisition, so concurrent
    /// initiations cannot both succeed.
    pub async fn initiate_season(&self, season_id: SeasonId) -> Result<Season> {
        let mut inner = self.inner.write().await;
        inner.season(season_id)?;
        if let Some(active) = inner
            .seasons
            .values()
            .find(|other| other.id != season_id && other.state.is_active())
        {
            return Err(Error::ConflictingActiveSeason(active.id));
        }
        let season = inner.season_mut(season_id)?;
        season.initiate()?;
        info!("Season {season_id} initiated; voting is open");
        Ok(season.clone())
    }

    /// Close the voting window. The tally itself is run separately (and
    /// possibly repeatedly) by the tally job; until it completes the
    /// season stays in `Concluding` and accepts no ballots.
    pub async fn begin_conclude(&self, season_id: SeasonId) -> Result<Season> {
        let mut inner = self.inner.write().await;
        let season = inner.season_mut(season_id)?;
        season.begin_conclusion()?;
        info!("Season {season_id} concluding; voting is closed, tally pending");
        Ok(season.clone())
    }

    /// Tally the season's ballots, resolve winners, and mark the season
    /// concluded. Pure aggregation over the (now immutable) ballot set,
    /// so re-running after a partial failure always converges on the same
    /// counts.
    pub async fn run_tally(&self, season_id: SeasonId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let season = inner.season(season_id)?;
        if !matches!(
            season.state,
            SeasonState::Concluding | SeasonState::Concluded
        ) {
            return Err(Error::InvalidTransition(format!(
                "cannot tally season {} from state {:?}",
                season_id, season.state
            )));
        }

        let candidacy_ids: Vec<CandidacyId> = inner
            .season_candidacies(season_id)
            .map(|candidacy| candidacy.id)
            .collect();
        let ballots = inner
            .ballots
            .values()
            .filter(|ballot| ballot.season == season_id);
        let counts = tally_ballots(candidacy_ids.iter().copied(), ballots);
        let ballot_count = inner
            .ballots
            .values()
            .filter(|ballot| ballot.season == season_id)
            .count();

        for (candidacy_id, votes) in &counts {
            // Present by construction: the IDs came from this season.
            let candidacy = inner.candidacies.get_mut(candidacy_id).unwrap();
            candidacy.tallied_votes = Some(*votes);
        }

        let slates = inner.office_slates(season_id, &counts);
        let prior = inner
            .tie_breaks
            .get(&season_id)
            .cloned()
            .unwrap_or_default();
        let resolution = resolve_winners(season_id, slates, &prior, &mut rand::thread_rng());
        if !resolution.tie_breaks.is_empty() {
            warn!(
                "Season {season_id}: {} tie(s) resolved by random draw",
                resolution.tie_breaks.len()
            );
        }
        inner.winners.insert(season_id, resolution.winners);
        inner.tie_breaks.insert(season_id, resolution.tie_breaks);

        inner.season_mut(season_id)?.complete_conclusion()?;
        info!(
            "Season {season_id} concluded: {ballot_count} ballots tallied across {} candidacies",
            candidacy_ids.len()
        );
        Ok(())
    }

    /// Delete and regenerate the season's winner records from the stored
    /// tally, without re-tallying. Recorded tie-break draws are replayed,
    /// so a refresh reproduces the original winners.
    pub async fn refresh_winners(&self, season_id: SeasonId) -> Result<Vec<WinningCandidate>> {
        let mut inner = self.inner.write().await;
        let season = inner.season(season_id)?;
        if season.state != SeasonState::Concluded {
            return Err(Error::InvalidTransition(format!(
                "cannot refresh winners of season {} from state {:?}",
                season_id, season.state
            )));
        }

        let counts: VoteCounts = inner
            .season_candidacies(season_id)
            .map(|candidacy| (candidacy.id, candidacy.tallied_votes.unwrap_or(0)))
            .collect();
        let slates = inner.office_slates(season_id, &counts);
        let prior = inner
            .tie_breaks
            .get(&season_id)
            .cloned()
            .unwrap_or_default();
        let resolution = resolve_winners(season_id, slates, &prior, &mut rand::thread_rng());
        inner.winners.insert(season_id, resolution.winners.clone());
        inner.tie_breaks.insert(season_id, resolution.tie_breaks);
        info!("Season {season_id}: winners refreshed");
        Ok(resolution.winners)
    }

    /// Cast a ballot. The no-prior-ballot check and the append happen
    /// under one write acquisition, so a concurrent double-submission by
    /// the same voter cannot produce two ballots.
    pub async fn cast_ballot(
        &self,
        season_id: SeasonId,
        voter: &str,
        spec: BallotSpec,
    ) -> Result<BallotReceipt> {
        let mut inner = self.inner.write().await;
        let season = inner.season(season_id)?;
        if !season.state.can_accept_ballots() {
            return Err(Error::SeasonNotOpen(season_id));
        }
        if !inner.catalog.scopes.contains_key(&spec.scope) {
            return Err(Error::bad_request(format!(
                "No scope with ID {}",
                spec.scope
            )));
        }
        if inner.voted.contains(&(season_id, voter.to_string())) {
            return Err(Error::AlreadyVoted(season_id));
        }

        inner.validate_choices(season_id, spec.scope, &spec.choices)?;

        let ballot_id = inner.next_ballot_id + 1;
        inner.next_ballot_id = ballot_id;
        let ballot = Ballot {
            id: ballot_id,
            season: season_id,
            voter: voter.to_string(),
            scope: spec.scope,
            cast_at: Utc::now(),
            choices: spec.choices,
        };
        let receipt = BallotReceipt {
            ballot_id,
            cast_at: ballot.cast_at,
        };
        inner.voted.insert((season_id, voter.to_string()));
        inner.ballots.insert(ballot_id, ballot);
        // Deliberately no tally update here: no running totals are
        // visible while voting is open.
        Ok(receipt)
    }

    /// The ballot paper for a voter of the given scope: each visible
    /// offered office with its selectable candidacies and seat count.
    pub async fn ballot_paper(&self, season_id: SeasonId, scope: ScopeId) -> Result<BallotPaper> {
        let inner = self.inner.read().await;
        let season = inner.season(season_id)?;
        if !season.state.can_accept_ballots() {
            return Err(Error::SeasonNotOpen(season_id));
        }
        if !inner.catalog.scopes.contains_key(&scope) {
            return Err(Error::bad_request(format!("No scope with ID {scope}")));
        }

        let mut offices = Vec::new();
        for offered in inner.offered.get(&season_id).into_iter().flatten() {
            // Present by construction: offered offices reference the catalog.
            let office = inner.catalog.offices.get(&offered.office).unwrap();
            if !office.scope.map_or(true, |s| s == scope) {
                continue;
            }
            let mut candidacies: Vec<BallotPaperEntry> = inner
                .season_candidacies(season_id)
                .filter(|candidacy| candidacy.office == office.id && !candidacy.is_disqualified)
                .map(|candidacy| {
                    let candidate = inner.catalog.candidates.get(&candidacy.candidate).unwrap();
                    BallotPaperEntry {
                        candidacy: candidacy.id,
                        ballot_number: candidacy.ballot_number,
                        candidate_name: candidate.display_name(),
                        party: inner.catalog.party_name(candidate.party),
                    }
                })
                .collect();
            candidacies.sort_by_key(|entry| entry.ballot_number);
            offices.push(BallotPaperOffice {
                office: office.id,
                office_label: inner.catalog.office_label(office),
                max_choices: offered.seats_to_fill,
                candidacies,
            });
        }

        Ok(BallotPaper {
            season: season_id,
            scope,
            offices,
        })
    }

    /// Display-ready results for a concluded season.
    pub async fn results(&self, season_id: SeasonId) -> Result<SeasonResults> {
        let inner = self.inner.read().await;
        let season = inner.season(season_id)?.clone();
        if season.state != SeasonState::Concluded {
            return Err(Error::bad_request(format!(
                "Results are not available until season {season_id} is concluded"
            )));
        }

        let winners = inner.winners.get(&season_id).cloned().unwrap_or_default();
        let mut offices = Vec::new();
        for offered in inner.offered.get(&season_id).into_iter().flatten() {
            let office = inner.catalog.offices.get(&offered.office).unwrap();
            let mut candidates: Vec<CandidateResult> = Vec::new();
            for candidacy in inner
                .season_candidacies(season_id)
                .filter(|candidacy| candidacy.office == office.id)
            {
                let candidate = inner.catalog.candidates.get(&candidacy.candidate).unwrap();
                candidates.push(CandidateResult {
                    candidacy: candidacy.id,
                    ballot_number: candidacy.ballot_number,
                    candidate_name: candidate.display_name(),
                    party: inner.catalog.party_name(candidate.party),
                    is_disqualified: candidacy.is_disqualified,
                    votes: candidacy.tallied_votes.unwrap_or(0),
                    share: 0.0,
                });
            }
            candidates.sort_by_key(|candidate| candidate.ballot_number);
            let total_votes: u64 = candidates.iter().map(|candidate| candidate.votes).sum();
            for candidate in &mut candidates {
                candidate.share = vote_share(candidate.votes, total_votes);
            }
            offices.push(OfficeResults {
                office: office.id,
                office_label: inner.catalog.office_label(office),
                seats_to_fill: offered.seats_to_fill,
                total_votes,
                candidates,
                winners: winners
                    .iter()
                    .filter(|winner| winner.office == office.id)
                    .cloned()
                    .collect(),
            });
        }

        Ok(SeasonResults { season, offices })
    }

    pub async fn winners(&self, season_id: SeasonId) -> Result<Vec<WinningCandidate>> {
        let inner = self.inner.read().await;
        let season = inner.season(season_id)?;
        if season.state != SeasonState::Concluded {
            return Err(Error::bad_request(format!(
                "Winners are not resolved until season {season_id} is concluded"
            )));
        }
        Ok(inner.winners.get(&season_id).cloned().unwrap_or_default())
    }

    /// The recorded tie-break draws for a concluded season, for audit.
    pub async fn tie_breaks(&self, season_id: SeasonId) -> Result<Vec<TieBreak>> {
        let inner = self.inner.read().await;
        let season = inner.season(season_id)?;
        if season.state != SeasonState::Concluded {
            return Err(Error::bad_request(format!(
                "Tie-break records are not available until season {season_id} is concluded"
            )));
        }
        Ok(inner.tie_breaks.get(&season_id).cloned().unwrap_or_default())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    fn season(&self, season_id: SeasonId) -> Result<&Season> {
        self.seasons
            .get(&season_id)
            .ok_or(Error::UnknownSeason(season_id))
    }

    fn season_mut(&mut self, season_id: SeasonId) -> Result<&mut Season> {
        self.seasons
            .get_mut(&season_id)
            .ok_or(Error::UnknownSeason(season_id))
    }

    fn season_candidacies(&self, season_id: SeasonId) -> impl Iterator<Item = &Candidacy> {
        self.candidacies
            .values()
            .filter(move |candidacy| candidacy.season == season_id)
    }

    /// Validate a ballot's choices against the season's catalog: every
    /// choice must be a selectable candidacy of a visible office, within
    /// the office's seat count.
    fn validate_choices(
        &self,
        season_id: SeasonId,
        scope: ScopeId,
        choices: &[CandidacyId],
    ) -> Result<()> {
        let mut per_office: HashMap<u32, u16> = HashMap::new();
        let mut seen = HashSet::new();
        for &choice in choices {
            if !seen.insert(choice) {
                return Err(Error::InvalidChoice(format!(
                    "candidacy {choice} chosen more than once"
                )));
            }
            let candidacy = self
                .candidacies
                .get(&choice)
                .ok_or(Error::UnknownCandidacy(choice))?;
            if candidacy.season != season_id {
                return Err(Error::InvalidChoice(format!(
                    "candidacy {choice} is not running in season {season_id}"
                )));
            }
            if candidacy.is_disqualified {
                return Err(Error::InvalidChoice(format!(
                    "candidacy {choice} is disqualified"
                )));
            }
            let office = self.catalog.offices.get(&candidacy.office).unwrap();
            if !office.scope.map_or(true, |s| s == scope) {
                return Err(Error::InvalidChoice(format!(
                    "office {} is not on the ballot for scope {scope}",
                    office.id
                )));
            }
            *per_office.entry(office.id).or_default() += 1;
        }

        for offered in self.offered.get(&season_id).into_iter().flatten() {
            if let Some(&chosen) = per_office.get(&offered.office) {
                if chosen > offered.seats_to_fill {
                    return Err(Error::InvalidChoice(format!(
                        "{chosen} choices for office {} but only {} seat(s) to fill",
                        offered.office, offered.seats_to_fill
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the per-office resolver input from a set of vote counts.
    /// Disqualified candidacies never reach the resolver.
    fn office_slates(&self, season_id: SeasonId, counts: &VoteCounts) -> Vec<OfficeSlate> {
        let mut slates = Vec::new();
        for offered in self.offered.get(&season_id).into_iter().flatten() {
            let office = self.catalog.offices.get(&offered.office).unwrap();
            let entries = self
                .season_candidacies(season_id)
                .filter(|candidacy| candidacy.office == office.id && !candidacy.is_disqualified)
                .map(|candidacy| {
                    let candidate = self.catalog.candidates.get(&candidacy.candidate).unwrap();
                    SlateEntry {
                        candidacy: candidacy.id,
                        ballot_number: candidacy.ballot_number,
                        candidate_name: candidate.display_name(),
                        votes: counts.get(&candidacy.id).copied().unwrap_or(0),
                    }
                })
                .collect();
            slates.push(OfficeSlate {
                office: office.id,
                office_label: self.catalog.office_label(office),
                seats_to_fill: offered.seats_to_fill,
                entries,
            });
        }
        slates
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Store {
    type Error = ();

    /// Get the store from the managed state.
    ///
    /// Panics iff the [`Store`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let store = req.guard::<&State<Store>>().await.unwrap();
        Outcome::Success(store.inner().clone())
    }
}

#[cfg(test)]
impl Store {
    /// Number of ballots stored for a season.
    pub async fn ballot_count(&self, season_id: SeasonId) -> usize {
        let inner = self.inner.read().await;
        inner
            .ballots
            .values()
            .filter(|ballot| ballot.season == season_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::model::spec::{CatalogSpec, SeasonSpec};

    use super::*;

    const ENGINEERING: ScopeId = 1;
    const SCIENCE: ScopeId = 2;

    // Candidacy IDs as assigned from `SeasonSpec::example()`:
    // 1 = Alice (President), 2 = Bruno (President),
    // 3 = Carla, 4 = Diego, 5 = Elena (Councilor, 2 seats),
    // 6 = Felipe (Governor, College of Engineering).

    async fn seeded_store() -> (Store, SeasonId) {
        let store = Store::new();
        store
            .replace_catalog(CatalogSpec::example().into_catalog().unwrap())
            .await
            .unwrap();
        let season = store.create_season(SeasonSpec::example()).await.unwrap();
        (store, season.id)
    }

    fn ballot(scope: ScopeId, choices: Vec<CandidacyId>) -> BallotSpec {
        BallotSpec { scope, choices }
    }

    #[rocket::async_test]
    async fn casting_requires_an_open_season() {
        let (store, season_id) = seeded_store().await;
        let err = store
            .cast_ballot(season_id, "2020-11111-MN-0", ballot(ENGINEERING, vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::SeasonNotOpen(season_id));

        let err = store
            .cast_ballot(99, "2020-11111-MN-0", ballot(ENGINEERING, vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::UnknownSeason(99));
    }

    #[rocket::async_test]
    async fn one_ballot_per_voter() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();

        store
            .cast_ballot(season_id, "2020-11111-MN-0", ballot(ENGINEERING, vec![1]))
            .await
            .unwrap();
        let err = store
            .cast_ballot(season_id, "2020-11111-MN-0", ballot(ENGINEERING, vec![2]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::AlreadyVoted(season_id));
        assert_eq!(store.ballot_count(season_id).await, 1);
    }

    #[rocket::async_test]
    async fn concurrent_double_submission_cannot_produce_two_ballots() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .cast_ballot(season_id, "2020-11111-MN-0", ballot(ENGINEERING, vec![1]))
                    .await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_eq!(err, Error::AlreadyVoted(season_id)),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.ballot_count(season_id).await, 1);
    }

    #[rocket::async_test]
    async fn at_most_one_active_season() {
        let store = Store::new();
        store
            .replace_catalog(CatalogSpec::example().into_catalog().unwrap())
            .await
            .unwrap();
        let mut season_ids = Vec::new();
        for year in 2018..2024 {
            let mut spec = SeasonSpec::example();
            spec.academic_year = format!("{}-{}", year, year + 1);
            season_ids.push(store.create_season(spec).await.unwrap().id);
        }

        let mut handles = Vec::new();
        for season_id in season_ids {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.initiate_season(season_id).await },
            ));
        }
        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, Error::ConflictingActiveSeason(_))),
            }
        }
        assert_eq!(successes, 1);

        let active = store
            .seasons()
            .await
            .into_iter()
            .filter(|season| season.state.is_active())
            .count();
        assert_eq!(active, 1);
    }

    #[rocket::async_test]
    async fn initiation_is_not_repeatable() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();
        // Same season again: its own lifecycle forbids it.
        let err = store.initiate_season(season_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[rocket::async_test]
    async fn choice_validation() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();

        // A Science voter cannot choose the Engineering governor.
        let err = store
            .cast_ballot(season_id, "v-science", ballot(SCIENCE, vec![6]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChoice(_)));

        // Three councilor choices for two seats.
        let err = store
            .cast_ballot(season_id, "v-over", ballot(ENGINEERING, vec![3, 4, 5]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChoice(_)));

        // Duplicate choice.
        let err = store
            .cast_ballot(season_id, "v-dup", ballot(ENGINEERING, vec![1, 1]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChoice(_)));

        // Unknown candidacy.
        let err = store
            .cast_ballot(season_id, "v-unknown", ballot(ENGINEERING, vec![999]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::UnknownCandidacy(999));

        // A full, valid ballot.
        store
            .cast_ballot(season_id, "v-ok", ballot(ENGINEERING, vec![1, 3, 4, 6]))
            .await
            .unwrap();
    }

    #[rocket::async_test]
    async fn disqualified_candidacies_are_not_selectable() {
        let store = Store::new();
        store
            .replace_catalog(CatalogSpec::example().into_catalog().unwrap())
            .await
            .unwrap();
        let mut spec = SeasonSpec::example();
        spec.candidacies[1].is_disqualified = true;
        spec.candidacies[1].disqualification_reason = Some("Overspending".to_string());
        let season_id = store.create_season(spec).await.unwrap().id;
        store.initiate_season(season_id).await.unwrap();

        // Not listed on the ballot paper...
        let paper = store.ballot_paper(season_id, SCIENCE).await.unwrap();
        let president = paper.offices.iter().find(|o| o.office == 1).unwrap();
        assert!(president.candidacies.iter().all(|entry| entry.candidacy != 2));

        // ...and rejected if submitted anyway.
        let err = store
            .cast_ballot(season_id, "v1", ballot(SCIENCE, vec![2]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidChoice(_)));
    }

    #[rocket::async_test]
    async fn ballot_paper_is_scoped() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();

        let engineering = store.ballot_paper(season_id, ENGINEERING).await.unwrap();
        assert_eq!(engineering.offices.len(), 3);
        let councilor = engineering.offices.iter().find(|o| o.office == 3).unwrap();
        assert_eq!(councilor.max_choices, 2);
        let numbers: Vec<u16> = councilor
            .candidacies
            .iter()
            .map(|entry| entry.ballot_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // Science voters do not see the Engineering governorship.
        let science = store.ballot_paper(season_id, SCIENCE).await.unwrap();
        assert_eq!(science.offices.len(), 2);
        assert!(science.offices.iter().all(|office| office.office != 4));
    }

    #[rocket::async_test]
    async fn conclude_tally_resolve_and_project() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();

        // Eight ballots: Alice (1) gets 3, Bruno (2) gets 5; councilors
        // Carla (3) gets 3, Diego (4) gets 5.
        for i in 0..8 {
            let choices = if i < 3 { vec![1, 3] } else { vec![2, 4] };
            store
                .cast_ballot(season_id, &format!("voter-{i}"), ballot(SCIENCE, choices))
                .await
                .unwrap();
        }

        store.begin_conclude(season_id).await.unwrap();
        assert_eq!(
            store.season(season_id).await.unwrap().state,
            SeasonState::Concluding
        );
        // Voting is closed as soon as the season is concluding.
        let err = store
            .cast_ballot(season_id, "latecomer", ballot(SCIENCE, vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::SeasonNotOpen(season_id));

        store.run_tally(season_id).await.unwrap();
        assert_eq!(
            store.season(season_id).await.unwrap().state,
            SeasonState::Concluded
        );

        let results = store.results(season_id).await.unwrap();
        let president = results.offices.iter().find(|o| o.office == 1).unwrap();
        assert_eq!(president.total_votes, 8);
        assert_eq!(president.candidates[0].votes, 3);
        assert_eq!(president.candidates[0].share, 0.375);
        assert_eq!(president.candidates[1].votes, 5);
        assert_eq!(president.candidates[1].share, 0.625);
        assert_eq!(president.winners.len(), 1);
        assert_eq!(president.winners[0].candidacy, 2);
        assert_eq!(president.winners[0].office_label, "CENTRAL - President");
        assert_eq!(president.winners[0].candidate_name, "Bruno Santos");

        // Two councilor seats: Diego (5 votes) and Carla (3 votes) beat
        // Elena (0 votes).
        let councilor = results.offices.iter().find(|o| o.office == 3).unwrap();
        let seated: Vec<CandidacyId> =
            councilor.winners.iter().map(|w| w.candidacy).collect();
        assert_eq!(seated, vec![4, 3]);

        // Felipe ran unopposed for governor.
        let governor = results.offices.iter().find(|o| o.office == 4).unwrap();
        assert_eq!(governor.total_votes, 0);
        assert_eq!(governor.candidates[0].share, 0.0);
        assert_eq!(governor.winners.len(), 1);
        assert_eq!(governor.winners[0].office_label, "College of Engineering - Governor");

        assert!(store.tie_breaks(season_id).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn tally_rerun_and_refresh_are_idempotent() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();
        for i in 0..5 {
            let choices = if i < 2 { vec![1] } else { vec![2] };
            store
                .cast_ballot(season_id, &format!("voter-{i}"), ballot(SCIENCE, choices))
                .await
                .unwrap();
        }
        store.begin_conclude(season_id).await.unwrap();
        store.run_tally(season_id).await.unwrap();
        let first_results = store.results(season_id).await.unwrap();
        let first_winners = store.winners(season_id).await.unwrap();

        // The tally job may run more than once (at-least-once semantics).
        store.run_tally(season_id).await.unwrap();
        assert_eq!(store.results(season_id).await.unwrap(), first_results);

        // Refresh regenerates the same winners without re-tallying.
        let refreshed = store.refresh_winners(season_id).await.unwrap();
        assert_eq!(refreshed, first_winners);
    }

    #[rocket::async_test]
    async fn exact_tie_seats_exactly_one_winner_reproducibly() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();
        store
            .cast_ballot(season_id, "v1", ballot(SCIENCE, vec![1]))
            .await
            .unwrap();
        store
            .cast_ballot(season_id, "v2", ballot(SCIENCE, vec![2]))
            .await
            .unwrap();
        store.begin_conclude(season_id).await.unwrap();
        store.run_tally(season_id).await.unwrap();

        let winners = store.winners(season_id).await.unwrap();
        let president: Vec<_> = winners.iter().filter(|w| w.office == 1).collect();
        assert_eq!(president.len(), 1);
        assert!([1, 2].contains(&president[0].candidacy));

        // The draw is on record, and refresh replays it.
        let tie_breaks = store.tie_breaks(season_id).await.unwrap();
        assert!(tie_breaks.iter().any(|tb| tb.office == 1 && tb.tied == vec![1, 2]));
        let refreshed = store.refresh_winners(season_id).await.unwrap();
        assert_eq!(refreshed, winners);
        assert_eq!(store.tie_breaks(season_id).await.unwrap(), tie_breaks);
    }

    #[rocket::async_test]
    async fn tally_and_results_are_gated_by_state() {
        let (store, season_id) = seeded_store().await;

        // Cannot tally a season that never opened.
        let err = store.run_tally(season_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        store.initiate_season(season_id).await.unwrap();
        let err = store.run_tally(season_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        // No results or winners while voting is open.
        assert!(matches!(
            store.results(season_id).await.unwrap_err(),
            Error::BadRequest(_)
        ));
        assert!(matches!(
            store.winners(season_id).await.unwrap_err(),
            Error::BadRequest(_)
        ));
        assert!(matches!(
            store.refresh_winners(season_id).await.unwrap_err(),
            Error::InvalidTransition(_)
        ));
    }

    #[rocket::async_test]
    async fn concluding_seasons_are_reported_for_recovery() {
        let (store, season_id) = seeded_store().await;
        store.initiate_season(season_id).await.unwrap();
        store.begin_conclude(season_id).await.unwrap();
        assert_eq!(store.seasons_pending_tally().await, vec![season_id]);

        store.run_tally(season_id).await.unwrap();
        assert!(store.seasons_pending_tally().await.is_empty());
    }

    #[rocket::async_test]
    async fn catalog_is_frozen_once_seasons_exist() {
        let (store, _) = seeded_store().await;
        let err = store
            .replace_catalog(CatalogSpec::example().into_catalog().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
