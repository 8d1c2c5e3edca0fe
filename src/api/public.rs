//! Public, read-only endpoints for seasons and their outcomes.

use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        results::SeasonResults,
        season::{Season, SeasonId},
        winners::{TieBreak, WinningCandidate},
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_seasons,
        get_season,
        get_results,
        get_winners,
        get_tie_breaks,
    ]
}

#[get("/seasons")]
async fn get_seasons(store: Store) -> Json<Vec<Season>> {
    Json(store.seasons().await)
}

#[get("/seasons/<season_id>")]
async fn get_season(season_id: SeasonId, store: Store) -> Result<Json<Season>> {
    let season = store.season(season_id).await?;
    Ok(Json(season))
}

/// Full per-office results with vote counts, shares and winners. Only
/// available once the season has concluded; no live counts leak out
/// while voting is open or the tally is running.
#[get("/seasons/<season_id>/results")]
async fn get_results(season_id: SeasonId, store: Store) -> Result<Json<SeasonResults>> {
    let results = store.results(season_id).await?;
    Ok(Json(results))
}

#[get("/seasons/<season_id>/winners")]
async fn get_winners(season_id: SeasonId, store: Store) -> Result<Json<Vec<WinningCandidate>>> {
    let winners = store.winners(season_id).await?;
    Ok(Json(winners))
}

/// The audit trail of random draws made to break exact ties.
#[get("/seasons/<season_id>/tie-breaks")]
async fn get_tie_breaks(season_id: SeasonId, store: Store) -> Result<Json<Vec<TieBreak>>> {
    let tie_breaks = store.tie_breaks(season_id).await?;
    Ok(Json(tie_breaks))
}
