//! Operator endpoints: catalog management and the season lifecycle.
//! Authentication is delegated to the deployment (these routes are
//! expected to sit behind the institution's reverse proxy).

use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        season::{Season, SeasonId},
        spec::{CatalogSpec, SeasonSpec},
        winners::WinningCandidate,
    },
    store::Store,
    tally_runner::TallyRunners,
};

pub fn routes() -> Vec<Route> {
    routes![
        replace_catalog,
        create_season,
        initiate_season,
        conclude_season,
        refresh_winners,
    ]
}

/// Replace the whole candidate catalog. Rejected once any season exists,
/// since seasons hold references into the catalog.
#[put("/catalog", data = "<spec>", format = "json")]
async fn replace_catalog(spec: Json<CatalogSpec>, store: Store) -> Result<()> {
    let catalog = spec.0.into_catalog()?;
    store.replace_catalog(catalog).await
}

/// Create a new season in the `New` state, with its offered offices and
/// candidacies resolved against the catalog.
#[post("/seasons", data = "<spec>", format = "json")]
async fn create_season(spec: Json<SeasonSpec>, store: Store) -> Result<Json<Season>> {
    let season = store.create_season(spec.0).await?;
    info!(
        "Created season {} for academic year {}",
        season.id, season.academic_year
    );
    Ok(Json(season))
}

/// Open the season for voting. Fails if another season is already active.
#[post("/seasons/<season_id>/initiate")]
async fn initiate_season(season_id: SeasonId, store: Store) -> Result<Json<Season>> {
    let season = store.initiate_season(season_id).await?;
    info!("Season {season_id} initiated");
    Ok(Json(season))
}

/// Close the voting window and schedule the tally. The season reaches
/// `Concluded` once the background tally completes.
#[post("/seasons/<season_id>/conclude")]
async fn conclude_season(
    season_id: SeasonId,
    store: Store,
    runners: &State<TallyRunners>,
) -> Result<Json<Season>> {
    let season = store.begin_conclude(season_id).await?;
    runners.schedule(store, season_id).await;
    info!("Season {season_id} concluding; tally scheduled");
    Ok(Json(season))
}

/// Recompute the winner set of a concluded season from the stored tally.
/// Recorded tie-break draws are replayed, so the outcome is stable.
#[post("/seasons/<season_id>/winners/refresh")]
async fn refresh_winners(
    season_id: SeasonId,
    store: Store,
) -> Result<Json<Vec<WinningCandidate>>> {
    let winners = store.refresh_winners(season_id).await?;
    Ok(Json(winners))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };

    use crate::model::{
        season::SeasonState,
        spec::{CatalogSpec, SeasonSpec},
    };

    use super::*;

    async fn client() -> Client {
        Client::tracked(crate::build()).await.unwrap()
    }

    async fn seed(client: &Client) -> Season {
        let response = client
            .put("/catalog")
            .header(ContentType::JSON)
            .json(&CatalogSpec::example())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post("/seasons")
            .header(ContentType::JSON)
            .json(&SeasonSpec::example())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.unwrap()
    }

    #[rocket::async_test]
    async fn lifecycle_over_http() {
        let client = client().await;
        let season = seed(&client).await;
        assert_eq!(season.state, SeasonState::New);

        let response = client
            .post(format!("/seasons/{}/initiate", season.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let season: Season = response.into_json().await.unwrap();
        assert_eq!(season.state, SeasonState::Initiated);
        assert!(season.initiated_at.is_some());

        let response = client
            .post(format!("/seasons/{}/conclude", season.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        // Wait for the background tally, then observe the final state.
        let runners = client.rocket().state::<TallyRunners>().unwrap();
        runners.wait(season.id).await.unwrap();

        let response = client.get(format!("/seasons/{}", season.id)).dispatch().await;
        let season: Season = response.into_json().await.unwrap();
        assert_eq!(season.state, SeasonState::Concluded);
        assert!(season.concluded_at.is_some());
    }

    #[rocket::async_test]
    async fn lifecycle_violations_are_rejected() {
        let client = client().await;
        let season = seed(&client).await;

        // Cannot conclude before initiating.
        let response = client
            .post(format!("/seasons/{}/conclude", season.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        // Cannot refresh winners before the season is concluded.
        let response = client
            .post(format!("/seasons/{}/winners/refresh", season.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        client
            .post(format!("/seasons/{}/initiate", season.id))
            .dispatch()
            .await;

        // Cannot initiate twice.
        let response = client
            .post(format!("/seasons/{}/initiate", season.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        // The catalog is frozen once a season exists.
        let response = client
            .put("/catalog")
            .header(ContentType::JSON)
            .json(&CatalogSpec::example())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn only_one_active_season() {
        let client = client().await;
        let first = seed(&client).await;

        let mut second_spec = SeasonSpec::example();
        second_spec.academic_year = "2022-2023".to_string();
        let response = client
            .post("/seasons")
            .header(ContentType::JSON)
            .json(&second_spec)
            .dispatch()
            .await;
        let second: Season = response.into_json().await.unwrap();

        client
            .post(format!("/seasons/{}/initiate", first.id))
            .dispatch()
            .await;
        let response = client
            .post(format!("/seasons/{}/initiate", second.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn unknown_season_is_not_found() {
        let client = client().await;
        seed(&client).await;
        let response = client.post("/seasons/999/initiate").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
