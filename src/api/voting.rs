//! Voter endpoints: fetching the ballot paper and casting a ballot.

use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        ballot::{BallotPaper, BallotReceipt, BallotSpec},
        catalog::ScopeId,
        season::SeasonId,
        voter::VoterIdentity,
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![ballot_paper, cast_ballot]
}

/// The ballot paper for the voter's declared scope: central offices plus
/// offices local to that scope, each with its selectable candidacies.
/// Only available while the season accepts ballots.
#[get("/seasons/<season_id>/ballot-paper?<scope>")]
async fn ballot_paper(
    season_id: SeasonId,
    scope: ScopeId,
    _voter: VoterIdentity,
    store: Store,
) -> Result<Json<BallotPaper>> {
    let paper = store.ballot_paper(season_id, scope).await?;
    Ok(Json(paper))
}

/// Cast the voter's single ballot for the season. A second submission by
/// the same voter is rejected with a conflict, whatever its contents.
#[post("/seasons/<season_id>/ballots", data = "<spec>", format = "json")]
async fn cast_ballot(
    season_id: SeasonId,
    voter: VoterIdentity,
    spec: Json<BallotSpec>,
    store: Store,
) -> Result<Json<BallotReceipt>> {
    let receipt = store.cast_ballot(season_id, voter.as_str(), spec.0).await?;
    info!(
        "Ballot {} cast in season {season_id}",
        receipt.ballot_id
    );
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
    };

    use crate::model::{
        season::{Season, SeasonId},
        spec::{CatalogSpec, SeasonSpec},
        voter::VOTER_ID_HEADER,
    };

    use super::*;

    async fn client() -> Client {
        Client::tracked(crate::build()).await.unwrap()
    }

    /// Seed the catalog and a season, and open it for voting.
    async fn open_season(client: &Client) -> SeasonId {
        client
            .put("/catalog")
            .header(ContentType::JSON)
            .json(&CatalogSpec::example())
            .dispatch()
            .await;
        let response = client
            .post("/seasons")
            .header(ContentType::JSON)
            .json(&SeasonSpec::example())
            .dispatch()
            .await;
        let season: Season = response.into_json().await.unwrap();
        client
            .post(format!("/seasons/{}/initiate", season.id))
            .dispatch()
            .await;
        season.id
    }

    fn voter(id: &str) -> Header<'static> {
        Header::new(VOTER_ID_HEADER, id.to_string())
    }

    #[rocket::async_test]
    async fn ballot_paper_is_scoped() {
        let client = client().await;
        let season_id = open_season(&client).await;

        // Scope 1 (Engineering) sees the central offices plus its governor.
        let response = client
            .get(format!("/seasons/{season_id}/ballot-paper?scope=1"))
            .header(voter("2020-00001"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let paper: BallotPaper = response.into_json().await.unwrap();
        let labels: Vec<&str> = paper
            .offices
            .iter()
            .map(|o| o.office_label.as_str())
            .collect();
        assert!(labels.contains(&"CENTRAL - President"));
        assert!(labels.contains(&"CENTRAL - Councilor"));
        assert!(labels.contains(&"College of Engineering - Governor"));

        // Scope 2 (Science) has no governor race this season.
        let response = client
            .get(format!("/seasons/{season_id}/ballot-paper?scope=2"))
            .header(voter("2020-00001"))
            .dispatch()
            .await;
        let paper: BallotPaper = response.into_json().await.unwrap();
        assert!(paper
            .offices
            .iter()
            .all(|o| !o.office_label.contains("Governor")));
    }

    #[rocket::async_test]
    async fn casting_requires_voter_identity() {
        let client = client().await;
        let season_id = open_season(&client).await;

        let spec = BallotSpec {
            scope: 1,
            choices: vec![1],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn one_ballot_per_voter() {
        let client = client().await;
        let season_id = open_season(&client).await;

        let spec = BallotSpec {
            scope: 1,
            choices: vec![1, 3, 4],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .header(voter("2020-00042"))
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let receipt: BallotReceipt = response.into_json().await.unwrap();
        assert_eq!(receipt.ballot_id, 1);

        // A second submission is rejected even with different choices.
        let spec = BallotSpec {
            scope: 1,
            choices: vec![2],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .header(voter("2020-00042"))
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn invalid_choices_are_unprocessable() {
        let client = client().await;
        let season_id = open_season(&client).await;

        // Two presidents on one ballot exceeds the office's seat count.
        let spec = BallotSpec {
            scope: 1,
            choices: vec![1, 2],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .header(voter("2020-00042"))
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);

        // The Engineering governor is not on a Science ballot.
        let spec = BallotSpec {
            scope: 2,
            choices: vec![6],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .header(voter("2020-00042"))
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn closed_season_accepts_no_ballots() {
        let client = client().await;
        let season_id = open_season(&client).await;
        client
            .post(format!("/seasons/{season_id}/conclude"))
            .dispatch()
            .await;

        let spec = BallotSpec {
            scope: 1,
            choices: vec![1],
        };
        let response = client
            .post(format!("/seasons/{season_id}/ballots"))
            .header(ContentType::JSON)
            .header(voter("2020-00042"))
            .json(&spec)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .get(format!("/seasons/{season_id}/ballot-paper?scope=1"))
            .header(voter("2020-00042"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
