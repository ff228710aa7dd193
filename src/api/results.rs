use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::results::{ElectionResults, ReconcileReport, ResultRowDesc, WinnerDesc},
    auth::{Admin, Anyone, AuthToken},
    mongodb::Id,
};
use crate::voting::{tally::TallyEngine, winner::get_winner};

use super::rejected;

pub fn routes() -> Vec<Route> {
    routes![
        calculate_results,
        calculate_results_rejected,
        get_results,
        get_results_rejected,
        get_winner_route,
        get_winner_rejected,
        reconcile_counters,
        reconcile_counters_rejected,
    ]
}

#[post("/elections/<election_id>/results/calculate")]
async fn calculate_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    engine: &State<TallyEngine>,
) -> Result<Json<Vec<ResultRowDesc>>> {
    let rows = engine.calculate_results(election_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[post("/elections/<election_id>/results/calculate", rank = 2)]
fn calculate_results_rejected(election_id: &str) -> Error {
    rejected(election_id, "calculate results")
}

#[get("/elections/<election_id>/results")]
async fn get_results(
    _token: AuthToken<Anyone>,
    election_id: Id,
    engine: &State<TallyEngine>,
) -> Result<Json<ElectionResults>> {
    let (election, rows) = engine.get_results(election_id).await?;
    Ok(Json(ElectionResults {
        election: election_id.into(),
        status: election.status(),
        results: rows.into_iter().map(Into::into).collect(),
    }))
}

#[get("/elections/<election_id>/results", rank = 2)]
fn get_results_rejected(election_id: &str) -> Error {
    rejected(election_id, "view results")
}

#[get("/elections/<election_id>/winner")]
async fn get_winner_route(
    _token: AuthToken<Anyone>,
    election_id: Id,
    engine: &State<TallyEngine>,
) -> Result<Json<WinnerDesc>> {
    let (_, rows) = engine.get_results(election_id).await?;
    Ok(Json(WinnerDesc::new(election_id.into(), get_winner(&rows))))
}

#[get("/elections/<election_id>/winner", rank = 2)]
fn get_winner_rejected(election_id: &str) -> Error {
    rejected(election_id, "view the winner")
}

#[post("/elections/<election_id>/reconcile")]
async fn reconcile_counters(
    _token: AuthToken<Admin>,
    election_id: Id,
    engine: &State<TallyEngine>,
) -> Result<Json<ReconcileReport>> {
    let corrected = engine.reconcile_counters(election_id).await?;
    Ok(Json(ReconcileReport {
        election: election_id.into(),
        corrected: corrected.into_iter().map(Into::into).collect(),
    }))
}

#[post("/elections/<election_id>/reconcile", rank = 2)]
fn reconcile_counters_rejected(election_id: &str) -> Error {
    rejected(election_id, "reconcile vote counters")
}
