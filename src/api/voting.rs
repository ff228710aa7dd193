use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::vote::{CastVoteRequest, VoteReceipt, VotedStatus},
    auth::{AuthToken, Voter},
    mongodb::Id,
};
use crate::voting::casting::CastingService;

use super::rejected;

pub fn routes() -> Vec<Route> {
    routes![
        cast_vote,
        cast_vote_rejected,
        has_voted,
        has_voted_rejected,
    ]
}

#[post("/votes", data = "<request>")]
async fn cast_vote(
    token: AuthToken<Voter>,
    request: Json<CastVoteRequest>,
    casting: &State<CastingService>,
) -> Result<(Status, Json<VoteReceipt>)> {
    let request = request.into_inner();
    let vote = casting
        .cast_vote(token.id(), *request.election, *request.candidate)
        .await?;
    Ok((Status::Created, Json(vote.into())))
}

#[post("/votes", rank = 2)]
fn cast_vote_rejected() -> Error {
    Error::Unauthorized("Sign in as a voter to cast a vote".to_string())
}

#[get("/elections/<election_id>/voted")]
async fn has_voted(
    token: AuthToken<Voter>,
    election_id: Id,
    casting: &State<CastingService>,
) -> Result<Json<VotedStatus>> {
    let has_voted = casting.has_voted(token.id(), election_id).await?;
    Ok(Json(VotedStatus {
        election: election_id.into(),
        has_voted,
    }))
}

#[get("/elections/<election_id>/voted", rank = 2)]
fn has_voted_rejected(election_id: &str) -> Error {
    rejected(election_id, "check voting status")
}
