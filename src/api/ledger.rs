use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        pagination::{Paginated, Pagination},
        vote::VoteListing,
    },
    auth::{Admin, AuthToken},
    mongodb::Id,
};
use crate::voting::casting::CastingService;

use super::rejected;

pub fn routes() -> Vec<Route> {
    routes![list_votes, list_votes_rejected]
}

/// Audit view of the ledger. Never reveals which candidate a vote was for.
#[get("/elections/<election_id>/votes")]
async fn list_votes(
    _token: AuthToken<Admin>,
    election_id: Id,
    pagination: Pagination,
    casting: &State<CastingService>,
) -> Result<Json<Paginated<VoteListing>>> {
    let page = casting.list_votes(election_id, pagination).await?;
    Ok(Json(page.map(VoteListing::from)))
}

#[get("/elections/<election_id>/votes", rank = 2)]
fn list_votes_rejected(election_id: &str) -> Error {
    rejected(election_id, "list votes")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{http::Status, local::asynchronous::Client, serde::json::Value};

    use super::*;
    use crate::api::testing::bearer;
    use crate::model::{auth::Rights, db::election::Election};
    use crate::store::MemoryStore;
    use crate::voting::fixtures::Fixture;

    #[backend_test]
    async fn listing_omits_choices(client: Client, store: Arc<MemoryStore>) {
        let fixture =
            Fixture::with_store(store, Election::ongoing_example(), &["A", "B"], 3).await;
        let mut cast = Vec::new();
        for voter in 0..3 {
            cast.push(fixture.cast(voter, voter % 2).await);
        }

        let response = client
            .get(format!(
                "/elections/{}/votes?page_num=1&page_size=2",
                fixture.election.id
            ))
            .header(bearer(&client, Id::new(), Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["total"], 3);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], cast[0].id.to_string());
        assert_eq!(items[1]["voter"], cast[1].voter.to_string());
        assert!(items.iter().all(|item| item.get("candidate").is_none()));
    }

    #[backend_test]
    async fn listing_is_admin_only(client: Client, store: Arc<MemoryStore>) {
        let fixture = Fixture::with_store(store, Election::ongoing_example(), &["A"], 1).await;

        let response = client
            .get(uri!(list_votes(fixture.election.id)))
            .header(bearer(&client, fixture.voters[0].id, Rights::Voter))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn listing_rejects_bad_pages(client: Client, store: Arc<MemoryStore>) {
        let fixture = Fixture::with_store(store, Election::ongoing_example(), &["A"], 1).await;

        let response = client
            .get(format!(
                "/elections/{}/votes?page_num=0",
                fixture.election.id
            ))
            .header(bearer(&client, Id::new(), Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }
}
