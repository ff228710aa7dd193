use rocket::{Catcher, Request, Route};

use crate::error::Error;
use crate::model::mongodb::Id;

mod ledger;
mod results;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(ledger::routes());
    routes.extend(results::routes());
    routes
}

/// Catchers that keep failures outside of route handlers in the same JSON
/// shape as handler errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, internal_error]
}

#[catch(400)]
fn bad_request(req: &Request<'_>) -> Error {
    Error::BadRequest(format!("Malformed request to {}", req.uri()))
}

#[catch(401)]
fn unauthorized(_req: &Request<'_>) -> Error {
    Error::Unauthorized("A valid session is required".to_string())
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Error {
    Error::not_found(format!("Route {} {}", req.method(), req.uri()))
}

#[catch(422)]
fn unprocessable(_req: &Request<'_>) -> Error {
    Error::invalid_reference("Malformed identifier or request body")
}

#[catch(500)]
fn internal_error(_req: &Request<'_>) -> Error {
    Error::storage("Unhandled internal error")
}

/// The answer for a request that no authorized route accepted. Authorized
/// routes also forward on malformed IDs, so those are reported as such;
/// anything else lacked a session with the right role.
fn rejected(election_id: &str, action: &str) -> Error {
    match election_id.parse::<Id>() {
        Ok(_) => Error::Unauthorized(format!("Sign in with the right role to {action}")),
        Err(_) => Error::invalid_reference(format!("Malformed election ID '{election_id}'")),
    }
}
