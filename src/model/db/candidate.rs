use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A candidate standing in exactly one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    pub election: Id,
    pub created_by: Id,
    /// Denormalized vote counter. Maintained alongside the ledger as a
    /// convenience cache and reconcilable against it; never authoritative.
    #[serde(default)]
    pub votes: u64,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidate {
        pub fn example(name: &str, election: Id) -> Self {
            Self {
                id: Id::new(),
                name: name.to_string(),
                image_url: format!("https://img.example/{}.png", name.to_lowercase()),
                election,
                created_by: Id::new(),
                votes: 0,
            }
        }
    }
}
