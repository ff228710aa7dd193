use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    candidate::Candidate, election::Election, result::ElectionResult, user::User, vote::Vote,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for ElectionResult {
    const NAME: &'static str = "results";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique `(election, voter)` index on votes is what makes a second vote
/// by the same voter physically impossible, however the requests interleave.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Vote collection.
    let one_vote_per_voter = IndexModel::builder()
        .keys(doc! {"election": 1, "voter": 1})
        .options(unique.clone())
        .build();
    let votes_by_time = IndexModel::builder()
        .keys(doc! {"election": 1, "createdAt": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([one_vote_per_voter, votes_by_time], None)
        .await?;

    // Result collection.
    let one_row_per_candidate = IndexModel::builder()
        .keys(doc! {"election": 1, "candidate": 1})
        .options(unique)
        .build();
    Coll::<ElectionResult>::from_db(db)
        .create_index(one_row_per_candidate, None)
        .await?;

    // Candidate collection.
    let candidates_by_election = IndexModel::builder()
        .keys(doc! {"election": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidates_by_election, None)
        .await?;

    Ok(())
}
