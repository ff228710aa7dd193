use mongodb::{
    bson::{doc, Bson, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOptions, SessionOptions, UpdateOptions},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    db::{
        candidate::Candidate, election::Election, result::ElectionResult, user::User, vote::Vote,
    },
    mongodb::{errors::is_duplicate_key_error, Coll, Id},
};

use super::{ReferenceData, ResultStore, Tally, VoteLedger};

/// How many times a transaction is attempted before a transient failure is
/// reported to the caller.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// MongoDB-backed storage. Requires a replica set, since vote appends and
/// tally writes run in multi-document transactions.
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    users: Coll<User>,
    votes: Coll<Vote>,
    results: Coll<ElectionResult>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            users: Coll::from_db(db),
            votes: Coll::from_db(db),
            results: Coll::from_db(db),
        }
    }

    async fn try_append(&self, vote: &Vote) -> Result<Id> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        if let Err(e) = self
            .votes
            .insert_one_with_session(vote, None, &mut session)
            .await
        {
            session.abort_transaction().await.ok();
            return Err(translate_append_error(e, vote));
        }

        let bump = doc! { "$inc": { "votes": 1_i64 } };
        let updated = self
            .candidates
            .update_one_with_session(vote.candidate.as_doc(), bump, None, &mut session)
            .await?;
        if updated.matched_count != 1 {
            session.abort_transaction().await.ok();
            return Err(Error::not_found(format!(
                "Candidate with ID '{}'",
                vote.candidate
            )));
        }

        commit(&mut session)
            .await
            .map_err(|e| translate_append_error(e, vote))?;
        Ok(vote.id)
    }

    async fn try_replace_results(
        &self,
        election: Id,
        totals: &Tally,
    ) -> Result<Vec<ElectionResult>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let kept: Vec<Bson> = totals.keys().map(|c| Bson::from(*c)).collect();
        let stale = doc! {
            "election": election,
            "candidate": { "$nin": kept },
        };
        self.results
            .delete_many_with_session(stale, None, &mut session)
            .await?;

        let upsert = UpdateOptions::builder().upsert(true).build();
        for (candidate, total_votes) in totals {
            let key = doc! { "election": election, "candidate": *candidate };
            let update = doc! { "$set": { "total_votes": *total_votes as i64 } };
            self.results
                .update_one_with_session(key, update, upsert.clone(), &mut session)
                .await?;
        }

        let sorted = FindOptions::builder().sort(doc! {"candidate": 1}).build();
        let mut cursor = self
            .results
            .find_with_session(doc! {"election": election}, sorted, &mut session)
            .await?;
        let mut rows = Vec::with_capacity(totals.len());
        while let Some(row) = cursor.next(&mut session).await {
            rows.push(row?);
        }
        drop(cursor);

        commit(&mut session).await?;
        Ok(rows)
    }

    async fn try_set_candidate_counters(&self, counters: &Tally) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        for (candidate, votes) in counters {
            let update = doc! { "$set": { "votes": *votes as i64 } };
            self.candidates
                .update_one_with_session(candidate.as_doc(), update, None, &mut session)
                .await?;
        }
        commit(&mut session).await?;
        Ok(())
    }
}

/// Map a duplicate key violation on the vote collection to `DuplicateVote`.
fn translate_append_error(err: DbError, vote: &Vote) -> Error {
    if is_duplicate_key_error(&err) {
        Error::DuplicateVote {
            election: vote.election.to_string(),
        }
    } else {
        err.into()
    }
}

/// Is this a failure after which the whole transaction may safely be retried?
fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

/// Commit, retrying while the server reports that the outcome is unknown.
/// Committing is idempotent, so a retry never applies the writes twice.
async fn commit(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e)
                if attempt < MAX_TRANSACTION_ATTEMPTS
                    && e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) =>
            {
                debug!("Transaction commit result unknown, retrying: {e}");
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Run a transactional operation, retrying it on transient transaction errors
/// such as write conflicts between concurrent appends.
macro_rules! retry_transient {
    ($op:expr) => {{
        let mut attempt = 1;
        loop {
            match $op.await {
                Err(ref e) if attempt < MAX_TRANSACTION_ATTEMPTS && is_transient(e) => {
                    debug!("Transient transaction failure, retrying: {e}");
                    attempt += 1;
                }
                other => break other,
            }
        }
    }};
}

#[rocket::async_trait]
impl ReferenceData for MongoStore {
    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self
            .elections
            .find(None, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>> {
        let sorted = FindOptions::builder().sort(doc! {"_id": 1}).build();
        Ok(self
            .candidates
            .find(doc! {"election": election}, sorted)
            .await?
            .try_collect()
            .await?)
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.users.find_one(id.as_doc(), None).await?)
    }
}

#[rocket::async_trait]
impl VoteLedger for MongoStore {
    async fn has_voted(&self, election: Id, voter: Id) -> Result<bool> {
        let filter = doc! { "election": election, "voter": voter };
        Ok(self.votes.find_one(filter, None).await?.is_some())
    }

    async fn append(&self, vote: &Vote) -> Result<Id> {
        retry_transient!(self.try_append(vote))
    }

    async fn list_by_election(
        &self,
        election: Id,
        page: Option<Pagination>,
    ) -> Result<Vec<Vote>> {
        let mut options = FindOptions::builder()
            .sort(doc! {"createdAt": 1, "_id": 1})
            .build();
        if let Some(page) = page {
            options.skip = Some(page.skip());
            options.limit = Some(page.page_size() as i64);
        }
        Ok(self
            .votes
            .find(doc! {"election": election}, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn count_by_election(&self, election: Id) -> Result<u64> {
        Ok(self
            .votes
            .count_documents(doc! {"election": election}, None)
            .await?)
    }

    async fn tally(&self, election: Id) -> Result<Tally> {
        // Read the whole ledger for this election from one snapshot.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let pipeline = [
            doc! { "$match": { "election": election } },
            doc! { "$group": { "_id": "$candidate", "total_votes": { "$sum": 1 } } },
        ];
        let mut cursor = self
            .votes
            .aggregate_with_session(pipeline, None, &mut session)
            .await?;
        let mut tally = Tally::new();
        while let Some(group) = cursor.next(&mut session).await {
            let (candidate, count) = parse_group(group?)?;
            tally.insert(candidate, count);
        }
        Ok(tally)
    }

    async fn set_candidate_counters(&self, counters: &Tally) -> Result<()> {
        retry_transient!(self.try_set_candidate_counters(counters))
    }
}

/// Decode one `$group` output document.
fn parse_group(group: Document) -> Result<(Id, u64)> {
    let candidate = group
        .get_object_id("_id")
        .map_err(|e| Error::storage(format!("Malformed candidate reference in ledger: {e}")))?;
    let count = match group.get("total_votes") {
        Some(Bson::Int32(n)) => u64::try_from(*n).ok(),
        Some(Bson::Int64(n)) => u64::try_from(*n).ok(),
        _ => None,
    }
    .ok_or_else(|| Error::storage(format!("Malformed vote count for candidate {candidate}")))?;
    Ok((candidate.into(), count))
}

#[rocket::async_trait]
impl ResultStore for MongoStore {
    async fn replace_results(&self, election: Id, totals: &Tally) -> Result<Vec<ElectionResult>> {
        retry_transient!(self.try_replace_results(election, totals))
    }

    async fn results(&self, election: Id) -> Result<Vec<ElectionResult>> {
        let sorted = FindOptions::builder().sort(doc! {"candidate": 1}).build();
        Ok(self
            .results
            .find(doc! {"election": election}, sorted)
            .await?
            .try_collect()
            .await?)
    }
}
