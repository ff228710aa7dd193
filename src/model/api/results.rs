use serde::{Deserialize, Serialize};

use crate::model::{
    api::ApiId,
    common::{
        election::ElectionStatus,
        results::{CounterCorrection, ResultRow},
    },
};
use crate::voting::winner::Winner;

/// API-friendly representation of one candidate's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRowDesc {
    pub candidate: ApiId,
    pub name: String,
    pub total_votes: u64,
}

impl From<ResultRow> for ResultRowDesc {
    fn from(row: ResultRow) -> Self {
        Self {
            candidate: row.candidate.into(),
            name: row.name,
            total_votes: row.total_votes,
        }
    }
}

/// Results for a whole election, one row per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ApiId,
    pub status: ElectionStatus,
    pub results: Vec<ResultRowDesc>,
}

/// How the winner question was resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Winner,
    Tie,
    Undetermined,
}

/// The winner set of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerDesc {
    pub election: ApiId,
    pub outcome: Outcome,
    pub winners: Vec<ResultRowDesc>,
    pub max_votes: u64,
}

impl WinnerDesc {
    pub fn new(election: ApiId, winner: Winner) -> Self {
        match winner {
            Winner::Undetermined => Self {
                election,
                outcome: Outcome::Undetermined,
                winners: Vec::new(),
                max_votes: 0,
            },
            Winner::Single(row) => Self {
                election,
                outcome: Outcome::Winner,
                max_votes: row.total_votes,
                winners: vec![row.into()],
            },
            Winner::Tie(rows) => Self {
                election,
                outcome: Outcome::Tie,
                max_votes: rows.first().map(|r| r.total_votes).unwrap_or(0),
                winners: rows.into_iter().map(Into::into).collect(),
            },
        }
    }
}

/// A drifted candidate counter, and the ledger value it was reset to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterCorrectionDesc {
    pub candidate: ApiId,
    pub cached: u64,
    pub actual: u64,
}

impl From<CounterCorrection> for CounterCorrectionDesc {
    fn from(c: CounterCorrection) -> Self {
        Self {
            candidate: c.candidate.into(),
            cached: c.cached,
            actual: c.actual,
        }
    }
}

/// Outcome of a counter reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub election: ApiId,
    pub corrected: Vec<CounterCorrectionDesc>,
}
