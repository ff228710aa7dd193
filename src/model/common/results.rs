use crate::model::mongodb::Id;

/// One candidate's line in an election's results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub candidate: Id,
    pub name: String,
    pub total_votes: u64,
}

/// A candidate whose cached vote counter disagreed with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCorrection {
    pub candidate: Id,
    pub cached: u64,
    pub actual: u64,
}
