use crate::model::common::results::ResultRow;

/// The winner set of an election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    /// No candidate received a vote, or there are no candidates at all.
    Undetermined,
    /// Exactly one candidate holds the maximum vote count.
    Single(ResultRow),
    /// Several candidates share the maximum vote count. Never resolved
    /// arbitrarily; all of them are co-winners.
    Tie(Vec<ResultRow>),
}

/// Determine the winner set from per-candidate results.
///
/// All candidates with the maximum number of votes win. A maximum of zero
/// means nobody voted, which is reported as [`Winner::Undetermined`] rather
/// than every candidate tying at zero.
pub fn get_winner(results: &[ResultRow]) -> Winner {
    let max_votes = match results.iter().map(|r| r.total_votes).max() {
        None | Some(0) => return Winner::Undetermined,
        Some(max_votes) => max_votes,
    };

    let mut winners: Vec<ResultRow> = results
        .iter()
        .filter(|r| r.total_votes == max_votes)
        .cloned()
        .collect();
    if winners.len() == 1 {
        Winner::Single(winners.remove(0))
    } else {
        Winner::Tie(winners)
    }
}
