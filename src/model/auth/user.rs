use serde::{Deserialize, Serialize};

/// The role claim carried by a session token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rights {
    Voter,
    Admin,
    Candidate,
}

/// A kind of caller that a route can require.
pub trait Role {
    /// Can a caller holding `rights` act in this role?
    fn admits(rights: Rights) -> bool;
}

/// Marker for callers allowed to cast votes.
pub struct Voter;

impl Role for Voter {
    fn admits(rights: Rights) -> bool {
        rights == Rights::Voter
    }
}

/// Marker for callers allowed to tally and audit.
pub struct Admin;

impl Role for Admin {
    fn admits(rights: Rights) -> bool {
        rights == Rights::Admin
    }
}

/// Marker for any signed-in caller.
pub struct Anyone;

impl Role for Anyone {
    fn admits(_rights: Rights) -> bool {
        true
    }
}
