use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The parts of a user account the voting core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub email: String,
    /// The department the user currently belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Id>,
}
