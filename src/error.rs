use std::io::Cursor;

use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::{self, Responder},
    serde::json::serde_json,
    Request, Response,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    #[error("Already voted in election {election}")]
    DuplicateVote { election: String },
    #[error("Election {election} is {status} and not accepting votes")]
    ElectionNotVotable { election: String, status: String },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_reference(what: impl Into<String>) -> Self {
        Self::InvalidReference(what.into())
    }

    pub fn storage(what: impl Into<String>) -> Self {
        Self::Storage(what.into())
    }

    /// The stable, machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidReference(_) => ErrorKind::InvalidReference,
            Self::DuplicateVote { .. } => ErrorKind::DuplicateVote,
            Self::ElectionNotVotable { .. } => ErrorKind::ElectionNotVotable,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Db(_) | Self::Storage(_) => ErrorKind::StorageError,
        }
    }

    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::InvalidReference => Status::UnprocessableEntity,
            ErrorKind::DuplicateVote => Status::Conflict,
            ErrorKind::ElectionNotVotable => Status::Forbidden,
            ErrorKind::Unauthorized => Status::Unauthorized,
            ErrorKind::BadRequest => Status::BadRequest,
            ErrorKind::StorageError => Status::InternalServerError,
        }
    }
}

/// Error kinds as seen by API consumers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidReference,
    DuplicateVote,
    ElectionNotVotable,
    Unauthorized,
    BadRequest,
    StorageError,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = RequestId::of(req);
        let status = self.status();
        let message = match self.kind() {
            // Do not leak infrastructure details to clients.
            ErrorKind::StorageError => {
                error!("req{id} failed: {self}");
                "Internal storage failure".to_string()
            }
            _ => {
                warn!("req{id} rejected: {self}");
                self.to_string()
            }
        };
        let body = ErrorBody {
            kind: self.kind(),
            message,
        };
        let json = serde_json::to_string(&body).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        let duplicate = Error::DuplicateVote {
            election: "e".to_string(),
        };
        let closed = Error::ElectionNotVotable {
            election: "e".to_string(),
            status: "completed".to_string(),
        };
        let invalid = Error::invalid_reference("candidate");

        assert_eq!(duplicate.status(), Status::Conflict);
        assert_eq!(closed.status(), Status::Forbidden);
        assert_eq!(invalid.status(), Status::UnprocessableEntity);
        assert_eq!(Error::storage("down").kind(), ErrorKind::StorageError);
        assert_eq!(
            Error::Unauthorized("no token".to_string()).status(),
            Status::Unauthorized
        );
    }
}
