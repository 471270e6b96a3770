use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("username already exists: {0}")]
    UsernameTaken(String),

    #[error("unknown session token: {0}")]
    UnknownToken(Uuid),

    #[error("cannot find username: {0}")]
    UnknownUsername(String),
}
