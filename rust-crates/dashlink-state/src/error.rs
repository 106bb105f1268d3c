use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
