use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid resource key: {0}")]
    InvalidKey(String),

    #[error("resource has no name")]
    UnnamedObject,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
