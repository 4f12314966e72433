use strum::Display;
use unsplash_stats_client as client;
use unsplash_stats_store as store;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no Unsplash access key is configured")]
    MissingAccessKey,
    #[error(transparent)]
    Api(#[from] client::Error),
    #[error("missing statistics for photo {photo_id}")]
    MissingStatistics { photo_id: String },
    #[error("photo listing returned an entry without an id")]
    MissingPhotoId,
    #[error("storage error: {0}")]
    Store(#[from] store::Error),
    #[error("storage task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// What went wrong, in the terms shown to the person running the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(to_string = "no API key configured")]
    NoApiKey,
    #[strum(to_string = "API error during collection")]
    Api,
    #[strum(to_string = "storage error")]
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingAccessKey | Error::Api(client::Error::MissingAccessKey | client::Error::InvalidAccessKey) => {
                ErrorKind::NoApiKey
            }
            Error::Api(_) | Error::MissingStatistics { .. } | Error::MissingPhotoId => ErrorKind::Api,
            Error::Store(_) | Error::Worker(_) => ErrorKind::Storage,
        }
    }
}
