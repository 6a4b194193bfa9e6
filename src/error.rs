use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("snapshot already consumed for this run")]
    UnexpectedSnapshot,
    #[error("sync gate already initialized")]
    AlreadyInitialized,
    #[error("engine terminated")]
    Terminated,
    #[error("history sink is closed")]
    HistoryClosed,
    #[cfg(feature = "history")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[cfg(feature = "history")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl Error {
    /// Transport and decode failures end the run; everything else is a caller bug
    /// or a local I/O problem.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Malformed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
