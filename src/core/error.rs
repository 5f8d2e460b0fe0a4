use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid partitioning: {0}")]
    InvalidPartitioning(String),
    #[error("invalid range: end {end} precedes begin {begin}")]
    InvalidRange { begin: i64, end: i64 },
    #[error("invalid frequency: {0} (must be > 0)")]
    InvalidFrequency(i64),
    #[error("empty clock: first tick {first_tick} is after end {end}")]
    EmptyClock { first_tick: i64, end: i64 },
    #[error("subtract without add: {0}")]
    SubtractWithoutAdd(&'static str),
    #[error("summarizer worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
