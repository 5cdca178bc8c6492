#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sample store is empty -- no closed calls to average")]
    NoSamples,

    #[error("unknown sort key '{0}' (expected calls, time, avg_time, mem or avg_mem)")]
    UnknownSortKey(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidConfig { key: &'static str, value: String },

    #[error("sample spill failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
