use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read trace {}: {source}", path.display())]
    TraceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid trace data in {}:{line}: {reason}", path.display())]
    InvalidTrace {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{0}")]
    Profiler(#[from] hookprof_runtime::Error),

    #[error("failed to encode rows: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
