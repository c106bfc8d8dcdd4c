use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqrtError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Requested {requested} workers, maximum is {max}")]
    TooManyWorkers { requested: usize, max: usize },

    #[error("Failed to allocate {len} floats aligned to {align} bytes")]
    Allocation { len: usize, align: usize },

    #[error("Buffer length mismatch: {values} values vs {output} outputs")]
    LengthMismatch { values: usize, output: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },
}
