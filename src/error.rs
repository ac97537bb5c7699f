//! Error types for HallSonic

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HallSonicError {
    #[error("invalid source position - outside the simulation mesh")]
    SourceOutsideMesh,

    #[error("invalid receiver position - outside the simulation mesh")]
    ReceiverOutsideMesh,

    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("numerical instability detected at sample {index}")]
    NumericalInstability { index: usize },

    #[error("compute device error: {0}")]
    Device(String),

    #[error("resampling error: {0}")]
    Resample(String),
}

pub type Result<T> = std::result::Result<T, HallSonicError>;
