//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("scheduler thread could not be spawned: {0}")]
    ThreadSpawn(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
