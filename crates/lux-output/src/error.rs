//! Output error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("invalid universe index: {0}")]
    InvalidUniverse(usize),

    #[error("unknown output plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin {plugin} has no output line {line}")]
    InvalidLine { plugin: String, line: usize },

    #[error("channel {channel} out of range on output line {line}")]
    ChannelOutOfRange { line: usize, channel: usize },
}

pub type OutputResult<T> = Result<T, OutputError>;
