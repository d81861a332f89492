//! Core error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("channel address {address} is beyond {universes} universes")]
    OutOfRange { address: u32, universes: usize },

    #[error("range of {len} channels at address {address} crosses a universe boundary")]
    SpansBoundary { address: u32, len: usize },
}

pub type AddressResult<T> = Result<T, AddressError>;
