// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use ethers_core::types::Address;
use thiserror::Error;

use crate::FacetCutAction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid function signature {signature:?}: {reason}")]
    InvalidSignature { signature: String, reason: String },
    #[error("invalid selector {0:?}: expected 0x followed by 8 hex digits")]
    InvalidSelector(String),
    #[error("{0} cut requires a non-zero facet address")]
    MissingFacetAddress(FacetCutAction),
    #[error("remove cut must use the zero facet address, got {0:#x}")]
    NonZeroRemoveAddress(Address),
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}
