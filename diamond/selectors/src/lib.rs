// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Function selectors, selector set algebra and facet cuts for
//! [EIP-2535](https://eips.ethereum.org/EIPS/eip-2535) diamonds.
//!
//! Everything in this crate is pure: building a cut never touches a chain.

mod algebra;
mod cut;
mod error;
mod interface;
pub mod loupe;
mod signature;

#[cfg(feature = "arb")]
pub mod arb;

pub use algebra::{all_selectors_of, excluding, restrict_to, without_signatures};
pub use cut::{
    build_add_cut, build_remove_cut, build_replace_cut, FacetCut, FacetCutAction,
    SharedSelectors, DIAMOND_CUT_SIGNATURE, SUPPORTS_INTERFACE_SIGNATURE,
};
pub use error::SelectorError;
pub use interface::{AbiItem, AbiParam, ContractInterface};
pub use signature::{selector, selector_of, FunctionSignature, Selector, INIT_SIGNATURE};
