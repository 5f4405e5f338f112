// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Filtering selector lists by function signature.
//!
//! The order of the input list is always preserved, so cuts built from the
//! same interface are deterministic.

use std::collections::HashSet;

use crate::{selector_of, ContractInterface, FunctionSignature, Selector, INIT_SIGNATURE};

/// Selectors of every function in the interface except the `init(bytes)` entry point.
pub fn all_selectors_of(iface: &ContractInterface) -> Vec<Selector> {
    iface
        .iter()
        .filter(|f| f.as_str() != INIT_SIGNATURE)
        .map(selector_of)
        .collect()
}

/// Keep only the selectors which belong to one of the named functions of the interface.
///
/// Names that the interface does not declare match nothing.
pub fn restrict_to(
    iface: &ContractInterface,
    selectors: &[Selector],
    names: &[FunctionSignature],
) -> Vec<Selector> {
    let named = named_selectors(iface, names);
    selectors
        .iter()
        .filter(|s| named.contains(s))
        .copied()
        .collect()
}

/// Drop the selectors which belong to one of the named functions of the interface.
pub fn excluding(
    iface: &ContractInterface,
    selectors: &[Selector],
    names: &[FunctionSignature],
) -> Vec<Selector> {
    let named = named_selectors(iface, names);
    selectors
        .iter()
        .filter(|s| !named.contains(s))
        .copied()
        .collect()
}

/// Drop the selectors of the given signatures, without consulting any interface.
pub fn without_signatures(selectors: &[Selector], signatures: &[FunctionSignature]) -> Vec<Selector> {
    let dropped = signatures.iter().map(selector_of).collect::<HashSet<_>>();
    selectors
        .iter()
        .filter(|s| !dropped.contains(s))
        .copied()
        .collect()
}

fn named_selectors(iface: &ContractInterface, names: &[FunctionSignature]) -> HashSet<Selector> {
    names
        .iter()
        .filter(|n| iface.contains(n))
        .map(selector_of)
        .collect()
}
