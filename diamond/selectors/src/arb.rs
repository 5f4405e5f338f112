// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use ethers_core::types::Address;
use quickcheck::{Arbitrary, Gen};

use crate::{ContractInterface, FunctionSignature, Selector, INIT_SIGNATURE};

const NAMES: [&str; 10] = [
    "transfer",
    "approve",
    "owner",
    "callMe",
    "removeMe",
    "supportsInterface",
    "mint",
    "burn",
    "setValue",
    "facets",
];

const TYPES: [&str; 9] = [
    "address",
    "uint256",
    "uint8",
    "bool",
    "bytes",
    "bytes4",
    "string",
    "bytes32[]",
    "(address,uint8,bytes4[])[]",
];

#[derive(Debug, Clone)]
pub struct ArbSignature(pub FunctionSignature);

#[derive(Debug, Clone)]
pub struct ArbInterface(pub ContractInterface);

#[derive(Debug, Clone)]
pub struct ArbSelector(pub Selector);

#[derive(Debug, Clone)]
pub struct ArbFacetAddress(pub Address);

impl Arbitrary for ArbSignature {
    fn arbitrary(g: &mut Gen) -> Self {
        let name = g.choose(&NAMES).unwrap();
        let param_count = usize::arbitrary(g) % 4;
        let params = (0..param_count)
            .map(|_| *g.choose(&TYPES).unwrap())
            .collect::<Vec<_>>();

        let sig = FunctionSignature::parse(&format!("{name}({})", params.join(","))).unwrap();
        Self(sig)
    }
}

impl Arbitrary for ArbInterface {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = usize::arbitrary(g) % 12;
        let mut functions = (0..count)
            .map(|_| ArbSignature::arbitrary(g).0)
            .collect::<Vec<_>>();

        // Facets often carry an initializer which must never be routed.
        if bool::arbitrary(g) {
            let at = usize::arbitrary(g) % (functions.len() + 1);
            functions.insert(at, FunctionSignature::parse(INIT_SIGNATURE).unwrap());
        }

        Self(ContractInterface::new(functions))
    }
}

impl Arbitrary for ArbSelector {
    fn arbitrary(g: &mut Gen) -> Self {
        Self(Selector(std::array::from_fn(|_| u8::arbitrary(g))))
    }
}

impl Arbitrary for ArbFacetAddress {
    fn arbitrary(g: &mut Gen) -> Self {
        // Never the zero address, which is reserved for removals.
        Self(Address::from_low_u64_be(u64::arbitrary(g).saturating_add(1)))
    }
}
