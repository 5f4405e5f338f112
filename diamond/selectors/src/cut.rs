// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::fmt::Display;

use ethers_core::abi::Token;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    all_selectors_of, excluding, ContractInterface, FunctionSignature, Selector, SelectorError,
};

/// Signature of the batch upgrade entry point on the cut router facet.
pub const DIAMOND_CUT_SIGNATURE: &str = "diamondCut((address,uint8,bytes4[])[],address,bytes)";

/// ERC-165 introspection, implemented by more than one standard facet.
pub const SUPPORTS_INTERFACE_SIGNATURE: &str = "supportsInterface(bytes4)";

/// Action applied to the selectors of a [FacetCut], encoded as `uint8` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FacetCutAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

impl Display for FacetCutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacetCutAction::Add => write!(f, "add"),
            FacetCutAction::Replace => write!(f, "replace"),
            FacetCutAction::Remove => write!(f, "remove"),
        }
    }
}

/// One entry of a diamond cut.
///
/// The constructors make sure that `Remove` always targets the zero address
/// while `Add` and `Replace` never do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFacetCut", into = "RawFacetCut")]
pub struct FacetCut {
    facet_address: Address,
    action: FacetCutAction,
    selectors: Vec<Selector>,
}

impl FacetCut {
    pub fn new(
        facet_address: Address,
        action: FacetCutAction,
        selectors: Vec<Selector>,
    ) -> Result<Self, SelectorError> {
        match action {
            FacetCutAction::Remove if !facet_address.is_zero() => {
                Err(SelectorError::NonZeroRemoveAddress(facet_address))
            }
            FacetCutAction::Add | FacetCutAction::Replace if facet_address.is_zero() => {
                Err(SelectorError::MissingFacetAddress(action))
            }
            _ => Ok(Self {
                facet_address,
                action,
                selectors,
            }),
        }
    }

    pub fn add(facet_address: Address, selectors: Vec<Selector>) -> Result<Self, SelectorError> {
        Self::new(facet_address, FacetCutAction::Add, selectors)
    }

    pub fn replace(
        facet_address: Address,
        selectors: Vec<Selector>,
    ) -> Result<Self, SelectorError> {
        Self::new(facet_address, FacetCutAction::Replace, selectors)
    }

    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            facet_address: Address::zero(),
            action: FacetCutAction::Remove,
            selectors,
        }
    }

    pub fn facet_address(&self) -> Address {
        self.facet_address
    }

    pub fn action(&self) -> FacetCutAction {
        self.action
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// ABI token of the `(address,uint8,bytes4[])` tuple.
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.facet_address),
            Token::Uint(U256::from(self.action as u8)),
            Token::Array(
                self.selectors
                    .iter()
                    .map(|s| Token::FixedBytes(s.0.to_vec()))
                    .collect(),
            ),
        ])
    }
}

/// The JSON shape used by deployment scripts.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFacetCut {
    facet_address: Address,
    action: FacetCutAction,
    function_selectors: Vec<Selector>,
}

impl TryFrom<RawFacetCut> for FacetCut {
    type Error = SelectorError;

    fn try_from(value: RawFacetCut) -> Result<Self, Self::Error> {
        FacetCut::new(value.facet_address, value.action, value.function_selectors)
    }
}

impl From<FacetCut> for RawFacetCut {
    fn from(value: FacetCut) -> Self {
        Self {
            facet_address: value.facet_address,
            action: value.action,
            function_selectors: value.selectors,
        }
    }
}

/// Signatures that several facets implement while only one of them may route.
///
/// A shared signature is left out of every facet's add cut except its owner's.
/// A shared signature without an owner is left out everywhere.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedSelectors {
    owners: BTreeMap<FunctionSignature, Option<String>>,
}

impl SharedSelectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// `supportsInterface(bytes4)` routed to the given facet.
    pub fn introspection(owner: impl Into<String>) -> Result<Self, SelectorError> {
        let sig = FunctionSignature::parse(SUPPORTS_INTERFACE_SIGNATURE)?;
        Ok(Self::new().declare(sig, Some(owner.into())))
    }

    pub fn declare(mut self, signature: FunctionSignature, owner: Option<String>) -> Self {
        self.owners.insert(signature, owner);
        self
    }

    pub fn is_shared(&self, signature: &FunctionSignature) -> bool {
        self.owners.contains_key(signature)
    }

    pub fn owner_of(&self, signature: &FunctionSignature) -> Option<&str> {
        self.owners.get(signature).and_then(|o| o.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FunctionSignature, Option<&str>)> {
        self.owners.iter().map(|(s, o)| (s, o.as_deref()))
    }

    /// Shared signatures the facet must not add.
    pub fn foreign_to(&self, facet_name: &str) -> Vec<FunctionSignature> {
        self.owners
            .iter()
            .filter(|(_, owner)| owner.as_deref() != Some(facet_name))
            .map(|(s, _)| s.clone())
            .collect()
    }
}

/// The `Add` cut registering every routable function of a freshly deployed facet.
///
/// The `init(bytes)` entry point and shared signatures owned by another facet are skipped.
pub fn build_add_cut(
    facet_name: &str,
    facet_address: Address,
    iface: &ContractInterface,
    shared: &SharedSelectors,
) -> Result<FacetCut, SelectorError> {
    let selectors = excluding(iface, &all_selectors_of(iface), &shared.foreign_to(facet_name));
    FacetCut::add(facet_address, selectors)
}

pub fn build_replace_cut(
    facet_address: Address,
    selectors: Vec<Selector>,
) -> Result<FacetCut, SelectorError> {
    FacetCut::replace(facet_address, selectors)
}

pub fn build_remove_cut(selectors: Vec<Selector>) -> FacetCut {
    FacetCut::remove(selectors)
}

#[cfg(test)]
mod tests {
    use ethers_core::abi::Token;
    use ethers_core::types::{Address, U256};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::arb::{ArbFacetAddress, ArbInterface, ArbSelector};
    use crate::{selector, SelectorError};

    fn loupe() -> ContractInterface {
        ContractInterface::from_signatures([
            "facets()",
            "facetFunctionSelectors(address)",
            "facetAddresses()",
            "facetAddress(bytes4)",
            "supportsInterface(bytes4)",
        ])
        .unwrap()
    }

    fn erc165_facet() -> ContractInterface {
        ContractInterface::from_signatures([
            "supportsInterface(bytes4)",
            "callMe(uint256)",
            "init(bytes)",
        ])
        .unwrap()
    }

    fn shared() -> SharedSelectors {
        SharedSelectors::introspection("DiamondLoupeFacet").unwrap()
    }

    #[test]
    fn owner_keeps_shared_selector() {
        let addr = Address::from_low_u64_be(1);
        let cut = build_add_cut("DiamondLoupeFacet", addr, &loupe(), &shared()).unwrap();

        assert_eq!(cut.action(), FacetCutAction::Add);
        assert_eq!(cut.facet_address(), addr);
        assert_eq!(cut.selectors().len(), 5);
        assert!(cut
            .selectors()
            .contains(&selector(SUPPORTS_INTERFACE_SIGNATURE).unwrap()));
    }

    #[test]
    fn building_twice_gives_the_same_cut() {
        let addr = Address::from_low_u64_be(9);
        let a = build_add_cut("Test1Facet", addr, &erc165_facet(), &shared()).unwrap();
        let b = build_add_cut("Test1Facet", addr, &erc165_facet(), &shared()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            ethers_core::abi::encode(&[a.to_token()]),
            ethers_core::abi::encode(&[b.to_token()])
        );
    }

    #[test]
    fn other_facets_drop_shared_selector_and_init() {
        let cut = build_add_cut(
            "FoobarFacet",
            Address::from_low_u64_be(2),
            &erc165_facet(),
            &shared(),
        )
        .unwrap();

        assert_eq!(cut.selectors(), &[selector("callMe(uint256)").unwrap()]);
    }

    #[test]
    fn unowned_shared_selector_is_dropped_everywhere() {
        let sig = FunctionSignature::parse(SUPPORTS_INTERFACE_SIGNATURE).unwrap();
        let shared = SharedSelectors::new().declare(sig, None);
        let cut = build_add_cut(
            "DiamondLoupeFacet",
            Address::from_low_u64_be(1),
            &loupe(),
            &shared,
        )
        .unwrap();
        assert_eq!(cut.selectors().len(), 4);
    }

    #[test]
    fn add_and_replace_need_an_address() {
        let s = vec![selector("owner()").unwrap()];
        assert_eq!(
            FacetCut::add(Address::zero(), s.clone()),
            Err(SelectorError::MissingFacetAddress(FacetCutAction::Add))
        );
        assert_eq!(
            build_replace_cut(Address::zero(), s.clone()),
            Err(SelectorError::MissingFacetAddress(FacetCutAction::Replace))
        );
        assert_eq!(build_remove_cut(s).facet_address(), Address::zero());
    }

    #[test]
    fn token_layout() {
        let s = selector("owner()").unwrap();
        let cut = FacetCut::replace(Address::from_low_u64_be(7), vec![s]).unwrap();

        assert_eq!(
            cut.to_token(),
            Token::Tuple(vec![
                Token::Address(Address::from_low_u64_be(7)),
                Token::Uint(U256::one()),
                Token::Array(vec![Token::FixedBytes(s.0.to_vec())]),
            ])
        );
    }

    #[test]
    fn json_shape() {
        let json = r#"{
            "facetAddress": "0x0000000000000000000000000000000000000000",
            "action": "Remove",
            "functionSelectors": ["0xdeadbeef"]
        }"#;
        let cut: FacetCut = serde_json::from_str(json).unwrap();
        assert_eq!(cut, FacetCut::remove(vec!["0xdeadbeef".parse().unwrap()]));

        let bad = json.replace(
            "0x0000000000000000000000000000000000000000",
            "0x0000000000000000000000000000000000000001",
        );
        assert!(serde_json::from_str::<FacetCut>(&bad).is_err());
    }

    #[quickcheck]
    fn prop_add_cut_without_sharing_covers_interface(iface: ArbInterface) -> bool {
        let iface = iface.0;
        let cut = build_add_cut(
            "AnyFacet",
            Address::from_low_u64_be(3),
            &iface,
            &SharedSelectors::default(),
        )
        .unwrap();
        cut.selectors() == all_selectors_of(&iface).as_slice()
    }

    #[quickcheck]
    fn prop_remove_only_targets_zero(addr: ArbFacetAddress, selectors: Vec<ArbSelector>) -> bool {
        let selectors = selectors.into_iter().map(|s| s.0).collect::<Vec<_>>();

        FacetCut::add(addr.0, selectors.clone()).is_ok()
            && FacetCut::replace(addr.0, selectors.clone()).is_ok()
            && FacetCut::new(addr.0, FacetCutAction::Remove, selectors.clone())
                == Err(SelectorError::NonZeroRemoveAddress(addr.0))
            && FacetCut::new(Address::zero(), FacetCutAction::Remove, selectors).is_ok()
    }
}
