// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Calldata and return values of the diamond loupe functions.

use ethers_core::abi::{decode, encode, ParamType, Token};
use ethers_core::types::Address;
use ethers_core::utils::id;

use crate::{Selector, SelectorError};

pub const FACETS: &str = "facets()";
pub const FACET_FUNCTION_SELECTORS: &str = "facetFunctionSelectors(address)";
pub const FACET_ADDRESSES: &str = "facetAddresses()";
pub const FACET_ADDRESS: &str = "facetAddress(bytes4)";

/// A facet as reported by `facets()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Facet {
    pub address: Address,
    pub selectors: Vec<Selector>,
}

impl Facet {
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.address),
            selectors_token(&self.selectors),
        ])
    }
}

pub fn facet_address_call(selector: Selector) -> Vec<u8> {
    call(FACET_ADDRESS, &[Token::FixedBytes(selector.0.to_vec())])
}

pub fn facets_call() -> Vec<u8> {
    call(FACETS, &[])
}

pub fn facet_function_selectors_call(facet: Address) -> Vec<u8> {
    call(FACET_FUNCTION_SELECTORS, &[Token::Address(facet)])
}

pub fn facet_addresses_call() -> Vec<u8> {
    call(FACET_ADDRESSES, &[])
}

pub fn decode_facet_address(data: &[u8]) -> Result<Address, SelectorError> {
    let mut tokens = decode_as("facet address", &[ParamType::Address], data)?;
    tokens
        .pop()
        .and_then(Token::into_address)
        .ok_or_else(|| unexpected("facet address"))
}

pub fn decode_facets(data: &[u8]) -> Result<Vec<Facet>, SelectorError> {
    let kind = ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Address,
        selectors_kind(),
    ])));
    let mut tokens = decode_as("facets", &[kind], data)?;
    let facets = tokens
        .pop()
        .and_then(Token::into_array)
        .ok_or_else(|| unexpected("facets"))?;

    facets
        .into_iter()
        .map(|facet| {
            let mut fields = facet.into_tuple().ok_or_else(|| unexpected("facets"))?;
            let selectors = fields.pop().ok_or_else(|| unexpected("facets"))?;
            let address = fields
                .pop()
                .and_then(Token::into_address)
                .ok_or_else(|| unexpected("facets"))?;
            Ok(Facet {
                address,
                selectors: selectors_from_token(selectors)?,
            })
        })
        .collect()
}

pub fn decode_facet_function_selectors(data: &[u8]) -> Result<Vec<Selector>, SelectorError> {
    let mut tokens = decode_as("facet function selectors", &[selectors_kind()], data)?;
    let token = tokens
        .pop()
        .ok_or_else(|| unexpected("facet function selectors"))?;
    selectors_from_token(token)
}

pub fn decode_facet_addresses(data: &[u8]) -> Result<Vec<Address>, SelectorError> {
    let kind = ParamType::Array(Box::new(ParamType::Address));
    let mut tokens = decode_as("facet addresses", &[kind], data)?;
    tokens
        .pop()
        .and_then(Token::into_array)
        .ok_or_else(|| unexpected("facet addresses"))?
        .into_iter()
        .map(|t| t.into_address().ok_or_else(|| unexpected("facet addresses")))
        .collect()
}

/// Return value of `facetAddress(bytes4)`.
pub fn encode_facet_address(address: Address) -> Vec<u8> {
    encode(&[Token::Address(address)])
}

/// Return value of `facets()`.
pub fn encode_facets(facets: &[Facet]) -> Vec<u8> {
    encode(&[Token::Array(facets.iter().map(Facet::to_token).collect())])
}

/// Return value of `facetFunctionSelectors(address)`.
pub fn encode_facet_function_selectors(selectors: &[Selector]) -> Vec<u8> {
    encode(&[selectors_token(selectors)])
}

/// Return value of `facetAddresses()`.
pub fn encode_facet_addresses(addresses: &[Address]) -> Vec<u8> {
    encode(&[Token::Array(
        addresses.iter().map(|a| Token::Address(*a)).collect(),
    )])
}

/// Index of the facet with the given address in a `facets()` listing.
pub fn find_facet_position(address: Address, facets: &[Facet]) -> Option<usize> {
    facets.iter().position(|f| f.address == address)
}

fn call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data
}

fn selectors_kind() -> ParamType {
    ParamType::Array(Box::new(ParamType::FixedBytes(4)))
}

fn selectors_token(selectors: &[Selector]) -> Token {
    Token::Array(
        selectors
            .iter()
            .map(|s| Token::FixedBytes(s.0.to_vec()))
            .collect(),
    )
}

fn selectors_from_token(token: Token) -> Result<Vec<Selector>, SelectorError> {
    token
        .into_array()
        .ok_or_else(|| unexpected("selectors"))?
        .into_iter()
        .map(|t| {
            let bytes = t.into_fixed_bytes().ok_or_else(|| unexpected("selectors"))?;
            let bytes: [u8; 4] = bytes.try_into().map_err(|_| unexpected("selectors"))?;
            Ok(Selector(bytes))
        })
        .collect()
}

fn decode_as(
    what: &'static str,
    kinds: &[ParamType],
    data: &[u8],
) -> Result<Vec<Token>, SelectorError> {
    decode(kinds, data).map_err(|e| SelectorError::Decode {
        what,
        reason: e.to_string(),
    })
}

fn unexpected(what: &'static str) -> SelectorError {
    SelectorError::Decode {
        what,
        reason: "unexpected token shape".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::Address;

    use super::*;
    use crate::selector;

    #[test]
    fn call_prefixes() {
        assert_eq!(hex::encode(&facets_call()), "7a0ed627");
        assert_eq!(hex::encode(&facet_addresses_call()), "52ef6b2c");
        assert_eq!(
            hex::encode(&facet_address_call(selector("owner()").unwrap())[..4]),
            "cdffacc6"
        );
        assert_eq!(
            hex::encode(&facet_function_selectors_call(Address::zero())[..4]),
            "adfca15e"
        );
    }

    #[test]
    fn decode_facets_listing() {
        let facets = vec![
            Facet {
                address: Address::from_low_u64_be(10),
                selectors: vec![selector("diamondCut((address,uint8,bytes4[])[],address,bytes)").unwrap()],
            },
            Facet {
                address: Address::from_low_u64_be(11),
                selectors: vec![selector("owner()").unwrap(), selector("facets()").unwrap()],
            },
        ];
        let decoded = decode_facets(&encode_facets(&facets)).unwrap();
        assert_eq!(decoded, facets);

        assert_eq!(find_facet_position(Address::from_low_u64_be(11), &decoded), Some(1));
        assert_eq!(find_facet_position(Address::from_low_u64_be(12), &decoded), None);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(decode_facet_address(&[1, 2, 3]).is_err());
        assert!(decode_facets(&[]).is_err());
    }
}
