// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use ethers_core::abi::{param_type::Reader, Token};
use ethers_core::utils::id;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::SelectorError;

/// Signature of the one-time initializer entry point that facets may expose.
///
/// It is never routed through the diamond, so it is left out of every cut.
pub const INIT_SIGNATURE: &str = "init(bytes)";

lazy_static! {
    /// Splits `name(params)` into the name and the raw parameter list.
    static ref SIGNATURE_RE: Regex =
        Regex::new(r"^\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*\((.*)\)\s*$").expect("signature regex parses");

    /// Elementary ABI types; sizes are checked separately.
    static ref ELEMENTARY_RE: Regex =
        Regex::new(r"^(address|bool|string|bytes([0-9]+)?|u?int([0-9]+)?)$").expect("type regex parses");

    /// A trailing `[]` or `[N]` array suffix.
    static ref ARRAY_SUFFIX_RE: Regex = Regex::new(r"\[[0-9]*\]$").expect("array regex parses");
}

/// Canonical textual signature of a function, e.g. `transfer(address,uint256)`.
///
/// Whitespace and parameter names are not allowed in the canonical form, and
/// tuples are written as `(a,b)` rather than `tuple(a,b)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionSignature(String);

impl FunctionSignature {
    /// Parse and canonicalize a signature.
    pub fn parse(signature: &str) -> Result<Self, SelectorError> {
        let invalid = |reason: String| SelectorError::InvalidSignature {
            signature: signature.to_owned(),
            reason,
        };

        let caps = SIGNATURE_RE
            .captures(signature)
            .ok_or_else(|| invalid("expected `name(type,...)`".to_owned()))?;

        let name = &caps[1];
        let params = split_params(&caps[2]).map_err(|e| invalid(e.to_owned()))?;

        let mut kinds = Vec::with_capacity(params.len());
        for param in params {
            let param = normalize_param(param);
            check_type(&param).map_err(invalid)?;
            let kind = Reader::read(&param)
                .map_err(|e| invalid(format!("unknown parameter type {param:?}: {e}")))?;
            kinds.push(kind.to_string());
        }

        Ok(Self(format!("{name}({})", kinds.join(","))))
    }

    /// The function name without the parameter list.
    pub fn name(&self) -> &str {
        self.0.split_once('(').map(|(n, _)| n).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn selector(&self) -> Selector {
        selector_of(self)
    }

    /// Calldata invoking this function with already tokenized arguments.
    pub fn encode_call(&self, args: &[Token]) -> Vec<u8> {
        let mut data = self.selector().0.to_vec();
        data.extend(ethers_core::abi::encode(args));
        data
    }
}

impl Display for FunctionSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for FunctionSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl FromStr for FunctionSignature {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FunctionSignature {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FunctionSignature> for String {
    fn from(value: FunctionSignature) -> Self {
        value.0
    }
}

impl AsRef<str> for FunctionSignature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The first 4 bytes of the Keccak-256 hash of a canonical function signature.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector(pub [u8; 4]);

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| SelectorError::InvalidSelector(s.to_owned()))?;
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| SelectorError::InvalidSelector(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}

impl From<[u8; 4]> for Selector {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}

impl From<Selector> for [u8; 4] {
    fn from(value: Selector) -> Self {
        value.0
    }
}

pub fn selector_of(signature: &FunctionSignature) -> Selector {
    Selector(id(signature.as_str()))
}

/// Parse a signature and compute its selector in one go.
pub fn selector(signature: &str) -> Result<Selector, SelectorError> {
    FunctionSignature::parse(signature).map(|s| s.selector())
}

/// Split a parameter list on the commas which are not nested inside a tuple.
fn split_params(raw: &str) -> Result<Vec<&str>, &'static str> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or("unbalanced parentheses in parameter list")?
            }
            ',' if depth == 0 => {
                params.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced parentheses in parameter list");
    }
    params.push(&raw[start..]);

    if params.iter().any(|p| p.trim().is_empty()) {
        return Err("empty parameter type");
    }

    Ok(params)
}

/// Reject anything that is not a well formed ABI type.
///
/// The ABI reader maps unknown names to `uint8` (to cope with enums), so typos
/// have to be caught here.
fn check_type(param: &str) -> Result<(), String> {
    let mut base = param;
    while let Some(m) = ARRAY_SUFFIX_RE.find(base) {
        if m.as_str() == "[0]" {
            return Err(format!("zero length array in {param:?}"));
        }
        base = &base[..m.start()];
    }

    if let Some(inner) = base.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        let fields = split_params(inner).map_err(|e| e.to_owned())?;
        if fields.is_empty() {
            return Err("empty tuple".to_owned());
        }
        return fields.into_iter().try_for_each(check_type);
    }

    let caps = ELEMENTARY_RE
        .captures(base)
        .ok_or_else(|| format!("unknown parameter type {param:?}"))?;

    if let Some(size) = caps.get(2) {
        match size.as_str().parse::<usize>() {
            Ok(n) if (1..=32).contains(&n) => {}
            _ => return Err(format!("invalid bytes size in {param:?}")),
        }
    }
    if let Some(bits) = caps.get(3) {
        match bits.as_str().parse::<usize>() {
            Ok(n) if n > 0 && n <= 256 && n % 8 == 0 => {}
            _ => return Err(format!("invalid integer size in {param:?}")),
        }
    }

    Ok(())
}

/// Drop whitespace and the optional `tuple` keyword in front of tuple types.
fn normalize_param(param: &str) -> String {
    let compact = param.split_whitespace().collect::<String>();
    compact.replace("tuple(", "(")
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::{selector, selector_of, FunctionSignature, Selector};
    use crate::arb::ArbSignature;

    #[test]
    fn known_selectors() {
        let cases = [
            ("transfer(address,uint256)", "0xa9059cbb"),
            ("supportsInterface(bytes4)", "0x01ffc9a7"),
            (
                "diamondCut((address,uint8,bytes4[])[],address,bytes)",
                "0x1f931c1c",
            ),
            ("facets()", "0x7a0ed627"),
            ("owner()", "0x8da5cb5b"),
            ("balanceOf(address)", "0x70a08231"),
            ("init()", "0xe1c7392a"),
        ];

        for (sig, expected) in cases {
            assert_eq!(selector(sig).unwrap().to_string(), expected, "{sig}");
        }
    }

    #[test]
    fn canonicalizes_whitespace_and_tuples() {
        let sig = FunctionSignature::parse(
            " diamondCut( tuple(address, uint8, bytes4[])[] , address, bytes ) ",
        )
        .unwrap();

        assert_eq!(
            sig.as_str(),
            "diamondCut((address,uint8,bytes4[])[],address,bytes)"
        );
        assert_eq!(sig.name(), "diamondCut");
        assert_eq!(sig.selector(), "0x1f931c1c".parse::<Selector>().unwrap());
    }

    #[test]
    fn rejects_malformed_signatures() {
        for sig in [
            "",
            "transfer",
            "transfer(address,)",
            "transfer(address to,uint256)",
            "transfer((address,uint256)",
            "1transfer(address)",
            "transfer(adress)",
            "transfer(uint7)",
            "transfer(bytes33)",
            "transfer(uint256[0])",
        ] {
            assert!(FunctionSignature::parse(sig).is_err(), "{sig:?} should fail");
        }
    }

    #[test]
    fn selector_text_roundtrip() {
        let s: Selector = "0xdeadbeef".parse().unwrap();
        assert_eq!(s.0, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(s.to_string(), "0xdeadbeef");

        assert!("0xdeadbe".parse::<Selector>().is_err());
        assert!("0xdeadbeefaa".parse::<Selector>().is_err());
        assert!("0xnothex!".parse::<Selector>().is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let sig = FunctionSignature::parse("owner()").unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"owner()\"");

        let s: Selector = serde_json::from_str("\"0x8da5cb5b\"").unwrap();
        assert_eq!(s, sig.selector());

        assert!(serde_json::from_str::<FunctionSignature>("\"owner\"").is_err());
    }

    #[quickcheck]
    fn prop_selector_is_deterministic(sig: ArbSignature) -> bool {
        let sig = sig.0;
        let reparsed = FunctionSignature::parse(sig.as_str()).unwrap();

        selector_of(&sig) == selector_of(&sig)
            && reparsed == sig
            && reparsed.selector() == sig.selector()
            && selector(sig.as_str()).unwrap() == sig.selector()
            && sig.selector().0 == ethers_core::utils::id(sig.as_str())
    }
}
