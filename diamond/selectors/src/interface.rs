// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashSet;

use serde::{de, Deserialize, Deserializer};

use crate::{selector_of, FunctionSignature, Selector, SelectorError};

/// The ordered list of function signatures a contract exposes.
///
/// Duplicates are dropped, keeping the first occurrence, so every signature
/// (and thus every selector, barring a hash collision) appears once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractInterface {
    functions: Vec<FunctionSignature>,
}

impl ContractInterface {
    pub fn new(functions: impl IntoIterator<Item = FunctionSignature>) -> Self {
        let mut seen = HashSet::new();
        let functions = functions
            .into_iter()
            .filter(|f| seen.insert(f.clone()))
            .collect();
        Self { functions }
    }

    pub fn from_signatures<I, S>(signatures: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let functions = signatures
            .into_iter()
            .map(|s| FunctionSignature::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(functions))
    }

    /// Collect the function signatures of ABI items, in declaration order, including overloads.
    pub fn from_abi_items(items: &[AbiItem]) -> Result<Self, SelectorError> {
        let functions = items
            .iter()
            .filter(|item| item.kind == "function")
            .map(|item| {
                let kinds = item.inputs.iter().map(AbiParam::canonical_type).collect::<Vec<_>>();
                FunctionSignature::parse(&format!("{}({})", item.name, kinds.join(",")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(functions))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn contains(&self, signature: &FunctionSignature) -> bool {
        self.functions.contains(signature)
    }

    /// Find the signature hashing to a selector.
    pub fn signature_of(&self, selector: Selector) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| selector_of(f) == selector)
    }
}

impl<'a> IntoIterator for &'a ContractInterface {
    type Item = &'a FunctionSignature;
    type IntoIter = std::slice::Iter<'a, FunctionSignature>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.iter()
    }
}

/// Read a JSON ABI array, keeping the order in which the functions are declared.
impl<'de> Deserialize<'de> for ContractInterface {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Vec::<AbiItem>::deserialize(deserializer)?;
        Self::from_abi_items(&items).map_err(de::Error::custom)
    }
}

/// The parts of a JSON ABI entry which make up a function signature.
#[derive(Clone, Debug, Deserialize)]
pub struct AbiItem {
    #[serde(rename = "type")]
    pub kind: String,
    /// Constructors, fallbacks and receivers have no name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AbiParam {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// Spell out tuples from their components, e.g. `tuple[]` becomes `(address,uint8)[]`.
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let components = self
                    .components
                    .iter()
                    .map(AbiParam::canonical_type)
                    .collect::<Vec<_>>();
                format!("({}){suffix}", components.join(","))
            }
            None => self.kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ContractInterface;
    use crate::selector;

    const ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"owner","type":"address"}],"stateMutability":"nonpayable"},
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[]},
        {"type":"function","name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}],"stateMutability":"view"},
        {"type":"function","name":"diamondCut","inputs":[
            {"name":"_diamondCut","type":"tuple[]","components":[
                {"name":"facetAddress","type":"address"},
                {"name":"action","type":"uint8"},
                {"name":"functionSelectors","type":"bytes4[]"}]},
            {"name":"_init","type":"address"},
            {"name":"_calldata","type":"bytes"}],
         "outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    #[test]
    fn reads_functions_from_abi() {
        let iface: ContractInterface = serde_json::from_str(ABI).unwrap();

        let names = iface.iter().map(|s| s.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "owner()",
                "diamondCut((address,uint8,bytes4[])[],address,bytes)"
            ]
        );
    }

    #[test]
    fn keeps_declaration_order() {
        let abi = r#"[
            {"type":"function","name":"zeta","inputs":[]},
            {"type":"receive","stateMutability":"payable"},
            {"type":"function","name":"alpha","inputs":[]},
            {"type":"function","name":"mid","inputs":[{"name":"x","type":"uint256"}]},
            {"type":"function","name":"alpha","inputs":[{"name":"","type":"tuple","components":[
                {"name":"a","type":"address"},
                {"name":"b","type":"tuple[2]","components":[{"name":"c","type":"bool"}]}]}]}
        ]"#;
        let iface: ContractInterface = serde_json::from_str(abi).unwrap();

        let names = iface.iter().map(|s| s.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["zeta()", "alpha()", "mid(uint256)", "alpha((address,(bool)[2]))"]
        );
    }

    #[test]
    fn rejects_unknown_abi_types() {
        let abi = r#"[{"type":"function","name":"f","inputs":[{"name":"x","type":"uint7"}]}]"#;
        assert!(serde_json::from_str::<ContractInterface>(abi).is_err());
    }

    #[test]
    fn drops_duplicates_keeping_order() {
        let iface =
            ContractInterface::from_signatures(["b()", "a(uint256)", "b()", "a(uint256 )"]).unwrap();
        let sigs = iface.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(sigs, vec!["b()", "a(uint256)"]);
    }

    #[test]
    fn finds_signature_by_selector() {
        let iface = ContractInterface::from_signatures(["owner()", "facets()"]).unwrap();
        let found = iface.signature_of(selector("facets()").unwrap()).unwrap();
        assert_eq!(found.as_str(), "facets()");
        assert!(iface.signature_of(selector("init()").unwrap()).is_none());
    }
}
