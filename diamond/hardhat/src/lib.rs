// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::{anyhow, bail, Context};
use diamond_selectors::ContractInterface;
use ethers_core::abi::Abi;
use ethers_core::types as et;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

/// Contract source as it appears in link references, e.g. `"contracts/libraries/LibDiamond.sol"`.
pub type ContractSource = String;

/// Contract name, e.g. `"DiamondCutFacet"`.
pub type ContractName = String;

/// Fully Qualified Name of a contract, e.g. `"contracts/facets/DiamondCutFacet.sol:DiamondCutFacet"`.
pub type FQN = String;

/// ABI and linked bytecode, ready to be deployed.
#[derive(Clone, Debug)]
pub struct CompiledContract {
    pub abi: Abi,
    pub bytecode: Vec<u8>,
}

/// Lookup of contracts in a directory of build artifacts.
///
/// Both Hardhat (`artifacts/`) and Foundry (`out/`) layouts are understood:
/// every contract lives in `<dir>/.../<File>.sol/<Contract>.json`.
#[derive(Clone, Debug)]
pub struct Hardhat {
    artifacts_dir: PathBuf,
    /// Artifact files per contract name; more than one means the name is ambiguous.
    index: BTreeMap<ContractName, Vec<PathBuf>>,
}

impl Hardhat {
    /// Scan the artifacts directory and index every contract by name.
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let artifacts_dir = artifacts_dir.into();
        let mut index: BTreeMap<ContractName, Vec<PathBuf>> = Default::default();

        scan(&artifacts_dir, &mut index)
            .with_context(|| format!("failed to scan artifacts in {artifacts_dir:?}"))?;

        tracing::debug!(
            artifacts_dir = ?artifacts_dir,
            contracts = index.len(),
            "indexed build artifacts"
        );

        Ok(Self {
            artifacts_dir,
            index,
        })
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Names of all indexed contracts, in alphabetical order.
    pub fn contract_names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(|k| k.as_str())
    }

    /// Path to the JSON artifact of a contract.
    ///
    /// The name can be a plain contract name, if it's unique, or a fully
    /// qualified `<source>:<name>` where the source is relative to the artifacts directory.
    pub fn artifact_path(&self, contract: &str) -> anyhow::Result<PathBuf> {
        if let Some((source, name)) = contract.rsplit_once(':') {
            let path = self.artifacts_dir.join(source).join(format!("{name}.json"));
            if !path.is_file() {
                bail!("no artifact for {contract}: {path:?} does not exist");
            }
            return Ok(path);
        }

        match self.index.get(contract).map(|ps| ps.as_slice()) {
            None | Some([]) => bail!("unknown contract: {contract}"),
            Some([path]) => Ok(path.clone()),
            Some(paths) => bail!(
                "ambiguous contract name {contract}, use one of the fully qualified names: {}",
                paths
                    .iter()
                    .map(|p| self.fqn(p, contract))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn abi(&self, contract: &str) -> anyhow::Result<Abi> {
        self.artifact(contract)?.abi(contract)
    }

    /// The function signatures declared in the contract ABI, in declaration order.
    pub fn interface(&self, contract: &str) -> anyhow::Result<ContractInterface> {
        let artifact = self.artifact(contract)?;
        serde_json::from_str(artifact.abi.get())
            .with_context(|| format!("failed to read the interface of {contract}"))
    }

    /// Read the bytecode of the contract and replace all links in it with library addresses.
    ///
    /// Libraries can be given by Fully Qualified Name or just the contract name, but they
    /// must be unambiguous. Entries in the library map which aren't needed are ignored.
    pub fn bytecode(
        &self,
        contract: &str,
        libraries: &HashMap<String, et::Address>,
    ) -> anyhow::Result<Vec<u8>> {
        let artifact = self.artifact(contract)?;
        link(contract, &artifact, libraries)
    }

    pub fn contract(
        &self,
        contract: &str,
        libraries: &HashMap<String, et::Address>,
    ) -> anyhow::Result<CompiledContract> {
        let artifact = self.artifact(contract)?;
        let bytecode = link(contract, &artifact, libraries)?;
        Ok(CompiledContract {
            abi: artifact.abi(contract)?,
            bytecode,
        })
    }

    fn fqn(&self, path: &Path, contract: &str) -> FQN {
        let source = path
            .parent()
            .and_then(|p| p.strip_prefix(&self.artifacts_dir).ok())
            .unwrap_or(path);
        format!("{}:{}", source.to_string_lossy(), contract)
    }

    fn artifact(&self, contract: &str) -> anyhow::Result<Artifact> {
        let path = self.artifact_path(contract)?;

        let json =
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {path:?}"))?;

        let artifact = serde_json::from_str::<Artifact>(&json)
            .with_context(|| format!("failed to parse build artifact {path:?}"))?;

        Ok(artifact)
    }
}

/// Recursively collect `<File>.sol/<Contract>.json` files, skipping Hardhat debug files.
fn scan(dir: &Path, index: &mut BTreeMap<ContractName, Vec<PathBuf>>) -> anyhow::Result<()> {
    let in_source_dir = dir
        .extension()
        .map(|ext| ext == "sol")
        .unwrap_or_default();

    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {dir:?}"))? {
        let path = entry?.path();

        if path.is_dir() {
            scan(&path, index)?;
            continue;
        }

        if !in_source_dir {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };

        if file_name.ends_with(".dbg.json") {
            continue;
        }

        if let Some(name) = file_name.strip_suffix(".json") {
            index.entry(name.to_owned()).or_default().push(path.clone());
        }
    }
    Ok(())
}

/// Substitute library addresses into the placeholders of the hex bytecode and decode it.
fn link(
    contract: &str,
    artifact: &Artifact,
    libraries: &HashMap<String, et::Address>,
) -> anyhow::Result<Vec<u8>> {
    let mut object = artifact.bytecode.object().to_owned();
    let offset = if object.starts_with("0x") { 2 } else { 0 };

    for (lib_src, links) in artifact.link_references() {
        for (lib_name, positions) in links {
            let fqn = format!("{lib_src}:{lib_name}");

            let lib_addr = match (libraries.get(&fqn), libraries.get(lib_name)) {
                (None, None) => bail!("failed to resolve library {fqn} needed by {contract}"),
                (Some(_), Some(_)) => bail!("ambiguous library: {fqn}"),
                (Some(addr), None) | (None, Some(addr)) => addr,
            };

            let lib_addr = hex::encode(lib_addr.0);

            for pos in positions {
                let start = offset + pos.start * 2;
                let end = start + pos.length * 2;
                if end > object.len() {
                    bail!("link reference to {fqn} is out of bounds in {contract}");
                }
                object.replace_range(start..end, &lib_addr);
            }
        }
    }

    hex::decode(&object[offset..])
        .map_err(|e| anyhow!("failed to decode bytecode of {contract} from hex: {e}"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    /// Kept as text; [Abi] indexes functions by name and loses their order.
    abi: Box<RawValue>,
    bytecode: Bytecode,
    /// Hardhat keeps the link references next to the bytecode string.
    #[serde(default)]
    link_references: LinkReferences,
}

impl Artifact {
    fn abi(&self, contract: &str) -> anyhow::Result<Abi> {
        serde_json::from_str(self.abi.get())
            .with_context(|| format!("failed to parse the ABI of {contract}"))
    }

    fn link_references(&self) -> &LinkReferences {
        match &self.bytecode {
            Bytecode::Hardhat(_) => &self.link_references,
            Bytecode::Foundry {
                link_references, ..
            } => link_references,
        }
    }
}

type LinkReferences = HashMap<ContractSource, HashMap<ContractName, Vec<Position>>>;

/// Match the `"bytecode"` entry in the build artifact.
#[derive(Deserialize)]
#[serde(untagged)]
enum Bytecode {
    /// Hardhat: a plain hex string.
    Hardhat(String),
    /// Foundry: the hex object with its own link references.
    #[serde(rename_all = "camelCase")]
    Foundry {
        object: String,
        #[serde(default)]
        link_references: LinkReferences,
    },
}

impl Bytecode {
    fn object(&self) -> &str {
        match self {
            Bytecode::Hardhat(object) => object,
            Bytecode::Foundry { object, .. } => object,
        }
    }
}

/// Indicate where a placeholder appears in the bytecode object.
#[derive(Deserialize)]
struct Position {
    start: usize,
    length: usize,
}

#[cfg(test)]
mod tests {
    use ethers_core::types as et;
    use std::collections::HashMap;
    use std::path::Path;

    use super::Hardhat;

    const ABI: &str = r#"[
        {"type":"function","name":"transferOwnership","inputs":[{"name":"_newOwner","type":"address"}],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}],"stateMutability":"view"}
    ]"#;

    // 3 bytes of code, a 20 byte library placeholder, then 1 more byte.
    const LINKED: &str = "0x600060__$a5e36a4ae8e0ba6d1e5c8b9ac4a3e4d1f5$__00";

    fn write(dir: &Path, rel: &str, json: String) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    fn hardhat_artifact(bytecode: &str, link_references: &str) -> String {
        format!(
            r#"{{"_format":"hh-sol-artifact-1","contractName":"X","sourceName":"x.sol","abi":{ABI},"bytecode":"{bytecode}","deployedBytecode":"0x","linkReferences":{link_references},"deployedLinkReferences":{{}}}}"#
        )
    }

    fn foundry_artifact(bytecode: &str, link_references: &str) -> String {
        format!(
            r#"{{"abi":{ABI},"bytecode":{{"object":"{bytecode}","linkReferences":{link_references}}},"deployedBytecode":{{"object":"0x"}}}}"#
        )
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            root,
            "contracts/facets/OwnershipFacet.sol/OwnershipFacet.json",
            hardhat_artifact("0x6001", "{}"),
        );
        write(
            root,
            "contracts/facets/OwnershipFacet.sol/OwnershipFacet.dbg.json",
            r#"{"buildInfo":"../../build-info/abc.json"}"#.to_owned(),
        );
        write(
            root,
            "build-info/abc.json",
            r#"{"id":"abc"}"#.to_owned(),
        );
        write(
            root,
            "contracts/Linked.sol/Linked.json",
            hardhat_artifact(
                LINKED,
                r#"{"contracts/libraries/LibDiamond.sol":{"LibDiamond":[{"start":3,"length":20}]}}"#,
            ),
        );
        write(
            root,
            "Forged.sol/Forged.json",
            foundry_artifact(
                LINKED,
                r#"{"src/LibDiamond.sol":{"LibDiamond":[{"start":3,"length":20}]}}"#,
            ),
        );
        write(
            root,
            "contracts/a/Twin.sol/Twin.json",
            hardhat_artifact("0x00", "{}"),
        );
        write(
            root,
            "contracts/b/Twin.sol/Twin.json",
            hardhat_artifact("0x01", "{}"),
        );

        dir
    }

    #[test]
    fn indexes_contracts_only() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();

        let names = hardhat.contract_names().collect::<Vec<_>>();
        assert_eq!(names, vec!["Forged", "Linked", "OwnershipFacet", "Twin"]);
    }

    #[test]
    fn reads_interface_and_plain_bytecode() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();

        let iface = hardhat.interface("OwnershipFacet").unwrap();
        let sigs = iface.iter().map(|s| s.as_str()).collect::<Vec<_>>();
        assert_eq!(sigs, vec!["transferOwnership(address)", "owner()"]);

        let bytecode = hardhat
            .bytecode("OwnershipFacet", &Default::default())
            .unwrap();
        assert_eq!(bytecode, vec![0x60, 0x01]);
    }

    #[test]
    fn bytecode_linking() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();
        let lib = et::Address::from_low_u64_be(0xabcd);

        let mut libraries = HashMap::new();
        libraries.insert("LibDiamond".to_owned(), lib);

        for contract in ["Linked", "Forged"] {
            let bytecode = hardhat.bytecode(contract, &libraries).unwrap();
            assert_eq!(bytecode.len(), 24, "{contract}");
            assert_eq!(&bytecode[3..23], lib.as_bytes(), "{contract}");
        }
    }

    #[test]
    fn bytecode_missing_link() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();

        let result = hardhat.bytecode("Linked", &Default::default());

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to resolve library"));
    }

    #[test]
    fn ambiguous_names_need_qualification() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();

        let err = hardhat.abi("Twin").unwrap_err().to_string();
        assert!(err.contains("ambiguous contract name Twin"), "{err}");
        assert!(err.contains("contracts/a/Twin.sol:Twin"), "{err}");

        let bytecode = hardhat
            .bytecode("contracts/b/Twin.sol:Twin", &Default::default())
            .unwrap();
        assert_eq!(bytecode, vec![0x01]);
    }

    #[test]
    fn unknown_contract() {
        let dir = setup();
        let hardhat = Hardhat::new(dir.path()).unwrap();
        assert!(hardhat.abi("Nope").is_err());
        assert!(hardhat.abi("contracts/Nope.sol:Nope").is_err());
    }
}
