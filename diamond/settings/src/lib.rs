// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use config::{Config, ConfigError, Environment, File};
use diamond_selectors::{FunctionSignature, SharedSelectors};
use ethers_core::types::{Address, U256};
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use utils::{deserialize_u256, EnvInterpol};

pub mod utils;

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    /// JSON-RPC endpoint of the Ethereum node.
    pub rpc_url: Url,
    /// Hex encoded secret key of the account paying for the deployment.
    ///
    /// Only needed by commands that send transactions.
    pub private_key: Option<String>,
    /// Number of blocks to wait for after a contract is deployed.
    pub confirmations: usize,
    /// How many times to poll for a transaction receipt before giving up.
    pub receipt_retries: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub polling_interval: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactSettings {
    /// Directory with the Hardhat or Foundry build artifacts.
    pub dir: PathBuf,
    /// Already deployed libraries to link into the bytecode.
    #[serde(default)]
    pub libraries: Vec<LibrarySettings>,
}

home_relative!(ArtifactSettings { dir });

impl ArtifactSettings {
    pub fn library_addresses(&self) -> HashMap<String, Address> {
        self.libraries
            .iter()
            .map(|l| (l.name.clone(), l.address))
            .collect()
    }
}

/// Config keys are case insensitive, so library names are given as values.
#[derive(Debug, Deserialize, Clone)]
pub struct LibrarySettings {
    /// Contract name or fully qualified name of the library.
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharedSelectorSettings {
    pub signature: FunctionSignature,
    /// The only facet allowed to route the signature; if empty, no facet routes it.
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiamondSettings {
    /// Facet implementing `diamondCut`, registered by the diamond constructor.
    pub cut_facet: String,
    /// The diamond itself, constructed with the owner and the cut facet address.
    pub core: String,
    /// Contract called with `init_signature` once the facets are cut in.
    pub initializer: String,
    pub init_signature: FunctionSignature,
    /// Facets deployed and added in the initial cut, in this order.
    pub facets: Vec<String>,
    #[serde(default)]
    pub shared_selectors: Vec<SharedSelectorSettings>,
}

impl DiamondSettings {
    pub fn shared_selectors(&self) -> SharedSelectors {
        self.shared_selectors
            .iter()
            .fold(SharedSelectors::new(), |shared, s| {
                shared.declare(s.signature.clone(), s.owner.clone())
            })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Erc20Settings {
    pub name: String,
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_u256")]
    pub initial_supply: U256,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Erc777Settings {
    pub name: String,
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_u256")]
    pub initial_supply: U256,
    #[serde(default)]
    pub default_operators: Vec<Address>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Erc1155Settings {
    /// Metadata URI template, with `{id}` substituted by clients.
    pub uri: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenSettings {
    pub erc20: Erc20Settings,
    pub erc777: Erc777Settings,
    pub erc1155: Erc1155Settings,
}

/// Keyless deployment of the ERC-1820 registry.
#[derive(Debug, Deserialize, Clone)]
pub struct Erc1820Settings {
    /// Where the registry ends up, the same on every chain.
    pub address: Address,
    /// The one-off account which signed the deployment transaction.
    pub deployer: Address,
    /// Amount sent to the deployer to pay for the deployment.
    #[serde(deserialize_with = "deserialize_u256")]
    pub value: U256,
    /// File with the hex encoded pre-signed deployment transaction.
    pub payload_file: Option<PathBuf>,
}

impl Erc1820Settings {
    pub fn payload_file(&self, home_dir: &Path) -> Option<PathBuf> {
        self.payload_file
            .as_ref()
            .map(|p| utils::expand_path(home_dir, p))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Home directory configured on the CLI, to which all paths in settings can be set relative.
    home_dir: PathBuf,
    pub chain: ChainSettings,
    pub artifacts: ArtifactSettings,
    pub diamond: DiamondSettings,
    pub tokens: TokenSettings,
    pub erc1820: Erc1820Settings,
}

impl Settings {
    /// Load the default configuration from a directory,
    /// then potential overrides specific to the run mode,
    /// then overrides from the local environment,
    /// finally parse it into the [Settings] type.
    pub fn new(config_dir: &Path, home_dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        Self::config(config_dir, home_dir, run_mode).and_then(Self::parse)
    }

    /// Load the configuration into a generic data structure.
    fn config(config_dir: &Path, home_dir: &Path, run_mode: &str) -> Result<Config, ConfigError> {
        Config::builder()
            .add_source(EnvInterpol(File::from(config_dir.join("default"))))
            // Optional mode specific overrides, e.g. `testnet.toml`.
            .add_source(EnvInterpol(
                File::from(config_dir.join(run_mode)).required(false),
            ))
            // Optional local overrides, not checked into git.
            .add_source(EnvInterpol(
                File::from(config_dir.join("local")).required(false),
            ))
            // e.g. `DIAMOND_CHAIN__RPC_URL=http://127.0.0.1:8545` would change the node.
            .add_source(EnvInterpol(
                Environment::with_prefix("diamond")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("diamond.facets")
                    .with_list_parse_key("tokens.erc777.default_operators"),
            ))
            .set_override("home_dir", home_dir.to_string_lossy().as_ref())?
            .build()
    }

    /// Try to parse the config into [Settings].
    fn parse(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    /// The configured home directory.
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.artifacts.dir(&self.home_dir)
    }

    pub fn erc1820_payload_file(&self) -> Option<PathBuf> {
        self.erc1820.payload_file(&self.home_dir)
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::{Address, U256};
    use std::path::PathBuf;
    use std::str::FromStr;

    use crate::utils::tests::with_env_vars;

    use super::Settings;

    fn try_parse_config(run_mode: &str) -> Result<Settings, config::ConfigError> {
        let current_dir = PathBuf::from(".");
        let default_dir = PathBuf::from("../config");
        let c = Settings::config(&default_dir, &current_dir, run_mode)?;
        Settings::parse(c)
    }

    fn parse_config(run_mode: &str) -> Settings {
        try_parse_config(run_mode).expect("failed to parse Settings")
    }

    #[test]
    #[serial_test::serial]
    fn parse_default_config() {
        let settings = parse_config("");

        assert_eq!(settings.chain.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert!(settings.chain.private_key.is_none());
        assert_eq!(settings.diamond.cut_facet, "DiamondCutFacet");
        assert_eq!(settings.diamond.init_signature.as_str(), "init()");
        assert_eq!(
            settings.diamond.facets,
            vec!["DiamondLoupeFacet", "OwnershipFacet"]
        );
        assert_eq!(settings.artifacts_dir(), PathBuf::from("./artifacts"));
        assert_eq!(
            settings.erc1820.address,
            Address::from_str("0x1820a4B7618BdE71Dce8cdc73aAB6C95905faD24").unwrap()
        );
        assert_eq!(
            settings.erc1820.value,
            U256::from_dec_str("80000000000000000").unwrap()
        );
        assert_eq!(settings.tokens.erc20.initial_supply, U256::exp10(21));
        assert!(settings.artifacts.library_addresses().is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn shared_selectors_from_config() {
        let settings = parse_config("");
        let shared = settings.diamond.shared_selectors();
        let sig = diamond_selectors::FunctionSignature::parse("supportsInterface(bytes4)").unwrap();

        assert!(shared.is_shared(&sig));
        assert_eq!(shared.owner_of(&sig), Some("DiamondLoupeFacet"));
    }

    #[test]
    #[serial_test::serial]
    fn parse_comma_separated() {
        let settings = with_env_vars(
            vec![
                ("DIAMOND_DIAMOND__FACETS", "DiamondLoupeFacet,OwnershipFacet,ERC20Facet"),
                (
                    "DIAMOND_TOKENS__ERC777__DEFAULT_OPERATORS",
                    "0x0000000000000000000000000000000000000001,0x0000000000000000000000000000000000000002",
                ),
                // A plain string next to the lists, to make sure it's not parsed as one.
                ("DIAMOND_DIAMOND__CORE", "MyDiamond"),
            ],
            || try_parse_config(""),
        )
        .unwrap();

        assert_eq!(settings.diamond.facets.len(), 3);
        assert_eq!(settings.tokens.erc777.default_operators.len(), 2);
        assert_eq!(settings.diamond.core, "MyDiamond");
    }

    #[test]
    #[serial_test::serial]
    fn parse_with_interpolation() {
        let settings = with_env_vars(
            vec![
                ("DIAMOND_CHAIN__RPC_URL", "http://${NODE_HOST}:${NODE_PORT}"),
                ("DIAMOND_CHAIN__PRIVATE_KEY", "${DEPLOYER_KEY}"),
                ("NODE_HOST", "node.local"),
                ("NODE_PORT", "8546"),
                ("DEPLOYER_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
            ],
            || try_parse_config(""),
        )
        .unwrap();

        assert_eq!(settings.chain.rpc_url.as_str(), "http://node.local:8546/");
        assert_eq!(
            settings.chain.private_key.as_deref(),
            Some("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
        );
    }

    #[test]
    #[serial_test::serial]
    fn invalid_signature_fails_to_parse() {
        let result = with_env_vars(
            vec![("DIAMOND_DIAMOND__INIT_SIGNATURE", "init(")],
            || try_parse_config(""),
        );
        assert!(result.is_err());
    }
}
