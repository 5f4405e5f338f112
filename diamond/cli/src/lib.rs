// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use clap::Args;
use diamond_deployer::erc1820::Erc1820Bootstrap;
use diamond_deployer::{DeploymentPlan, DiamondContracts, EthChainClient};
use diamond_hardhat::Hardhat;
use diamond_settings::Settings;
use ethers::types::Address;
use std::path::PathBuf;
use std::str::FromStr;

mod commands;

pub use commands::*;

/// The trait that represents the abstraction of a command line handler. To implement a new command
/// line operation, implement this trait and register it.
///
/// Commands are stateless; everything they need comes from the arguments and the settings.
#[async_trait]
pub trait CommandLineHandler {
    /// Arguments of the command, used to generate the command line parser.
    type Arguments: std::fmt::Debug + Args;

    /// Handle the request; the command decides what to print.
    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()>;
}

/// The global arguments that will be shared by all cli commands.
#[derive(Debug, Args, Clone)]
pub struct GlobalArguments {
    /// Home directory; paths in the settings are relative to it.
    #[arg(long, default_value = ".", env = "DIAMOND_HOME_DIR")]
    home_dir: PathBuf,

    /// Directory with `default.toml` and its overrides, defaults to `<home-dir>/config`.
    #[arg(long, env = "DIAMOND_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Optional mode specific overrides, loaded from `<config-dir>/<mode>.toml`.
    #[arg(long, short = 'm', default_value = "dev", env = "DIAMOND_RUN_MODE")]
    mode: String,
}

impl GlobalArguments {
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| self.home_dir.join("config"))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let config_dir = self.config_dir();
        Settings::new(&config_dir, &self.home_dir, &self.mode)
            .with_context(|| format!("failed to load settings from {config_dir:?}"))
    }
}

/// The build artifacts configured in the settings.
pub(crate) fn get_hardhat(settings: &Settings) -> anyhow::Result<Hardhat> {
    Hardhat::new(settings.artifacts_dir())
}

/// Connect to the configured node, signing with the configured key.
pub(crate) async fn get_chain_client(settings: &Settings) -> anyhow::Result<EthChainClient> {
    let private_key = settings
        .chain
        .private_key
        .as_deref()
        .ok_or_else(|| anyhow!("no private key configured, set DIAMOND_CHAIN__PRIVATE_KEY"))?;

    let client = EthChainClient::connect(
        settings.chain.rpc_url.as_str(),
        private_key,
        Some(settings.chain.polling_interval),
        get_hardhat(settings)?,
    )
    .await?
    .with_libraries(settings.artifacts.library_addresses())
    .with_confirmations(settings.chain.confirmations)
    .with_receipt_retries(settings.chain.receipt_retries);

    Ok(client)
}

/// The diamond described by the settings.
pub(crate) fn deployment_plan(settings: &Settings) -> anyhow::Result<DeploymentPlan> {
    let diamond = &settings.diamond;
    let plan = DeploymentPlan::new(
        DiamondContracts {
            cut_facet: diamond.cut_facet.clone(),
            core: diamond.core.clone(),
            initializer: diamond.initializer.clone(),
        },
        diamond.facets.clone(),
        diamond.shared_selectors(),
        diamond.init_signature.clone(),
    )?;
    Ok(plan)
}

pub(crate) fn erc1820_bootstrap(settings: &Settings) -> anyhow::Result<Erc1820Bootstrap> {
    let payload_file = settings
        .erc1820_payload_file()
        .ok_or_else(|| anyhow!("no ERC-1820 payload file configured, set erc1820.payload_file"))?;

    Ok(Erc1820Bootstrap {
        address: settings.erc1820.address,
        deployer: settings.erc1820.deployer,
        value: settings.erc1820.value,
        payload: Erc1820Bootstrap::read_payload(&payload_file)?,
    })
}

pub(crate) fn require_address(s: &str) -> anyhow::Result<Address> {
    Address::from_str(s).map_err(|e| anyhow!("invalid Ethereum address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::{require_address, GlobalArguments};
    use std::path::PathBuf;

    #[test]
    fn parses_addresses() {
        assert!(require_address("0x1820a4B7618BdE71Dce8cdc73aAB6C95905faD24").is_ok());
        assert!(require_address("1820a4B7618BdE71Dce8cdc73aAB6C95905faD24").is_ok());
        assert!(require_address("0x1234").is_err());
    }

    #[test]
    fn config_dir_defaults_to_home() {
        let global = GlobalArguments {
            home_dir: PathBuf::from("/srv/diamond"),
            config_dir: None,
            mode: "dev".to_owned(),
        };
        assert_eq!(global.config_dir(), PathBuf::from("/srv/diamond/config"));
    }
}
