// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Token deployment commands.

use async_trait::async_trait;
use clap::{Args, Subcommand};
use diamond_deployer::tokens;
use ethers::types::U256;
use std::fmt::Debug;

use crate::{erc1820_bootstrap, get_chain_client, require_address, CommandLineHandler, GlobalArguments};

/// The command to deploy the sample token contracts.
#[derive(Debug, Args)]
#[command(name = "token", about = "deploy token contracts")]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct TokenCommandsArgs {
    #[command(subcommand)]
    command: Commands,
}

impl TokenCommandsArgs {
    pub async fn handle(&self, global: &GlobalArguments) -> anyhow::Result<()> {
        match &self.command {
            Commands::Erc20(args) => Erc20::handle(global, args).await,
            Commands::Erc777(args) => Erc777::handle(global, args).await,
            Commands::Erc1155(args) => Erc1155::handle(global, args).await,
            Commands::Counter(args) => Counter::handle(global, args).await,
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    Erc20(Erc20Args),
    Erc777(Erc777Args),
    Erc1155(Erc1155Args),
    Counter(CounterArgs),
}

fn parse_u256(s: &str) -> anyhow::Result<U256> {
    let value = if let Some(hex) = s.strip_prefix("0x") {
        U256::from_str_radix(hex, 16)?
    } else {
        U256::from_dec_str(s)?
    };
    Ok(value)
}

pub(crate) struct Erc20;

#[async_trait]
impl CommandLineHandler for Erc20 {
    type Arguments = Erc20Args;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("deploy erc20 with args: {:?}", arguments);

        let settings = global.settings()?;
        let token = &settings.tokens.erc20;
        let supply = match &arguments.initial_supply {
            Some(s) => parse_u256(s)?,
            None => token.initial_supply,
        };
        let client = get_chain_client(&settings).await?;

        let address = tokens::deploy_erc20(
            &client,
            arguments.name.as_deref().unwrap_or(&token.name),
            arguments.symbol.as_deref().unwrap_or(&token.symbol),
            supply,
        )
        .await?;

        println!("{}: {address:?}", tokens::ERC20_CONTRACT);
        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(about = "Deploy an ERC-20 token")]
pub(crate) struct Erc20Args {
    #[arg(long, help = "Token name, defaults to tokens.erc20.name")]
    pub name: Option<String>,
    #[arg(long, help = "Token symbol, defaults to tokens.erc20.symbol")]
    pub symbol: Option<String>,
    #[arg(long, help = "Initial supply minted to the deployer, in the smallest unit")]
    pub initial_supply: Option<String>,
}

pub(crate) struct Erc777;

#[async_trait]
impl CommandLineHandler for Erc777 {
    type Arguments = Erc777Args;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("deploy erc777 with args: {:?}", arguments);

        let settings = global.settings()?;
        let token = &settings.tokens.erc777;
        let supply = match &arguments.initial_supply {
            Some(s) => parse_u256(s)?,
            None => token.initial_supply,
        };
        let operators = if arguments.default_operators.is_empty() {
            token.default_operators.clone()
        } else {
            arguments
                .default_operators
                .iter()
                .map(|s| require_address(s))
                .collect::<anyhow::Result<Vec<_>>>()?
        };
        let bootstrap = erc1820_bootstrap(&settings)?;
        let client = get_chain_client(&settings).await?;

        let address = tokens::deploy_erc777(
            &client,
            arguments.name.as_deref().unwrap_or(&token.name),
            arguments.symbol.as_deref().unwrap_or(&token.symbol),
            supply,
            &operators,
            &bootstrap,
        )
        .await?;

        println!("{}: {address:?}", tokens::ERC777_CONTRACT);
        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(about = "Deploy an ERC-777 token, bootstrapping the ERC-1820 registry if needed")]
pub(crate) struct Erc777Args {
    #[arg(long, help = "Token name, defaults to tokens.erc777.name")]
    pub name: Option<String>,
    #[arg(long, help = "Token symbol, defaults to tokens.erc777.symbol")]
    pub symbol: Option<String>,
    #[arg(long, help = "Initial supply minted to the deployer, in the smallest unit")]
    pub initial_supply: Option<String>,
    #[arg(long, value_delimiter = ',', help = "Comma separated default operators")]
    pub default_operators: Vec<String>,
}

pub(crate) struct Erc1155;

#[async_trait]
impl CommandLineHandler for Erc1155 {
    type Arguments = Erc1155Args;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("deploy erc1155 with args: {:?}", arguments);

        let settings = global.settings()?;
        let uri = arguments
            .uri
            .clone()
            .unwrap_or_else(|| settings.tokens.erc1155.uri.clone());
        let client = get_chain_client(&settings).await?;

        let address = tokens::deploy_erc1155(&client, &uri).await?;

        println!("{}: {address:?}", tokens::ERC1155_CONTRACT);
        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(about = "Deploy an ERC-1155 multi-token")]
pub(crate) struct Erc1155Args {
    #[arg(long, help = "Metadata URI template, defaults to tokens.erc1155.uri")]
    pub uri: Option<String>,
}

pub(crate) struct Counter;

#[async_trait]
impl CommandLineHandler for Counter {
    type Arguments = CounterArgs;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("deploy counter with args: {:?}", arguments);

        let settings = global.settings()?;
        let client = get_chain_client(&settings).await?;
        let address = tokens::deploy_counter(&client).await?;

        println!("{}: {address:?}", tokens::COUNTER_CONTRACT);
        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(about = "Deploy the sample counter contract")]
pub(crate) struct CounterArgs {}

#[cfg(test)]
mod tests {
    use ethers::types::U256;

    use super::parse_u256;

    #[test]
    fn parses_supply() {
        assert_eq!(parse_u256("1000").unwrap(), U256::from(1000));
        assert_eq!(parse_u256("0xff").unwrap(), U256::from(255));
        assert!(parse_u256("ten").is_err());
    }
}
