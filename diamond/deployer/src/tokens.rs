// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Standalone token contracts deployed with their constructor arguments.

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::erc1820::{ensure_erc1820_registry, Erc1820Bootstrap};
use crate::{ChainClient, DeployError, DeployStep};

pub const ERC20_CONTRACT: &str = "MyERC20";
pub const ERC777_CONTRACT: &str = "MyERC777";
pub const ERC1155_CONTRACT: &str = "MyERC1155";
pub const COUNTER_CONTRACT: &str = "Counter";

/// `MyERC20(string name, string symbol, uint256 initialSupply)`
pub async fn deploy_erc20<C: ChainClient + ?Sized>(
    client: &C,
    name: &str,
    symbol: &str,
    initial_supply: U256,
) -> Result<Address, DeployError> {
    deploy(
        client,
        ERC20_CONTRACT,
        vec![
            Token::String(name.to_owned()),
            Token::String(symbol.to_owned()),
            Token::Uint(initial_supply),
        ],
    )
    .await
}

/// `MyERC777(string name, string symbol, uint256 initialSupply, address[] defaultOperators)`
///
/// The token registers itself in the ERC-1820 registry, so that is deployed first if missing.
pub async fn deploy_erc777<C: ChainClient + ?Sized>(
    client: &C,
    name: &str,
    symbol: &str,
    initial_supply: U256,
    default_operators: &[Address],
    registry: &Erc1820Bootstrap,
) -> Result<Address, DeployError> {
    ensure_erc1820_registry(client, registry)
        .await
        .map_err(|e| DeployError::failed(DeployStep::Contract("ERC1820Registry".to_owned()), e))?;

    deploy(
        client,
        ERC777_CONTRACT,
        vec![
            Token::String(name.to_owned()),
            Token::String(symbol.to_owned()),
            Token::Uint(initial_supply),
            Token::Array(default_operators.iter().map(|a| Token::Address(*a)).collect()),
        ],
    )
    .await
}

/// `MyERC1155(string uri)`
pub async fn deploy_erc1155<C: ChainClient + ?Sized>(
    client: &C,
    uri: &str,
) -> Result<Address, DeployError> {
    deploy(client, ERC1155_CONTRACT, vec![Token::String(uri.to_owned())]).await
}

pub async fn deploy_counter<C: ChainClient + ?Sized>(client: &C) -> Result<Address, DeployError> {
    deploy(client, COUNTER_CONTRACT, Vec::new()).await
}

async fn deploy<C: ChainClient + ?Sized>(
    client: &C,
    contract: &str,
    args: Vec<Token>,
) -> Result<Address, DeployError> {
    let address = client
        .deploy_contract(contract, args)
        .await
        .map_err(|e| DeployError::failed(DeployStep::Contract(contract.to_owned()), e))?;

    tracing::info!(contract, ?address, "deployed token contract");

    Ok(address)
}
