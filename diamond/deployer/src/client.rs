// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use async_trait::async_trait;
use diamond_selectors::ContractInterface;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};

/// The result of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: H256,
    /// The receipt status; `false` means the transaction reverted.
    pub success: bool,
}

/// The chain operations needed to deploy and upgrade a diamond.
///
/// Transactions are signed by a single account, see [ChainClient::sender].
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Deploy a named contract with ABI encoded constructor arguments and wait until it's mined.
    async fn deploy_contract(&self, contract: &str, args: Vec<Token>) -> anyhow::Result<Address>;

    /// The functions exposed by a named contract.
    async fn contract_interface(&self, contract: &str) -> anyhow::Result<ContractInterface>;

    /// Send a transaction with calldata and wait for its receipt.
    ///
    /// A reverted transaction is an outcome, not an error; errors mean the
    /// transaction could not be submitted or its receipt never arrived.
    async fn send_call(&self, to: Address, data: Bytes) -> anyhow::Result<TxOutcome>;

    /// Execute a read-only call against the latest state.
    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes>;

    /// The code deployed at an address, empty for accounts without code.
    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes>;

    /// Send native currency and wait for the receipt.
    async fn transfer(&self, to: Address, value: U256) -> anyhow::Result<TxOutcome>;

    /// Broadcast an already signed transaction and wait for its receipt.
    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<TxOutcome>;

    /// The account signing the transactions.
    fn sender(&self) -> Address;
}
