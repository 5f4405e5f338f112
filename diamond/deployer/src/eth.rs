// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use diamond_hardhat::Hardhat;
use diamond_selectors::ContractInterface;
use ethers::abi::Token;
use ethers::prelude::{
    ContractFactory, Http, LocalWallet, Middleware, PendingTransaction, Provider, SignerMiddleware,
};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256, U64};

use crate::{ChainClient, TxOutcome};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Default polling interval of the provider.
const ETH_PROVIDER_POLLING_TIME: Duration = Duration::from_secs(1);

/// Maximum number of polls for a transaction receipt.
const TRANSACTION_RECEIPT_RETRIES: usize = 200;

/// [ChainClient] talking to an Ethereum JSON-RPC node, deploying contracts from build artifacts.
pub struct EthChainClient {
    client: Arc<SignerClient>,
    hardhat: Hardhat,
    libraries: HashMap<String, Address>,
    confirmations: usize,
    receipt_retries: usize,
}

impl EthChainClient {
    /// Connect to the node and sign transactions with the given hex encoded secret key.
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        polling_interval: Option<Duration>,
        hardhat: Hardhat,
    ) -> anyhow::Result<Self> {
        let mut provider =
            Provider::<Http>::try_from(rpc_url).with_context(|| format!("invalid RPC URL: {rpc_url}"))?;
        provider.set_interval(polling_interval.unwrap_or(ETH_PROVIDER_POLLING_TIME));

        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .context("invalid private key")?;

        // Sets the chain ID of the wallet to that of the node.
        let client = SignerMiddleware::new_with_provider_chain(provider, wallet)
            .await
            .context("failed to query the chain ID")?;

        tracing::info!(rpc_url, sender = ?client.address(), "connected to chain");

        Ok(Self {
            client: Arc::new(client),
            hardhat,
            libraries: Default::default(),
            confirmations: 1,
            receipt_retries: TRANSACTION_RECEIPT_RETRIES,
        })
    }

    /// Already deployed libraries to link into the bytecode of contracts.
    pub fn with_libraries(mut self, libraries: HashMap<String, Address>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_receipt_retries(mut self, retries: usize) -> Self {
        self.receipt_retries = retries;
        self
    }

    pub fn hardhat(&self) -> &Hardhat {
        &self.hardhat
    }

    async fn wait(&self, pending: PendingTransaction<'_, Http>) -> anyhow::Result<TxOutcome> {
        let tx_hash = *pending;

        let receipt = pending
            .retries(self.receipt_retries)
            .confirmations(self.confirmations)
            .await
            .with_context(|| format!("failed to get the receipt of {tx_hash:?}"))?
            .ok_or_else(|| {
                anyhow!("transaction {tx_hash:?} sent to network, but receipt cannot be obtained")
            })?;

        Ok(TxOutcome {
            tx_hash,
            success: receipt.status == Some(U64::one()),
        })
    }

    async fn send(&self, tx: TransactionRequest) -> anyhow::Result<TxOutcome> {
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .context("failed to send transaction")?;
        self.wait(pending).await
    }
}

#[async_trait]
impl ChainClient for EthChainClient {
    async fn deploy_contract(&self, contract: &str, args: Vec<Token>) -> anyhow::Result<Address> {
        let compiled = self.hardhat.contract(contract, &self.libraries)?;

        let factory = ContractFactory::new(compiled.abi, compiled.bytecode.into(), self.client.clone());

        let deployed = factory
            .deploy_tokens(args)
            .with_context(|| format!("invalid constructor arguments for {contract}"))?
            .confirmations(self.confirmations)
            .send()
            .await
            .with_context(|| format!("failed to deploy {contract}"))?;

        Ok(deployed.address())
    }

    async fn contract_interface(&self, contract: &str) -> anyhow::Result<ContractInterface> {
        self.hardhat.interface(contract)
    }

    async fn send_call(&self, to: Address, data: Bytes) -> anyhow::Result<TxOutcome> {
        self.send(TransactionRequest::new().to(to).data(data)).await
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let result = self
            .client
            .call(&tx, None)
            .await
            .with_context(|| format!("call to {to:?} failed"))?;
        Ok(result)
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        let code = self
            .client
            .get_code(address, None)
            .await
            .with_context(|| format!("failed to get code at {address:?}"))?;
        Ok(code)
    }

    async fn transfer(&self, to: Address, value: U256) -> anyhow::Result<TxOutcome> {
        self.send(TransactionRequest::new().to(to).value(value)).await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<TxOutcome> {
        let pending = self
            .client
            .send_raw_transaction(raw)
            .await
            .context("failed to broadcast raw transaction")?;
        self.wait(pending).await
    }

    fn sender(&self) -> Address {
        self.client.address()
    }
}
