// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Keyless deployment of the [ERC-1820](https://eips.ethereum.org/EIPS/eip-1820)
//! pseudo-introspection registry, which ERC-777 tokens register themselves in.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use ethers::types::{Address, Bytes, U256};

use crate::ChainClient;

/// What it takes to put the registry on a chain which doesn't have it yet.
#[derive(Debug, Clone)]
pub struct Erc1820Bootstrap {
    /// Where the registry lives once deployed, the same on every chain.
    pub address: Address,
    /// Signer of the pre-signed deployment transaction.
    pub deployer: Address,
    /// Funds the deployer needs to pay for the deployment.
    pub value: U256,
    /// The pre-signed deployment transaction.
    pub payload: Bytes,
}

impl Erc1820Bootstrap {
    /// Read the hex encoded deployment transaction from a file.
    pub fn read_payload(path: &Path) -> anyhow::Result<Bytes> {
        let hex = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ERC-1820 payload from {path:?}"))?;
        Bytes::from_str(hex.trim())
            .map_err(|e| anyhow!("failed to decode ERC-1820 payload in {path:?}: {e}"))
    }
}

/// Deploy the registry unless there is already code at its address.
///
/// Returns whether a deployment took place.
pub async fn ensure_erc1820_registry<C: ChainClient + ?Sized>(
    client: &C,
    bootstrap: &Erc1820Bootstrap,
) -> anyhow::Result<bool> {
    let code = client.code_at(bootstrap.address).await?;
    if !code.is_empty() {
        tracing::debug!(address = ?bootstrap.address, "ERC-1820 registry already deployed");
        return Ok(false);
    }

    let funding = client
        .transfer(bootstrap.deployer, bootstrap.value)
        .await
        .context("failed to fund the ERC-1820 deployer")?;
    if !funding.success {
        bail!(
            "funding the ERC-1820 deployer failed in transaction {:?}",
            funding.tx_hash
        );
    }

    let deployment = client
        .send_raw_transaction(bootstrap.payload.clone())
        .await
        .context("failed to broadcast the ERC-1820 deployment")?;
    if !deployment.success {
        bail!(
            "ERC-1820 deployment reverted in transaction {:?}",
            deployment.tx_hash
        );
    }

    tracing::info!(
        address = ?bootstrap.address,
        tx_hash = ?deployment.tx_hash,
        "deployed ERC-1820 registry"
    );

    Ok(true)
}
