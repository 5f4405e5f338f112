// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Deploy the ERC-1820 registry from its pre-signed transaction.

use async_trait::async_trait;
use clap::Args;
use diamond_deployer::erc1820::ensure_erc1820_registry;
use std::fmt::Debug;

use crate::{erc1820_bootstrap, get_chain_client, CommandLineHandler, GlobalArguments};

pub(crate) struct Erc1820;

#[async_trait]
impl CommandLineHandler for Erc1820 {
    type Arguments = Erc1820Args;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("erc1820 registry with args: {:?}", arguments);

        let settings = global.settings()?;
        let bootstrap = erc1820_bootstrap(&settings)?;
        let client = get_chain_client(&settings).await?;

        if ensure_erc1820_registry(&client, &bootstrap).await? {
            println!("deployed ERC-1820 registry at {:?}", bootstrap.address);
        } else {
            println!("ERC-1820 registry already present at {:?}", bootstrap.address);
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(
    name = "erc1820",
    about = "Deploy the ERC-1820 registry unless it already exists"
)]
pub(crate) struct Erc1820Args {}
