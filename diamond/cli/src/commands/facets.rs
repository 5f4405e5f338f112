// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! List the facets of a diamond through its loupe.

use async_trait::async_trait;
use clap::Args;
use diamond_deployer::ChainClient;
use diamond_selectors::loupe;
use std::fmt::Debug;

use crate::{get_chain_client, require_address, CommandLineHandler, GlobalArguments};

pub(crate) struct Facets;

#[async_trait]
impl CommandLineHandler for Facets {
    type Arguments = FacetsArgs;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("list facets with args: {:?}", arguments);

        let settings = global.settings()?;
        let diamond = require_address(&arguments.diamond)?;
        let client = get_chain_client(&settings).await?;

        let data = client.call(diamond, loupe::facets_call().into()).await?;
        let facets = loupe::decode_facets(&data)?;

        for facet in facets {
            let selectors = facet
                .selectors
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>();
            println!("{:?}: {}", facet.address, selectors.join(", "));
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
#[command(name = "facets", about = "List the facets of a diamond and their selectors")]
pub(crate) struct FacetsArgs {
    #[arg(long, help = "Address of the diamond")]
    pub diamond: String,
}
