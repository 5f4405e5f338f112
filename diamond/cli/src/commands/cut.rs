// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Submit facet cuts read from a JSON file to a deployed diamond.

use anyhow::Context;
use async_trait::async_trait;
use clap::Args;
use diamond_deployer::{CutSubmitter, DiamondCut};
use diamond_selectors::FacetCut;
use ethers::types::Bytes;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::{get_chain_client, require_address, CommandLineHandler, GlobalArguments};

pub(crate) struct Cut;

#[async_trait]
impl CommandLineHandler for Cut {
    type Arguments = CutArgs;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("diamond cut with args: {:?}", arguments);

        let settings = global.settings()?;
        let diamond = require_address(&arguments.diamond)?;
        let cuts = read_cuts(&arguments.cuts)?;

        let cut = match &arguments.init {
            Some(init) => {
                let init = require_address(init)?;
                let calldata = match &arguments.calldata {
                    Some(hex) => Bytes::from_str(hex)
                        .map_err(|e| anyhow::anyhow!("invalid calldata: {e}"))?,
                    None => settings.diamond.init_signature.encode_call(&[]).into(),
                };
                DiamondCut::with_initializer(cuts, init, calldata)
            }
            None => DiamondCut::without_initializer(cuts),
        };

        let client = Arc::new(get_chain_client(&settings).await?);
        let receipt = CutSubmitter::new(client).submit(diamond, &cut).await?;

        println!("diamond cut: {:?}", receipt.tx_hash);

        Ok(())
    }
}

/// Parse a JSON array of `{"facetAddress", "action", "functionSelectors"}` objects.
fn read_cuts(path: &Path) -> anyhow::Result<Vec<FacetCut>> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
    let cuts = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse facet cuts in {path:?}"))?;
    Ok(cuts)
}

#[derive(Debug, Args)]
#[command(name = "cut", about = "Add, replace or remove selectors of a deployed diamond")]
pub(crate) struct CutArgs {
    #[arg(long, help = "Address of the diamond")]
    pub diamond: String,
    #[arg(long, help = "JSON file with the facet cuts to apply")]
    pub cuts: PathBuf,
    #[arg(long, help = "Contract to delegate-call after the cuts are applied")]
    pub init: Option<String>,
    #[arg(
        long,
        requires = "init",
        help = "Hex encoded calldata for the initializer, defaults to the configured init signature"
    )]
    pub calldata: Option<String>,
}
