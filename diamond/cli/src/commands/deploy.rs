// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Deploy a diamond with the facets from the settings.

use anyhow::Context;
use async_trait::async_trait;
use clap::Args;
use diamond_deployer::{ChainClient, DiamondDeployer, DiamondDeployment};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{deployment_plan, get_chain_client, require_address, CommandLineHandler, GlobalArguments};

pub(crate) struct Deploy;

#[async_trait]
impl CommandLineHandler for Deploy {
    type Arguments = DeployArgs;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("deploy diamond with args: {:?}", arguments);

        let settings = global.settings()?;
        let plan = deployment_plan(&settings)?;
        let client = Arc::new(get_chain_client(&settings).await?);

        let owner = match &arguments.owner {
            Some(owner) => require_address(owner)?,
            None => client.sender(),
        };

        let deployer = DiamondDeployer::new(client);

        let deployment = if arguments.no_cut {
            deployer.deploy(&plan, owner).await?
        } else {
            let (deployment, receipt) = deployer.deploy_and_cut(&plan, owner).await?;
            println!("diamond cut: {:?}", receipt.tx_hash);
            deployment
        };

        print_deployment(&deployment);

        if let Some(output) = &arguments.output {
            let json = serde_json::to_string_pretty(&deployment)?;
            std::fs::write(output, json)
                .with_context(|| format!("failed to write deployment to {output:?}"))?;
        }

        Ok(())
    }
}

fn print_deployment(deployment: &DiamondDeployment) {
    println!("diamond: {:?}", deployment.core);
    println!("cut facet: {:?}", deployment.cut_facet);
    println!("initializer: {:?}", deployment.initializer);
    for facet in &deployment.facets {
        println!(
            "facet {}: {:?} ({} selectors)",
            facet.name,
            facet.address,
            facet.cut.selectors().len()
        );
    }
}

#[derive(Debug, Args)]
#[command(
    name = "deploy",
    about = "Deploy the diamond, its initializer and facets, then cut the facets in"
)]
pub(crate) struct DeployArgs {
    #[arg(long, help = "Owner of the diamond, defaults to the deploying account")]
    pub owner: Option<String>,
    #[arg(long, help = "Only deploy the contracts, without the initial cut")]
    pub no_cut: bool,
    #[arg(long, help = "Write the addresses and facet cuts as JSON to this file")]
    pub output: Option<PathBuf>,
}
