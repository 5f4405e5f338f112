// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Print function selectors, from a signature or a compiled contract.

use async_trait::async_trait;
use clap::Args;
use diamond_selectors::{all_selectors_of, excluding, restrict_to, FunctionSignature};
use std::fmt::Debug;

use crate::{get_hardhat, CommandLineHandler, GlobalArguments};

pub(crate) struct Selectors;

#[async_trait]
impl CommandLineHandler for Selectors {
    type Arguments = SelectorsArgs;

    async fn handle(global: &GlobalArguments, arguments: &Self::Arguments) -> anyhow::Result<()> {
        tracing::debug!("selectors with args: {:?}", arguments);

        if let Some(signature) = &arguments.signature {
            let sig = FunctionSignature::parse(signature)?;
            println!("{} {}", sig.selector(), sig);
            return Ok(());
        }

        let Some(contract) = &arguments.contract else {
            anyhow::bail!("either --signature or --contract is required");
        };

        let settings = global.settings()?;
        let iface = get_hardhat(&settings)?.interface(contract)?;

        let only = parse_all(&arguments.only)?;
        let except = parse_all(&arguments.except)?;

        let mut selectors = all_selectors_of(&iface);
        if !only.is_empty() {
            selectors = restrict_to(&iface, &selectors, &only);
        }
        selectors = excluding(&iface, &selectors, &except);

        for s in selectors {
            match iface.signature_of(s) {
                Some(sig) => println!("{s} {sig}"),
                None => println!("{s}"),
            }
        }

        Ok(())
    }
}

fn parse_all(signatures: &[String]) -> anyhow::Result<Vec<FunctionSignature>> {
    let sigs = signatures
        .iter()
        .map(|s| FunctionSignature::parse(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sigs)
}

#[derive(Debug, Args)]
#[command(
    name = "selectors",
    about = "Print the selectors of a function signature or of the functions of a contract"
)]
pub(crate) struct SelectorsArgs {
    #[arg(long, help = "A single function signature, e.g. 'transfer(address,uint256)'")]
    pub signature: Option<String>,
    #[arg(
        long,
        conflicts_with = "signature",
        help = "Contract name (or FQN) in the build artifacts"
    )]
    pub contract: Option<String>,
    #[arg(long, help = "Only include these function signatures; can be repeated")]
    pub only: Vec<String>,
    #[arg(long, help = "Leave out these function signatures; can be repeated")]
    pub except: Vec<String>,
}
