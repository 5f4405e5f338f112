// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! This mod contains the different command line implementations.

mod cut;
mod deploy;
mod erc1820;
mod facets;
mod selectors;
mod token;

use crate::commands::cut::{Cut, CutArgs};
use crate::commands::deploy::{Deploy, DeployArgs};
use crate::commands::erc1820::{Erc1820, Erc1820Args};
use crate::commands::facets::{Facets, FacetsArgs};
use crate::commands::selectors::{Selectors, SelectorsArgs};
use crate::commands::token::TokenCommandsArgs;
use crate::{CommandLineHandler, GlobalArguments};
use anyhow::Context;

use clap::{Command, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Generator, Shell};
use std::io;

/// The collection of all subcommands to be called, see clap's documentation for usage.
#[derive(Debug, Subcommand)]
enum Commands {
    Selectors(SelectorsArgs),
    Deploy(DeployArgs),
    Cut(CutArgs),
    Facets(FacetsArgs),
    Token(TokenCommandsArgs),
    Erc1820(Erc1820Args),
}

#[derive(Debug, Parser)]
#[command(
    name = "diamond",
    about = "Deploy and upgrade EIP-2535 diamonds",
    version
)]
#[command(propagate_version = true, arg_required_else_help = true)]
struct DiamondCliCommands {
    // If provided, outputs the completion file for given shell
    #[arg(long = "cli-autocomplete-gen", value_enum)]
    generator: Option<Shell>,
    #[clap(flatten)]
    global_params: GlobalArguments,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Parse the command line and run the selected command.
pub async fn cli() -> anyhow::Result<()> {
    let args = DiamondCliCommands::parse();

    if let Some(generator) = args.generator {
        let mut cmd = DiamondCliCommands::command();
        print_completions(generator, &mut cmd);
        return Ok(());
    }

    let global = &args.global_params;
    let Some(command) = &args.command else {
        return Ok(());
    };

    let r = match command {
        Commands::Selectors(args) => Selectors::handle(global, args).await,
        Commands::Deploy(args) => Deploy::handle(global, args).await,
        Commands::Cut(args) => Cut::handle(global, args).await,
        Commands::Facets(args) => Facets::handle(global, args).await,
        Commands::Token(args) => args.handle(global).await,
        Commands::Erc1820(args) => Erc1820::handle(global, args).await,
    };

    r.with_context(|| format!("error processing command {command:?}"))
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Commands, DiamondCliCommands};

    #[test]
    fn cli_definition_is_valid() {
        DiamondCliCommands::command().debug_assert();
    }

    #[test]
    fn parses_repeated_filters() {
        let args = DiamondCliCommands::parse_from([
            "diamond",
            "selectors",
            "--contract",
            "MyERC20",
            "--except",
            "transfer(address,uint256)",
            "--except",
            "approve(address,uint256)",
        ]);

        match args.command {
            Some(Commands::Selectors(s)) => {
                assert_eq!(s.contract.as_deref(), Some("MyERC20"));
                assert_eq!(s.except.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
