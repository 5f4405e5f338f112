// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Deploy a diamond with its facets and upgrade it with facet cuts.
//!
//! All chain access goes through [ChainClient], so the sequencing logic runs
//! the same way against a node and against the in-memory chain in [testing].

mod client;
mod cut;
mod deploy;
mod error;
pub mod erc1820;
mod eth;
mod plan;
pub mod tokens;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ChainClient, TxOutcome};
pub use cut::{CutReceipt, CutSubmitter, DiamondCut, DEFAULT_INIT_SIGNATURE};
pub use deploy::{DeployedFacet, DiamondDeployer, DiamondDeployment};
pub use error::{DeployError, DeployStep};
pub use eth::{EthChainClient, SignerClient};
pub use plan::{DeploymentPlan, DiamondContracts};
