// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Display;

use diamond_selectors::SelectorError;
use ethers::types::H256;
use thiserror::Error;

/// The deployment step which failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStep {
    CutRouter,
    Core,
    Initializer,
    Facet(String),
    /// A standalone contract, e.g. a token.
    Contract(String),
}

impl Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployStep::CutRouter => write!(f, "cut router"),
            DeployStep::Core => write!(f, "diamond core"),
            DeployStep::Initializer => write!(f, "initializer"),
            DeployStep::Facet(name) => write!(f, "facet {name}"),
            DeployStep::Contract(name) => write!(f, "contract {name}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid deployment plan: {0}")]
    InvalidPlan(String),
    /// Contracts deployed before the failing step are left on chain.
    #[error("deployment failed at the {step} step")]
    DeploymentFailed {
        step: DeployStep,
        #[source]
        source: anyhow::Error,
    },
    #[error("diamond upgrade rejected in transaction {tx_hash:?}")]
    CutRejected { tx_hash: H256 },
    #[error("failed to submit the diamond cut")]
    Submission(#[source] anyhow::Error),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl DeployError {
    pub(crate) fn failed(step: DeployStep, source: impl Into<anyhow::Error>) -> Self {
        Self::DeploymentFailed {
            step,
            source: source.into(),
        }
    }
}
