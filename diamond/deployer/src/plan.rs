// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashSet;

use diamond_selectors::{FunctionSignature, SharedSelectors};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Names of the contracts making up the diamond itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiamondContracts {
    /// Implements `diamondCut`, registered by the core's constructor.
    pub cut_facet: String,
    /// The diamond, constructed with `(owner, cut_facet)`.
    pub core: String,
    /// Target of the initialization call in the first cut.
    pub initializer: String,
}

impl Default for DiamondContracts {
    fn default() -> Self {
        Self {
            cut_facet: "DiamondCutFacet".to_owned(),
            core: "Diamond".to_owned(),
            initializer: "DiamondInit".to_owned(),
        }
    }
}

/// What to deploy, in which order, and how to resolve shared selectors.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    contracts: DiamondContracts,
    facets: Vec<String>,
    shared: SharedSelectors,
    init_signature: FunctionSignature,
}

impl DeploymentPlan {
    /// Check that the facet names are unique and every shared selector owner is one of them.
    pub fn new(
        contracts: DiamondContracts,
        facets: Vec<String>,
        shared: SharedSelectors,
        init_signature: FunctionSignature,
    ) -> Result<Self, DeployError> {
        let mut seen = HashSet::new();
        for name in &facets {
            if name.trim().is_empty() {
                return Err(DeployError::InvalidPlan("empty facet name".to_owned()));
            }
            if !seen.insert(name.as_str()) {
                return Err(DeployError::InvalidPlan(format!(
                    "facet {name} is listed more than once"
                )));
            }
        }
        for (sig, owner) in shared.iter() {
            if let Some(owner) = owner {
                if !seen.contains(owner) {
                    return Err(DeployError::InvalidPlan(format!(
                        "{sig} is owned by {owner}, which is not one of the facets"
                    )));
                }
            }
        }
        Ok(Self {
            contracts,
            facets,
            shared,
            init_signature,
        })
    }

    pub fn contracts(&self) -> &DiamondContracts {
        &self.contracts
    }

    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    pub fn shared(&self) -> &SharedSelectors {
        &self.shared
    }

    /// Function called on the initializer in the first cut.
    pub fn init_signature(&self) -> &FunctionSignature {
        &self.init_signature
    }
}
