// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use diamond_selectors::{build_add_cut, FacetCut, SharedSelectors};
use ethers::abi::Token;
use ethers::types::Address;
use futures_util::future::try_join_all;
use serde::Serialize;

use crate::{ChainClient, CutReceipt, CutSubmitter, DeployError, DeployStep, DeploymentPlan};

/// A facet deployed for the initial cut, with the cut registering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedFacet {
    pub name: String,
    pub address: Address,
    pub cut: FacetCut,
}

/// Addresses of everything [DiamondDeployer::deploy] put on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiamondDeployment {
    pub cut_facet: Address,
    pub core: Address,
    pub initializer: Address,
    /// In the order of the plan, regardless of which deployment finished first.
    pub facets: Vec<DeployedFacet>,
}

impl DiamondDeployment {
    pub fn facet_cuts(&self) -> Vec<FacetCut> {
        self.facets.iter().map(|f| f.cut.clone()).collect()
    }

    pub fn facet_address(&self, name: &str) -> Option<Address> {
        self.facets
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.address)
    }
}

/// Runs the deployment sequence of a diamond.
pub struct DiamondDeployer<C> {
    client: Arc<C>,
}

impl<C: ChainClient> DiamondDeployer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Deploy the cut router, the core owned by `owner`, the initializer, then all
    /// facets concurrently, building an `Add` cut for each facet.
    ///
    /// Nothing is cut into the diamond yet; see [DiamondDeployer::deploy_and_cut].
    pub async fn deploy(
        &self,
        plan: &DeploymentPlan,
        owner: Address,
    ) -> Result<DiamondDeployment, DeployError> {
        let contracts = plan.contracts();

        let cut_facet = self
            .deploy_step(DeployStep::CutRouter, &contracts.cut_facet, Vec::new())
            .await?;

        let core = self
            .deploy_step(
                DeployStep::Core,
                &contracts.core,
                vec![Token::Address(owner), Token::Address(cut_facet)],
            )
            .await?;

        let initializer = self
            .deploy_step(DeployStep::Initializer, &contracts.initializer, Vec::new())
            .await?;

        // The facets don't depend on each other; `try_join_all` keeps the plan order.
        let facets = try_join_all(
            plan.facets()
                .iter()
                .map(|name| self.deploy_facet(name, plan.shared())),
        )
        .await?;

        tracing::info!(
            ?core,
            ?cut_facet,
            ?initializer,
            facets = facets.len(),
            "deployed diamond"
        );

        Ok(DiamondDeployment {
            cut_facet,
            core,
            initializer,
            facets,
        })
    }

    /// Deploy everything, then add all facets and run the initializer in a single cut.
    pub async fn deploy_and_cut(
        &self,
        plan: &DeploymentPlan,
        owner: Address,
    ) -> Result<(DiamondDeployment, CutReceipt), DeployError> {
        let deployment = self.deploy(plan, owner).await?;

        let receipt = CutSubmitter::new(self.client.clone())
            .with_init_signature(plan.init_signature().clone())
            .submit_cut(
                deployment.core,
                deployment.initializer,
                deployment.facet_cuts(),
            )
            .await?;

        Ok((deployment, receipt))
    }

    async fn deploy_facet(
        &self,
        name: &str,
        shared: &SharedSelectors,
    ) -> Result<DeployedFacet, DeployError> {
        let step = DeployStep::Facet(name.to_owned());
        let address = self.deploy_step(step.clone(), name, Vec::new()).await?;

        let iface = self
            .client
            .contract_interface(name)
            .await
            .map_err(|e| DeployError::failed(step.clone(), e))?;

        let cut = build_add_cut(name, address, &iface, shared)
            .map_err(|e| DeployError::failed(step, e))?;

        tracing::debug!(
            facet = name,
            ?address,
            selectors = cut.selectors().len(),
            "built facet cut"
        );

        Ok(DeployedFacet {
            name: name.to_owned(),
            address,
            cut,
        })
    }

    async fn deploy_step(
        &self,
        step: DeployStep,
        contract_name: &str,
        args: Vec<Token>,
    ) -> Result<Address, DeployError> {
        let address = self
            .client
            .deploy_contract(contract_name, args)
            .await
            .map_err(|e| {
                tracing::error!(%step, contract_name, error = %e, "deployment failed");
                DeployError::failed(step.clone(), e)
            })?;

        tracing::info!(%step, contract_name, ?address, "deployed contract");

        Ok(address)
    }
}
