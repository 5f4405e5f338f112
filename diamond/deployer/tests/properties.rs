// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use diamond_deployer::testing::{standard_plan, MockChain};
use diamond_deployer::{ChainClient, DeployError, DiamondDeployer};
use diamond_selectors::arb::ArbInterface;
use diamond_selectors::{all_selectors_of, INIT_SIGNATURE};
use quickcheck_macros::quickcheck;

/// Whatever a facet exposes, the initial cut routes exactly its non-init functions to it.
#[quickcheck]
fn prop_initial_cut_routes_facet(iface: ArbInterface) -> bool {
    let iface = iface.0;
    let signatures = iface.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let signatures = signatures.iter().map(|s| s.as_str()).collect::<Vec<_>>();

    let chain = Arc::new(MockChain::standard().with_contract("RandomFacet", &signatures));
    let plan = standard_plan(&["RandomFacet"]);

    let rt = tokio::runtime::Runtime::new().unwrap();
    let result = rt.block_on(DiamondDeployer::new(chain.clone()).deploy_and_cut(&plan, chain.sender()));

    let expected = all_selectors_of(&iface);
    if expected.is_empty() {
        // The diamond refuses cuts without selectors.
        return matches!(result, Err(DeployError::CutRejected { .. }));
    }

    let Ok((deployment, _)) = result else {
        return false;
    };
    let facet = deployment.facets[0].address;

    let init = diamond_selectors::selector(INIT_SIGNATURE).unwrap();
    expected
        .iter()
        .all(|s| chain.routed_facet(deployment.core, *s) == Some(facet))
        && chain.routed_facet(deployment.core, init).is_none()
}
