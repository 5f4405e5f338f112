// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use diamond_selectors::{FacetCut, FunctionSignature, SelectorError, DIAMOND_CUT_SIGNATURE};
use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256};
use serde::Serialize;

use crate::{ChainClient, DeployError};

/// The initializer function called when none is configured.
pub const DEFAULT_INIT_SIGNATURE: &str = "init()";

/// A batch of facet cuts with an optional initialization call, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiamondCut {
    cuts: Vec<FacetCut>,
    init: Address,
    calldata: Bytes,
}

impl DiamondCut {
    /// Apply the cuts then delegate-call `calldata` on `init`.
    pub fn with_initializer(cuts: Vec<FacetCut>, init: Address, calldata: impl Into<Bytes>) -> Self {
        Self {
            cuts,
            init,
            calldata: calldata.into(),
        }
    }

    /// Apply the cuts only; the diamond requires empty calldata with the zero address.
    pub fn without_initializer(cuts: Vec<FacetCut>) -> Self {
        Self {
            cuts,
            init: Address::zero(),
            calldata: Bytes::new(),
        }
    }

    pub fn cuts(&self) -> &[FacetCut] {
        &self.cuts
    }

    pub fn init(&self) -> Address {
        self.init
    }

    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    /// Calldata of `diamondCut((address,uint8,bytes4[])[],address,bytes)`.
    pub fn encode(&self) -> Result<Bytes, SelectorError> {
        let sig = FunctionSignature::parse(DIAMOND_CUT_SIGNATURE)?;
        let data = sig.encode_call(&[
            Token::Array(self.cuts.iter().map(FacetCut::to_token).collect()),
            Token::Address(self.init),
            Token::Bytes(self.calldata.to_vec()),
        ]);
        Ok(data.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CutReceipt {
    pub tx_hash: H256,
}

/// Sends diamond cuts to a deployed diamond.
pub struct CutSubmitter<C> {
    client: Arc<C>,
    init_signature: Option<FunctionSignature>,
}

impl<C: ChainClient> CutSubmitter<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            init_signature: None,
        }
    }

    /// Call a different function than `init()` on the initializer.
    pub fn with_init_signature(mut self, signature: FunctionSignature) -> Self {
        self.init_signature = Some(signature);
        self
    }

    /// Submit `cuts` to the diamond at `core`, calling the initializer contract at `init`.
    pub async fn submit_cut(
        &self,
        core: Address,
        init: Address,
        cuts: Vec<FacetCut>,
    ) -> Result<CutReceipt, DeployError> {
        let init_signature = match &self.init_signature {
            Some(sig) => sig.clone(),
            None => FunctionSignature::parse(DEFAULT_INIT_SIGNATURE)?,
        };
        let calldata = init_signature.encode_call(&[]);

        self.submit(core, &DiamondCut::with_initializer(cuts, init, calldata))
            .await
    }

    /// Submit a prepared cut and wait for it to be mined.
    ///
    /// The diamond either applies the whole batch or none of it, so a failed
    /// receipt means the diamond is unchanged.
    pub async fn submit(&self, core: Address, cut: &DiamondCut) -> Result<CutReceipt, DeployError> {
        let data = cut.encode()?;

        tracing::info!(
            ?core,
            cuts = cut.cuts().len(),
            init = ?cut.init(),
            "submitting diamond cut"
        );

        let outcome = self
            .client
            .send_call(core, data)
            .await
            .map_err(DeployError::Submission)?;

        if !outcome.success {
            tracing::error!(?core, tx_hash = ?outcome.tx_hash, "diamond upgrade failed");
            return Err(DeployError::CutRejected {
                tx_hash: outcome.tx_hash,
            });
        }

        tracing::info!(?core, tx_hash = ?outcome.tx_hash, "completed diamond cut");

        Ok(CutReceipt {
            tx_hash: outcome.tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use diamond_selectors::{selector, FacetCut};
    use ethers::abi::{decode, ParamType, Token};
    use ethers::types::Address;

    use super::{CutSubmitter, DiamondCut};
    use crate::testing::{standard_plan, MockChain};
    use crate::{ChainClient, DeployError, DiamondDeployer};

    fn cut_params() -> Vec<ParamType> {
        vec![
            ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Uint(8),
                ParamType::Array(Box::new(ParamType::FixedBytes(4))),
            ]))),
            ParamType::Address,
            ParamType::Bytes,
        ]
    }

    #[test]
    fn encodes_diamond_cut_call() {
        let facet = Address::from_low_u64_be(0xface);
        let s = selector("owner()").unwrap();
        let cut = DiamondCut::with_initializer(
            vec![FacetCut::add(facet, vec![s]).unwrap()],
            Address::from_low_u64_be(0x1417),
            vec![0xe1, 0xc7, 0x39, 0x2a],
        );

        let data = cut.encode().unwrap();
        assert_eq!(hex::encode(&data[..4]), "1f931c1c");

        let tokens = decode(&cut_params(), &data[4..]).unwrap();
        assert_eq!(tokens[0], Token::Array(vec![cut.cuts()[0].to_token()]));
        assert_eq!(tokens[1], Token::Address(Address::from_low_u64_be(0x1417)));
        assert_eq!(tokens[2], Token::Bytes(vec![0xe1, 0xc7, 0x39, 0x2a]));
    }

    #[test]
    fn without_initializer_has_no_calldata() {
        let cut = DiamondCut::without_initializer(vec![FacetCut::remove(vec![])]);
        let data = cut.encode().unwrap();
        let tokens = decode(&cut_params(), &data[4..]).unwrap();
        assert_eq!(tokens[1], Token::Address(Address::zero()));
        assert_eq!(tokens[2], Token::Bytes(vec![]));
    }

    #[tokio::test]
    async fn rejected_cut_reports_tx_hash() {
        let chain = Arc::new(MockChain::standard());
        let deployer = DiamondDeployer::new(chain.clone());
        let plan = standard_plan(&["DiamondLoupeFacet"]);
        let deployment = deployer.deploy(&plan, chain.sender()).await.unwrap();

        // Removing a selector which was never added reverts the whole batch.
        let cut = DiamondCut::without_initializer(vec![FacetCut::remove(vec![
            selector("neverAdded()").unwrap(),
        ])]);

        let err = CutSubmitter::new(chain.clone())
            .submit(deployment.core, &cut)
            .await
            .unwrap_err();

        match err {
            DeployError::CutRejected { tx_hash } => {
                assert_eq!(chain.last_tx_hash(), Some(tx_hash))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
