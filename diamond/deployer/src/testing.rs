// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! An in-memory [ChainClient] for tests.
//!
//! Contracts are registered by name with the signatures they expose. Deploying
//! the diamond core creates a router which applies `diamondCut` batches the way
//! the reference diamond does: all or nothing, with the same revert conditions.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use diamond_selectors::loupe::{self, Facet};
use diamond_selectors::{
    all_selectors_of, selector, ContractInterface, FunctionSignature, Selector, SharedSelectors,
    DIAMOND_CUT_SIGNATURE,
};
use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};

use crate::{ChainClient, DeploymentPlan, DiamondContracts, TxOutcome};

/// A contract creation as seen by the chain, in the order they completed.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub contract: String,
    pub address: Address,
    pub args: Vec<Token>,
}

/// Selector routing table of a deployed diamond.
#[derive(Debug, Clone, Default)]
struct Router {
    owner: Address,
    /// Routes in the order they were added.
    routes: Vec<(Selector, Address)>,
}

impl Router {
    fn route(&self, selector: Selector) -> Option<Address> {
        self.routes
            .iter()
            .find(|(s, _)| *s == selector)
            .map(|(_, a)| *a)
    }

    fn facets(&self) -> Vec<Facet> {
        let mut facets: Vec<Facet> = Vec::new();
        for (s, a) in &self.routes {
            match facets.iter_mut().find(|f| f.address == *a) {
                Some(f) => f.selectors.push(*s),
                None => facets.push(Facet {
                    address: *a,
                    selectors: vec![*s],
                }),
            }
        }
        facets
    }
}

#[derive(Default)]
struct ChainState {
    next_address: u64,
    next_tx: u64,
    /// Name of the contract deployed at each address.
    code: HashMap<Address, String>,
    deployments: Vec<Deployment>,
    diamonds: HashMap<Address, Router>,
    balances: HashMap<Address, U256>,
    last_tx: Option<H256>,
    last_revert: Option<String>,
}

impl ChainState {
    fn next_address(&mut self) -> Address {
        self.next_address += 1;
        Address::from_low_u64_be(0x1000 + self.next_address)
    }

    fn next_tx_hash(&mut self) -> H256 {
        self.next_tx += 1;
        let tx_hash = H256::from_low_u64_be(self.next_tx);
        self.last_tx = Some(tx_hash);
        tx_hash
    }
}

pub struct MockChain {
    sender: Address,
    core_contract: String,
    contracts: HashMap<String, ContractInterface>,
    failing: HashSet<String>,
    latency: HashMap<String, Duration>,
    raw_deployments: HashMap<Vec<u8>, (String, Address)>,
    state: Mutex<ChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// An empty chain with `Diamond` as the name of the diamond core contract.
    pub fn new() -> Self {
        Self {
            sender: Address::from_low_u64_be(0xa11ce),
            core_contract: DiamondContracts::default().core,
            contracts: Default::default(),
            failing: Default::default(),
            latency: Default::default(),
            raw_deployments: Default::default(),
            state: Default::default(),
        }
    }

    /// The reference diamond contracts, a few facets and the token contracts.
    pub fn standard() -> Self {
        Self::new()
            .with_contract("DiamondCutFacet", &[DIAMOND_CUT_SIGNATURE])
            .with_contract("Diamond", &[])
            .with_contract("DiamondInit", &["init()"])
            .with_contract(
                "DiamondLoupeFacet",
                &[
                    loupe::FACETS,
                    loupe::FACET_FUNCTION_SELECTORS,
                    loupe::FACET_ADDRESSES,
                    loupe::FACET_ADDRESS,
                    "supportsInterface(bytes4)",
                ],
            )
            .with_contract(
                "OwnershipFacet",
                &["owner()", "transferOwnership(address)"],
            )
            .with_contract(
                "Test1Facet",
                &[
                    "test1Func1()",
                    "test1Func2()",
                    "supportsInterface(bytes4)",
                    "init(bytes)",
                ],
            )
            .with_contract("Test2Facet", &["test2Func1()", "test2Func2()"])
            .with_contract(
                "MyERC20",
                &["transfer(address,uint256)", "balanceOf(address)"],
            )
            .with_contract(
                "MyERC777",
                &["send(address,uint256,bytes)", "balanceOf(address)"],
            )
            .with_contract(
                "MyERC1155",
                &["balanceOf(address,uint256)", "uri(uint256)"],
            )
            .with_contract("Counter", &["increment()", "count()"])
    }

    pub fn with_contract(mut self, name: &str, signatures: &[&str]) -> Self {
        let iface = ContractInterface::from_signatures(signatures)
            .unwrap_or_else(|e| panic!("invalid signatures for {name}: {e}"));
        self.contracts.insert(name.to_owned(), iface);
        self
    }

    /// Name of the contract which behaves as a diamond when deployed.
    pub fn with_diamond_core(mut self, name: &str) -> Self {
        self.core_contract = name.to_owned();
        self
    }

    /// Make the constructor of a contract revert.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_owned());
        self
    }

    /// Delay the deployment of a contract.
    pub fn with_latency(mut self, name: &str, delay: Duration) -> Self {
        self.latency.insert(name.to_owned(), delay);
        self
    }

    /// Broadcasting `payload` creates the named contract at `address`.
    pub fn with_raw_deployment(mut self, payload: Bytes, name: &str, address: Address) -> Self {
        self.raw_deployments
            .insert(payload.to_vec(), (name.to_owned(), address));
        self
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.state().deployments.clone()
    }

    /// The facet a diamond routes a selector to.
    pub fn routed_facet(&self, diamond: Address, selector: Selector) -> Option<Address> {
        self.state()
            .diamonds
            .get(&diamond)
            .and_then(|r| r.route(selector))
    }

    pub fn diamond_owner(&self, diamond: Address) -> Option<Address> {
        self.state().diamonds.get(&diamond).map(|r| r.owner)
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn last_tx_hash(&self) -> Option<H256> {
        self.state().last_tx
    }

    /// Reason of the most recent reverted transaction.
    pub fn last_revert(&self) -> Option<String> {
        self.state().last_revert.clone()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().expect("mock chain state poisoned")
    }

    fn interface_at(&self, state: &ChainState, address: Address) -> Option<&ContractInterface> {
        state
            .code
            .get(&address)
            .and_then(|name| self.contracts.get(name))
    }

    /// Run a transaction against the state; a successful cut returns the updated router.
    fn execute(&self, state: &ChainState, to: Address, data: &[u8]) -> Result<Option<Router>, String> {
        let selector = calldata_selector(data);

        if let Some(router) = state.diamonds.get(&to) {
            let Some(selector) = selector.filter(|s| router.route(*s).is_some()) else {
                return Err("Diamond: Function does not exist".to_owned());
            };
            if selector == diamond_cut_selector() {
                return self.apply_cut(state, router.clone(), &data[4..]).map(Some);
            }
            return Ok(None);
        }

        match (self.interface_at(state, to), selector) {
            // Accounts without code accept anything.
            (None, _) => Ok(None),
            (Some(iface), Some(s)) if iface.signature_of(s).is_some() => Ok(None),
            (Some(_), _) => Err("function selector was not recognized".to_owned()),
        }
    }

    /// Validate and apply a batch of cuts on a copy of the router.
    fn apply_cut(&self, state: &ChainState, mut router: Router, args: &[u8]) -> Result<Router, String> {
        if router.owner != self.sender {
            return Err("LibDiamond: Must be contract owner".to_owned());
        }

        let tokens = decode(&diamond_cut_params(), args).map_err(|e| e.to_string())?;
        let [cuts, init, calldata] = tokens.as_slice() else {
            return Err("malformed diamondCut arguments".to_owned());
        };

        let cuts = cuts.clone().into_array().unwrap_or_default();
        for cut in cuts {
            let (facet, action, selectors) =
                raw_cut(cut).ok_or_else(|| "malformed facet cut".to_owned())?;

            if selectors.is_empty() {
                return Err("LibDiamondCut: No selectors in facet to cut".to_owned());
            }

            match action {
                0 => {
                    if facet.is_zero() {
                        return Err("LibDiamondCut: Add facet can't be address(0)".to_owned());
                    }
                    if !state.code.contains_key(&facet) {
                        return Err("LibDiamondCut: New facet has no code".to_owned());
                    }
                    for s in selectors {
                        if router.route(s).is_some() {
                            return Err(
                                "LibDiamondCut: Can't add function that already exists".to_owned()
                            );
                        }
                        router.routes.push((s, facet));
                    }
                }
                1 => {
                    // LibDiamond reports a zero replace facet with the add message.
                    if facet.is_zero() {
                        return Err("LibDiamondCut: Add facet can't be address(0)".to_owned());
                    }
                    if !state.code.contains_key(&facet) {
                        return Err("LibDiamondCut: New facet has no code".to_owned());
                    }
                    for s in selectors {
                        match router.routes.iter_mut().find(|(r, _)| *r == s) {
                            None => {
                                return Err("LibDiamondCut: Can't replace function that doesn't exist"
                                    .to_owned())
                            }
                            Some((_, a)) if *a == facet => {
                                return Err("LibDiamondCut: Can't replace function with same function"
                                    .to_owned())
                            }
                            Some((_, a)) => *a = facet,
                        }
                    }
                }
                2 => {
                    if !facet.is_zero() {
                        return Err(
                            "LibDiamondCut: Remove facet address must be address(0)".to_owned()
                        );
                    }
                    for s in selectors {
                        match router.routes.iter().position(|(r, _)| *r == s) {
                            Some(i) => {
                                router.routes.remove(i);
                            }
                            None => {
                                return Err(
                                    "LibDiamondCut: Can't remove function that doesn't exist"
                                        .to_owned(),
                                )
                            }
                        }
                    }
                }
                _ => return Err("LibDiamondCut: Incorrect FacetCutAction".to_owned()),
            }
        }

        let init = init.clone().into_address().unwrap_or_default();
        let calldata = calldata.clone().into_bytes().unwrap_or_default();

        if init.is_zero() {
            if !calldata.is_empty() {
                return Err("LibDiamondCut: _init is address(0) but_calldata is not empty".to_owned());
            }
        } else {
            let iface = self
                .interface_at(state, init)
                .ok_or_else(|| "LibDiamondCut: _init address has no code".to_owned())?;
            let known = calldata_selector(&calldata)
                .map(|s| iface.signature_of(s).is_some())
                .unwrap_or_default();
            if !known {
                return Err("LibDiamondCut: _init function reverted".to_owned());
            }
        }

        Ok(router)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn deploy_contract(&self, contract: &str, args: Vec<Token>) -> anyhow::Result<Address> {
        if let Some(delay) = self.latency.get(contract) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(contract) {
            bail!("deployment of {contract} reverted");
        }

        if !self.contracts.contains_key(contract) {
            bail!("unknown contract: {contract}");
        }

        let mut state = self.state();

        let router = if contract == self.core_contract {
            let [Token::Address(owner), Token::Address(cut_facet)] = args.as_slice() else {
                bail!("{contract} expects (address owner, address diamondCutFacet)");
            };
            let cut_iface = self
                .interface_at(&state, *cut_facet)
                .ok_or_else(|| anyhow!("no contract at the cut facet address {cut_facet:?}"))?;
            Some(Router {
                owner: *owner,
                routes: all_selectors_of(cut_iface)
                    .into_iter()
                    .map(|s| (s, *cut_facet))
                    .collect(),
            })
        } else {
            None
        };

        let address = state.next_address();
        state.code.insert(address, contract.to_owned());
        if let Some(router) = router {
            state.diamonds.insert(address, router);
        }
        state.deployments.push(Deployment {
            contract: contract.to_owned(),
            address,
            args,
        });

        Ok(address)
    }

    async fn contract_interface(&self, contract: &str) -> anyhow::Result<ContractInterface> {
        self.contracts
            .get(contract)
            .cloned()
            .ok_or_else(|| anyhow!("unknown contract: {contract}"))
    }

    async fn send_call(&self, to: Address, data: Bytes) -> anyhow::Result<TxOutcome> {
        let mut state = self.state();
        let tx_hash = state.next_tx_hash();

        let success = match self.execute(&state, to, &data) {
            Ok(Some(router)) => {
                state.diamonds.insert(to, router);
                true
            }
            Ok(None) => true,
            Err(reason) => {
                tracing::debug!(?to, %reason, "transaction reverted");
                state.last_revert = Some(reason);
                false
            }
        };

        Ok(TxOutcome { tx_hash, success })
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let state = self.state();
        let selector = calldata_selector(&data);

        if let Some(router) = state.diamonds.get(&to) {
            let Some(selector) = selector.filter(|s| router.route(*s).is_some()) else {
                bail!("Diamond: Function does not exist");
            };
            return answer(router, selector, &data[4..]).map(Bytes::from);
        }

        match (self.interface_at(&state, to), selector) {
            (None, _) => Ok(Bytes::new()),
            (Some(iface), Some(s)) if iface.signature_of(s).is_some() => Ok(Bytes::new()),
            (Some(_), _) => bail!("function selector was not recognized"),
        }
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        let state = self.state();
        if state.code.contains_key(&address) {
            Ok(Bytes::from(vec![0xfe]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn transfer(&self, to: Address, value: U256) -> anyhow::Result<TxOutcome> {
        let mut state = self.state();
        let tx_hash = state.next_tx_hash();
        *state.balances.entry(to).or_default() += value;
        Ok(TxOutcome {
            tx_hash,
            success: true,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<TxOutcome> {
        let (name, address) = self
            .raw_deployments
            .get(raw.as_ref())
            .ok_or_else(|| anyhow!("failed to decode raw transaction"))?;

        let mut state = self.state();
        let tx_hash = state.next_tx_hash();

        // The pre-signed transaction can only be mined once.
        if state.code.contains_key(address) {
            state.last_revert = Some("nonce too low".to_owned());
            return Ok(TxOutcome {
                tx_hash,
                success: false,
            });
        }

        state.code.insert(*address, name.clone());
        state.deployments.push(Deployment {
            contract: name.clone(),
            address: *address,
            args: Vec::new(),
        });

        Ok(TxOutcome {
            tx_hash,
            success: true,
        })
    }

    fn sender(&self) -> Address {
        self.sender
    }
}

/// Plan deploying the standard diamond contracts with the given facets,
/// routing `supportsInterface` to the loupe facet if it's among them.
pub fn standard_plan(facets: &[&str]) -> DeploymentPlan {
    let shared = if facets.contains(&"DiamondLoupeFacet") {
        SharedSelectors::introspection("DiamondLoupeFacet").expect("valid signature")
    } else {
        SharedSelectors::new()
    };
    DeploymentPlan::new(
        DiamondContracts::default(),
        facets.iter().map(|f| f.to_string()).collect(),
        shared,
        FunctionSignature::parse("init()").expect("valid signature"),
    )
    .expect("valid plan")
}

/// Answer a read-only call routed by the diamond; loupe queries come from the routing table.
fn answer(router: &Router, selector: Selector, args: &[u8]) -> anyhow::Result<Vec<u8>> {
    let is = |sig: &str| selector_for(sig) == selector;

    if is(loupe::FACETS) {
        Ok(loupe::encode_facets(&router.facets()))
    } else if is(loupe::FACET_ADDRESSES) {
        let addresses = router.facets().iter().map(|f| f.address).collect::<Vec<_>>();
        Ok(loupe::encode_facet_addresses(&addresses))
    } else if is(loupe::FACET_ADDRESS) {
        let tokens = decode(&[ParamType::FixedBytes(4)], args)?;
        let queried = tokens
            .into_iter()
            .next()
            .and_then(Token::into_fixed_bytes)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .ok_or_else(|| anyhow!("expected bytes4"))?;
        let facet = router.route(Selector(queried)).unwrap_or_default();
        Ok(loupe::encode_facet_address(facet))
    } else if is(loupe::FACET_FUNCTION_SELECTORS) {
        let tokens = decode(&[ParamType::Address], args)?;
        let queried = tokens
            .into_iter()
            .next()
            .and_then(Token::into_address)
            .ok_or_else(|| anyhow!("expected address"))?;
        let selectors = router
            .facets()
            .into_iter()
            .find(|f| f.address == queried)
            .map(|f| f.selectors)
            .unwrap_or_default();
        Ok(loupe::encode_facet_function_selectors(&selectors))
    } else if is("owner()") {
        Ok(ethers::abi::encode(&[Token::Address(router.owner)]))
    } else {
        Ok(Vec::new())
    }
}

fn selector_for(signature: &str) -> Selector {
    selector(signature).expect("known signature")
}

fn diamond_cut_selector() -> Selector {
    selector_for(DIAMOND_CUT_SIGNATURE)
}

fn calldata_selector(data: &[u8]) -> Option<Selector> {
    data.get(..4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(Selector)
}

fn diamond_cut_params() -> Vec<ParamType> {
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

/// Decode a facet cut without the checks of [diamond_selectors::FacetCut],
/// so that invalid cuts reach the router.
fn raw_cut(token: Token) -> Option<(Address, u8, Vec<Selector>)> {
    let mut fields = token.into_tuple()?.into_iter();
    let facet = fields.next()?.into_address()?;
    let action = fields.next()?.into_uint()?;
    let selectors = fields
        .next()?
        .into_array()?
        .into_iter()
        .map(|t| {
            let bytes = <[u8; 4]>::try_from(t.into_fixed_bytes()?).ok()?;
            Some(Selector(bytes))
        })
        .collect::<Option<Vec<_>>>()?;
    let action = u8::try_from(action.low_u64()).unwrap_or(u8::MAX);
    Some((facet, action, selectors))
}
