//! # Ledger
//!
//! The execution substrate every wallet, module and registry lives on. It
//! plays the role a chain plays for on-chain wallets:
//!
//! - **State**: registry, wallets, guardian store, per-module storage and
//!   asset balances, bundled in a cloneable [`WorldState`].
//! - **Code**: deployed modules (`Arc<dyn Module>`) and external contracts.
//! - **Atomicity**: every top-level entry runs in a checkpointed frame.
//!   If it fails, state and the event log are restored exactly. The relayer
//!   opens a nested frame around the inner call so that only the inner call
//!   rolls back while the nonce and refund stay committed.
//! - **Reentrancy**: a per-wallet in-progress flag. A second top-level entry
//!   for a wallet that is mid-call fails with [`WalletError::Reentrancy`].
//! - **Serialization**: `&mut Ledger` admits one call at a time. Threads
//!   share a [`SharedLedger`] and take the lock per call.
//!
//! Modules never touch the ledger directly; they get a [`CallContext`] whose
//! every wallet and guardian mutation is checked against the module's
//! identity.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use warden_protocol::config::{ConfigError, CoreConfig};
use warden_protocol::{Address, Clock};

use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::guardian_store::GuardianStore;
use crate::module::{Caller, Module, SignerSet};
use crate::registry::{ModuleKind, ModuleRegistry};
use crate::wallet::{WalletLock, WalletState};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A transferable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Token(Address),
}

/// Key/value storage owned by one module.
pub type ModuleStorage = BTreeMap<Vec<u8>, Vec<u8>>;

/// Everything a failed frame must roll back.
#[derive(Debug, Clone)]
pub struct WorldState {
    registry: ModuleRegistry,
    wallets: HashMap<Address, WalletState>,
    guardians: GuardianStore,
    storage: HashMap<Address, ModuleStorage>,
    balances: HashMap<(Address, Asset), u64>,
}

/// Code living at an address that is not a module: the destination of
/// `Wallet.execute`.
pub trait ExternalContract: Send + Sync {
    /// Handle a call from `from` carrying `value` of the native asset (already
    /// credited).
    fn on_call(
        &self,
        ctx: &mut ExternalContext<'_>,
        from: Address,
        value: u64,
        data: &[u8],
    ) -> Result<(), WalletError>;
}

/// What an external contract can do while handling a call.
pub struct ExternalContext<'a> {
    ledger: &'a mut Ledger,
    this: Address,
}

impl ExternalContext<'_> {
    pub fn this(&self) -> Address {
        self.this
    }

    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    /// Call a module as this contract. Subject to the same reentrancy guard
    /// as any other top-level call.
    pub fn call_module(&mut self, module: Address, data: &[u8]) -> Result<(), WalletError> {
        self.ledger.call(self.this, module, data)
    }
}

pub type SharedLedger = Arc<Mutex<Ledger>>;

pub struct Ledger {
    state: WorldState,
    modules: HashMap<Address, Arc<dyn Module>>,
    contracts: HashMap<Address, Arc<dyn ExternalContract>>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
    events: Vec<WalletEvent>,
    entered: HashSet<Address>,
    wallets_created: u64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

impl Ledger {
    /// Create an empty ledger whose module registry is owned by
    /// `registry_owner`.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `config` is insecure.
    pub fn new(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        registry_owner: Address,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: WorldState {
                registry: ModuleRegistry::new(registry_owner),
                wallets: HashMap::new(),
                guardians: GuardianStore::default(),
                storage: HashMap::new(),
                balances: HashMap::new(),
            },
            modules: HashMap::new(),
            contracts: HashMap::new(),
            clock,
            config,
            events: Vec::new(),
            entered: HashSet::new(),
            wallets_created: 0,
        })
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ----- Deployment -----

    /// Make a module's code callable at its address. Registration in the
    /// registry is a separate step taken by the registry owner.
    pub fn deploy_module(&mut self, module: Arc<dyn Module>) -> Address {
        let address = module.address();
        debug!(module = %address, name = module.name(), "module deployed");
        self.modules.insert(address, module);
        address
    }

    pub fn deploy_contract(&mut self, address: Address, contract: Arc<dyn ExternalContract>) {
        self.contracts.insert(address, contract);
    }

    /// The module deployed at `address`.
    pub fn module(&self, address: &Address) -> Result<Arc<dyn Module>, WalletError> {
        self.modules
            .get(address)
            .cloned()
            .ok_or(WalletError::UnknownModule)
    }

    // ----- Registry -----

    pub fn registry(&self) -> &ModuleRegistry {
        &self.state.registry
    }

    pub fn register_module(
        &mut self,
        caller: Address,
        module: Address,
        name: &str,
    ) -> Result<(), WalletError> {
        self.register(caller, module, name, ModuleKind::Module)
    }

    pub fn register_upgrader(
        &mut self,
        caller: Address,
        upgrader: Address,
        name: &str,
    ) -> Result<(), WalletError> {
        self.register(caller, upgrader, name, ModuleKind::Upgrader)
    }

    pub fn deregister_module(&mut self, caller: Address, module: Address) -> Result<(), WalletError> {
        self.state.registry.deregister(caller, module)?;
        info!(module = %module, "module deregistered");
        self.emit(WalletEvent::ModuleDeregistered { module });
        Ok(())
    }

    pub fn change_registry_owner(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), WalletError> {
        self.state.registry.change_owner(caller, new_owner)?;
        info!(owner = %new_owner, "registry owner changed");
        Ok(())
    }

    fn register(
        &mut self,
        caller: Address,
        module: Address,
        name: &str,
        kind: ModuleKind,
    ) -> Result<(), WalletError> {
        let now = self.now();
        self.state.registry.register(caller, module, name, kind, now)?;
        info!(module = %module, name, %kind, "module registered");
        self.emit(WalletEvent::ModuleRegistered {
            module,
            name: name.to_string(),
            upgrader: kind == ModuleKind::Upgrader,
        });
        Ok(())
    }

    // ----- Wallets -----

    /// Create and initialise a wallet at a fresh address.
    pub fn create_wallet(
        &mut self,
        owner: Address,
        modules: &[Address],
    ) -> Result<Address, WalletError> {
        let label = format!("{}:{}", owner.to_hex(), self.wallets_created);
        let wallet = Address::derive("wallet", &label);
        self.init_wallet(wallet, owner, modules)?;
        self.wallets_created += 1;
        Ok(wallet)
    }

    /// One-time initialisation of the wallet at `wallet`.
    ///
    /// Each module is authorised in the order given (duplicates skipped),
    /// then each module's `init` hook runs. Any failure leaves no trace.
    ///
    /// # Errors
    ///
    /// - [`WalletError::AlreadyInitialised`] for an existing wallet.
    /// - [`WalletError::NullOwner`], [`WalletError::ZeroModules`] or
    ///   [`WalletError::ModulesNotRegistered`] for bad arguments.
    /// - [`WalletError::UnknownModule`] if a module has no deployed code.
    pub fn init_wallet(
        &mut self,
        wallet: Address,
        owner: Address,
        modules: &[Address],
    ) -> Result<(), WalletError> {
        self.with_entered(wallet, |ledger| {
            ledger.atomically(|ledger| {
                if ledger.state.wallets.contains_key(&wallet) {
                    return Err(WalletError::AlreadyInitialised);
                }
                let state = WalletState::init(owner, modules, &ledger.state.registry)?;
                ledger.state.wallets.insert(wallet, state);
                ledger.emit(WalletEvent::WalletCreated { wallet, owner });

                let mut ordered: Vec<Address> = Vec::with_capacity(modules.len());
                for module in modules {
                    if !ordered.contains(module) {
                        ordered.push(*module);
                    }
                }
                for module in &ordered {
                    ledger.emit(WalletEvent::AuthorisedModule {
                        wallet,
                        module: *module,
                        value: true,
                    });
                }
                for module in ordered {
                    let code = ledger.module(&module)?;
                    let mut ctx = CallContext::new(ledger, Caller::Account(owner), module);
                    code.init(&mut ctx, wallet)?;
                }
                info!(wallet = %wallet, owner = %owner, "wallet initialised");
                Ok(())
            })
        })
    }

    pub fn wallet(&self, wallet: &Address) -> Result<&WalletState, WalletError> {
        self.state
            .wallets
            .get(wallet)
            .ok_or(WalletError::UnknownWallet)
    }

    pub fn wallet_exists(&self, wallet: &Address) -> bool {
        self.state.wallets.contains_key(wallet)
    }

    pub fn owner(&self, wallet: &Address) -> Result<Address, WalletError> {
        Ok(self.wallet(wallet)?.owner())
    }

    pub fn is_authorised(&self, wallet: &Address, module: &Address) -> bool {
        self.state
            .wallets
            .get(wallet)
            .is_some_and(|w| w.is_authorised(module))
    }

    pub fn modules(&self, wallet: &Address) -> Vec<Address> {
        self.state
            .wallets
            .get(wallet)
            .map(|w| w.modules().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_locked(&self, wallet: &Address) -> bool {
        self.lock(wallet).is_some()
    }

    /// The wallet's lock if it is active now.
    pub fn lock(&self, wallet: &Address) -> Option<WalletLock> {
        let now = self.now();
        self.state
            .wallets
            .get(wallet)
            .and_then(|w| w.active_lock(now))
    }

    /// Release time of the active lock in Unix seconds, `0` if unlocked.
    pub fn lock_release_time(&self, wallet: &Address) -> u64 {
        let now = self.now();
        self.state
            .wallets
            .get(wallet)
            .map(|w| w.lock_release_time(now))
            .unwrap_or(0)
    }

    // ----- Guardians -----

    pub fn guardians(&self, wallet: &Address) -> &[Address] {
        self.state.guardians.guardians(wallet)
    }

    pub fn is_guardian(&self, wallet: &Address, candidate: &Address) -> bool {
        self.state.guardians.is_guardian(wallet, candidate)
    }

    pub fn guardian_count(&self, wallet: &Address) -> usize {
        self.state.guardians.guardian_count(wallet)
    }

    /// The guardian `signer` acts for on `wallet`: itself, or a wallet
    /// guardian it owns.
    pub fn resolve_guardian(&self, wallet: &Address, signer: &Address) -> Option<Address> {
        let wallets = &self.state.wallets;
        self.state
            .guardians
            .resolve_signer(wallet, signer, |w| wallets.get(w).map(WalletState::owner))
    }

    // ----- Balances -----

    pub fn balance(&self, account: &Address, asset: Asset) -> u64 {
        self.state
            .balances
            .get(&(*account, asset))
            .copied()
            .unwrap_or(0)
    }

    /// Credit an account out of thin air. The ledger has no minting policy;
    /// embedders decide who may fund what.
    pub fn deposit(&mut self, account: Address, asset: Asset, amount: u64) -> Result<(), WalletError> {
        let balance = self.state.balances.entry((account, asset)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(WalletError::Overflow)?;
        Ok(())
    }

    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: Asset,
        amount: u64,
    ) -> Result<(), WalletError> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.balance(&from, asset);
        let remaining = available
            .checked_sub(amount)
            .ok_or(WalletError::InsufficientFunds {
                required: amount,
                available,
            })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(&to, asset)
            .checked_add(amount)
            .ok_or(WalletError::Overflow)?;
        self.state.balances.insert((from, asset), remaining);
        self.state.balances.insert((to, asset), credited);
        Ok(())
    }

    // ----- Events -----

    pub fn events(&self) -> &[WalletEvent] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<WalletEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: WalletEvent) {
        debug!(event = event.name(), wallet = ?event.wallet(), "event emitted");
        self.events.push(event);
    }

    // ----- Module storage -----

    pub(crate) fn load<T: DeserializeOwned>(
        &self,
        module: &Address,
        key: &[u8],
    ) -> Result<Option<T>, WalletError> {
        let Some(raw) = self.state.storage.get(module).and_then(|s| s.get(key)) else {
            return Ok(None);
        };
        bincode::deserialize(raw)
            .map(Some)
            .map_err(|e| WalletError::InvalidCallData(format!("corrupt module storage: {e}")))
    }

    pub(crate) fn store<T: Serialize>(
        &mut self,
        module: Address,
        key: Vec<u8>,
        value: &T,
    ) -> Result<(), WalletError> {
        let raw = bincode::serialize(value).map_err(|e| WalletError::Encoding(e.to_string()))?;
        self.state.storage.entry(module).or_default().insert(key, raw);
        Ok(())
    }

    pub(crate) fn erase(&mut self, module: &Address, key: &[u8]) {
        if let Some(storage) = self.state.storage.get_mut(module) {
            storage.remove(key);
        }
    }

    // ----- Execution -----

    /// Direct call from `sender` into `module`.
    ///
    /// Atomic: on error nothing the call did survives.
    pub fn call(&mut self, sender: Address, module: Address, data: &[u8]) -> Result<(), WalletError> {
        let wallet = self.module(&module)?.target_wallet(data)?;
        self.with_entered(wallet, |ledger| {
            ledger.atomically(|ledger| ledger.dispatch(Caller::Account(sender), module, data))
        })
    }

    /// Run `data` against `module` as `caller`, without opening a frame.
    pub(crate) fn dispatch(
        &mut self,
        caller: Caller,
        module: Address,
        data: &[u8],
    ) -> Result<(), WalletError> {
        let code = self.module(&module)?;
        let wallet = code.target_wallet(data)?;
        if !self.wallet_exists(&wallet) {
            return Err(WalletError::UnknownWallet);
        }
        if !self.is_authorised(&wallet, &module) {
            return Err(WalletError::ModuleNotAuthorised);
        }
        let mut ctx = CallContext::new(self, caller, module);
        code.execute(&mut ctx, data)
    }

    /// Run `f` in a checkpointed frame: on error, state and events are
    /// restored to what they were before `f` ran.
    pub(crate) fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let checkpoint = self.state.clone();
        let event_mark = self.events.len();
        let result = f(self);
        if result.is_err() {
            self.state = checkpoint;
            self.events.truncate(event_mark);
        }
        result
    }

    /// Mark `wallet` as mid-call for the duration of `f`.
    pub(crate) fn with_entered<T>(
        &mut self,
        wallet: Address,
        f: impl FnOnce(&mut Self) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        if !self.entered.insert(wallet) {
            return Err(WalletError::Reentrancy);
        }
        let result = f(self);
        self.entered.remove(&wallet);
        result
    }
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// The capability-checked view of the ledger a module gets while it runs.
///
/// Mutations are performed *as* `module`: the wallet and guardian store
/// refuse them unless the wallet has authorised that module.
pub struct CallContext<'a> {
    ledger: &'a mut Ledger,
    caller: Caller,
    module: Address,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(ledger: &'a mut Ledger, caller: Caller, module: Address) -> Self {
        Self {
            ledger,
            caller,
            module,
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Address of the module this context acts as.
    pub fn module(&self) -> Address {
        self.module
    }

    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ledger.now()
    }

    pub fn config(&self) -> &CoreConfig {
        self.ledger.config()
    }

    // ----- Caller checks -----

    /// Caller is the wallet owner, or a relayed call whose policy the relayer
    /// already enforced.
    pub fn require_owner(&self, wallet: &Address) -> Result<(), WalletError> {
        if self.caller.is_relayed_for(wallet) {
            return Ok(());
        }
        let owner = self.ledger.owner(wallet)?;
        match self.caller {
            Caller::Account(account) if account == owner => Ok(()),
            _ => Err(WalletError::NotOwner),
        }
    }

    /// Caller is a guardian (directly or as owner of a wallet guardian), or a
    /// relayed call for this wallet.
    pub fn require_guardian(&self, wallet: &Address) -> Result<(), WalletError> {
        if self.caller.is_relayed_for(wallet) {
            return Ok(());
        }
        match &self.caller {
            Caller::Account(account) if self.ledger.resolve_guardian(wallet, account).is_some() => {
                Ok(())
            }
            _ => Err(WalletError::NotGuardian),
        }
    }

    /// Caller must be a relayed call for this wallet. Returns the verified
    /// signers.
    pub fn require_relayed(&self, wallet: &Address) -> Result<SignerSet, WalletError> {
        match &self.caller {
            Caller::Relayed {
                wallet: w, signers, ..
            } if w == wallet => Ok(signers.clone()),
            _ => Err(WalletError::RelayOnly),
        }
    }

    pub fn require_unlocked(&self, wallet: &Address) -> Result<(), WalletError> {
        if self.ledger.is_locked(wallet) {
            Err(WalletError::WalletLocked)
        } else {
            Ok(())
        }
    }

    // ----- Wallet gate -----

    /// `Wallet.authoriseModule` as this module. Adding a module runs its
    /// `init` hook.
    pub fn authorise_module(
        &mut self,
        wallet: Address,
        module: Address,
        value: bool,
    ) -> Result<(), WalletError> {
        let caller_module = self.module;
        let WorldState {
            wallets, registry, ..
        } = &mut self.ledger.state;
        let state = wallets.get_mut(&wallet).ok_or(WalletError::UnknownWallet)?;
        let changed = state.authorise(&caller_module, module, value, registry)?;
        if !changed {
            return Ok(());
        }
        info!(wallet = %wallet, module = %module, value, "module authorisation changed");
        self.ledger.emit(WalletEvent::AuthorisedModule {
            wallet,
            module,
            value,
        });
        if value {
            let code = self.ledger.module(&module)?;
            let mut inner = CallContext::new(&mut *self.ledger, self.caller.clone(), module);
            code.init(&mut inner, wallet)?;
        }
        Ok(())
    }

    /// `Wallet.setOwner` as this module.
    pub fn set_owner(&mut self, wallet: Address, new_owner: Address) -> Result<(), WalletError> {
        let caller_module = self.module;
        self.wallet_mut(&wallet)?.set_owner(&caller_module, new_owner)?;
        self.ledger.emit(WalletEvent::OwnerChanged { wallet, new_owner });
        Ok(())
    }

    /// `Wallet.setLock` as this module.
    pub fn set_lock(&mut self, wallet: Address, release_after: DateTime<Utc>) -> Result<(), WalletError> {
        let caller_module = self.module;
        let now = self.now();
        self.wallet_mut(&wallet)?.set_lock(&caller_module, release_after, now)
    }

    /// `Wallet.clearLock` as this module.
    pub fn clear_lock(&mut self, wallet: Address) -> Result<(), WalletError> {
        let caller_module = self.module;
        let now = self.now();
        self.wallet_mut(&wallet)?.clear_lock(&caller_module, now)
    }

    /// `Wallet.execute` as this module: move `value` of the native asset to
    /// `target` and, if code lives there, call it.
    ///
    /// # Errors
    ///
    /// [`WalletError::ForbiddenDestination`] when `target` is the wallet
    /// itself or one of its modules.
    pub fn invoke(
        &mut self,
        wallet: Address,
        target: Address,
        value: u64,
        data: Vec<u8>,
    ) -> Result<(), WalletError> {
        let state = self.ledger.wallet(&wallet)?;
        state.require_module(&self.module)?;
        if target == wallet || state.is_authorised(&target) {
            return Err(WalletError::ForbiddenDestination);
        }
        self.ledger.transfer(wallet, target, Asset::Native, value)?;
        self.ledger.emit(WalletEvent::Invoked {
            wallet,
            target,
            value,
            data: data.clone(),
        });
        if let Some(contract) = self.ledger.contracts.get(&target).cloned() {
            let mut ext = ExternalContext {
                ledger: &mut *self.ledger,
                this: target,
            };
            contract.on_call(&mut ext, wallet, value, &data)?;
        }
        Ok(())
    }

    fn wallet_mut(&mut self, wallet: &Address) -> Result<&mut WalletState, WalletError> {
        self.ledger
            .state
            .wallets
            .get_mut(wallet)
            .ok_or(WalletError::UnknownWallet)
    }

    // ----- Guardian store gate -----

    pub fn add_guardian(&mut self, wallet: Address, guardian: Address) -> Result<bool, WalletError> {
        let caller_module = self.module;
        let WorldState {
            wallets, guardians, ..
        } = &mut self.ledger.state;
        let state = wallets.get(&wallet).ok_or(WalletError::UnknownWallet)?;
        guardians.add_guardian(&wallet, state, &caller_module, guardian)
    }

    pub fn revoke_guardian(&mut self, wallet: Address, guardian: Address) -> Result<bool, WalletError> {
        let caller_module = self.module;
        let WorldState {
            wallets, guardians, ..
        } = &mut self.ledger.state;
        let state = wallets.get(&wallet).ok_or(WalletError::UnknownWallet)?;
        guardians.revoke_guardian(&wallet, state, &caller_module, &guardian)
    }

    // ----- Storage and events -----

    /// Read from this module's storage.
    pub fn load<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, WalletError> {
        self.ledger.load(&self.module, key)
    }

    /// Write to this module's storage.
    pub fn store<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), WalletError> {
        self.ledger.store(self.module, key, value)
    }

    pub fn erase(&mut self, key: &[u8]) {
        let module = self.module;
        self.ledger.erase(&module, key);
    }

    pub fn emit(&mut self, event: WalletEvent) {
        self.ledger.emit(event);
    }
}

/// Storage key for a per-wallet record, optionally qualified by a subject.
pub fn storage_key(namespace: &str, wallet: &Address, subject: Option<&Address>) -> Vec<u8> {
    let mut key = Vec::with_capacity(namespace.len() + 65);
    key.extend_from_slice(namespace.as_bytes());
    key.push(b'/');
    key.extend_from_slice(wallet.as_bytes());
    if let Some(subject) = subject {
        key.extend_from_slice(subject.as_bytes());
    }
    key
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
