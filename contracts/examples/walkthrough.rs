//! Walkthrough of a wallet's security lifecycle.
//!
//! Creates a wallet, adds guardians, locks it after a "lost phone", recovers
//! it to a new key, and finally swaps in a new lock manager with an
//! upgrader. Time is simulated with a manual clock.
//!
//! Run with:
//!   cargo run -p warden-contracts --example walkthrough
//!
//! Set `RUST_LOG=debug` to see every event as it is emitted.

use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::Duration;

use warden_contracts::guardian_manager::{GuardianManager, GuardianManagerCall};
use warden_contracts::ledger::{Asset, Ledger};
use warden_contracts::lock_manager::{LockManager, LockManagerCall};
use warden_contracts::recovery_manager::{RecoveryManager, RecoveryManagerCall};
use warden_contracts::relayer::{RefundInfo, RelayedCall, RelayerModule};
use warden_contracts::upgrader::Upgrader;
use warden_contracts::Module;
use warden_protocol::config::domain_name;
use warden_protocol::crypto::Keypair;
use warden_protocol::logging::{init_logging, LogFormat};
use warden_protocol::{Address, CoreConfig, ManualClock};

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]==================================================={RESET}");
    println!("{BOLD}  {title}{RESET}");
}

fn note(text: &str) {
    println!("{DIM}  >> {text}{RESET}");
}

fn ok(text: &str) {
    println!("{GREEN}  [ok]{RESET} {text}");
}

/// Sign and submit a relayed call at the wallet's next nonce.
fn relay(
    ledger: &mut Ledger,
    relayer: &RelayerModule,
    wallet: Address,
    module: Address,
    data: Vec<u8>,
    signers: &[&Keypair],
) -> Result<bool> {
    let nonce = relayer.nonce(ledger, &wallet)?;
    let domain = ledger.config().relay_domain;
    let call = RelayedCall::new(wallet, module, data, nonce)
        .with_refund(RefundInfo {
            gas_price: 1,
            gas_limit: 100_000,
            ..RefundInfo::default()
        })
        .sign(&relayer.address(), domain, signers);
    let submitter = Address::derive("account", "relayer-operator");
    Ok(relayer.execute(ledger, submitter, &call)?)
}

fn main() -> Result<()> {
    init_logging("warn", LogFormat::Pretty);

    // -----------------------------------------------------------------------
    section(1, "Deploy the core modules");
    // -----------------------------------------------------------------------
    let clock = ManualClock::starting_now();
    let registrar = Keypair::from_seed(&[0xAA; 32]);
    let config = CoreConfig::default();
    note(&format!("replay domain: {}", domain_name(config.relay_domain)));
    let mut ledger = Ledger::new(config, Arc::new(clock.clone()), registrar.address())?;

    let relayer = Arc::new(RelayerModule::new("RelayerModule"));
    let guardian_manager = Arc::new(GuardianManager::new("GuardianManager"));
    let lock_manager = Arc::new(LockManager::new("LockManager"));
    let recovery_manager = Arc::new(RecoveryManager::new("RecoveryManager"));
    let core: Vec<(Address, &str)> = vec![
        (ledger.deploy_module(relayer.clone()), "RelayerModule"),
        (ledger.deploy_module(guardian_manager.clone()), "GuardianManager"),
        (ledger.deploy_module(lock_manager.clone()), "LockManager"),
        (ledger.deploy_module(recovery_manager.clone()), "RecoveryManager"),
    ];
    for (address, name) in &core {
        ledger.register_module(registrar.address(), *address, name)?;
        ok(&format!("{name} registered at {}", address.short()));
    }
    let (gm, lm, rm) = (core[1].0, core[2].0, core[3].0);

    // -----------------------------------------------------------------------
    section(2, "Create and fund a wallet");
    // -----------------------------------------------------------------------
    let alice = Keypair::from_seed(&[1; 32]);
    let modules: Vec<Address> = core.iter().map(|(a, _)| *a).collect();
    let wallet = ledger.create_wallet(alice.address(), &modules)?;
    ledger.deposit(wallet, Asset::Native, 1_000_000)?;
    ok(&format!("wallet {} owned by alice {}", wallet.short(), alice.address().short()));

    // -----------------------------------------------------------------------
    section(3, "Add two guardians");
    // -----------------------------------------------------------------------
    let bob = Keypair::from_seed(&[2; 32]);
    let carol = Keypair::from_seed(&[3; 32]);
    for guardian in [&bob, &carol] {
        let data = GuardianManagerCall::AddGuardian {
            wallet,
            guardian: guardian.address(),
        }
        .encode()?;
        relay(&mut ledger, &relayer, wallet, gm, data, &[&alice])?;
    }
    note("bob is active at once; carol waits out the security period");
    clock.advance(Duration::hours(24));
    let data = GuardianManagerCall::ConfirmGuardianAddition {
        wallet,
        guardian: carol.address(),
    }
    .encode()?;
    relay(&mut ledger, &relayer, wallet, gm, data, &[&alice])?;
    ensure!(ledger.guardian_count(&wallet) == 2, "expected two guardians");
    ok("bob and carol guard the wallet");

    // -----------------------------------------------------------------------
    section(4, "Alice loses her phone: bob locks the wallet");
    // -----------------------------------------------------------------------
    ledger.call(bob.address(), lm, &LockManagerCall::Lock { wallet }.encode()?)?;
    ok(&format!(
        "locked until unix time {}",
        lock_manager.get_lock(&ledger, &wallet)
    ));

    // -----------------------------------------------------------------------
    section(5, "Guardians recover the wallet to a new key");
    // -----------------------------------------------------------------------
    let alice_new = Keypair::from_seed(&[4; 32]);
    note("a lock blocks recovery; bob lifts his lock first");
    relay(
        &mut ledger,
        &relayer,
        wallet,
        lm,
        LockManagerCall::Unlock { wallet }.encode()?,
        &[&bob],
    )?;
    let data = RecoveryManagerCall::ExecuteRecovery {
        wallet,
        recovery: alice_new.address(),
    }
    .encode()?;
    let executed = relay(&mut ledger, &relayer, wallet, rm, data, &[&bob, &carol])?;
    ensure!(executed, "recovery did not start");
    ok(&format!(
        "recovery {}",
        recovery_manager.recovery_state(&ledger, &wallet)?
    ));

    clock.advance(Duration::hours(36));
    ledger.call(
        Address::derive("account", "anyone"),
        rm,
        &RecoveryManagerCall::FinalizeRecovery { wallet }.encode()?,
    )?;
    ensure!(ledger.owner(&wallet)? == alice_new.address(), "owner not replaced");
    ok(&format!("new owner {}", alice_new.address().short()));

    // -----------------------------------------------------------------------
    section(6, "Swap in a new lock manager");
    // -----------------------------------------------------------------------
    let lm2 = ledger.deploy_module(Arc::new(LockManager::new("LockManager-v2")));
    ledger.register_module(registrar.address(), lm2, "LockManager-v2")?;
    let upgrader = ledger.deploy_module(Arc::new(Upgrader::new("lock-v1-to-v2", &[lm], &[lm2])));
    ledger.register_upgrader(registrar.address(), upgrader, "lock-v1-to-v2")?;
    let data = GuardianManagerCall::AddModule {
        wallet,
        module: upgrader,
    }
    .encode()?;
    relay(&mut ledger, &relayer, wallet, gm, data, &[&alice_new])?;
    ensure!(ledger.is_authorised(&wallet, &lm2), "upgrade did not apply");
    ensure!(!ledger.is_authorised(&wallet, &upgrader), "upgrader still present");
    ok(&format!("modules: {}", ledger.modules(&wallet).len()));

    // -----------------------------------------------------------------------
    section(7, "Summary");
    // -----------------------------------------------------------------------
    let submitter = Address::derive("account", "relayer-operator");
    note(&format!(
        "relayed calls: {}, refunds paid: {}",
        relayer.nonce(&ledger, &wallet)?,
        ledger.balance(&submitter, Asset::Native)
    ));
    note(&format!("events emitted: {}", ledger.events().len()));
    for event in ledger.events() {
        println!("    {}", event.name());
    }
    Ok(())
}
