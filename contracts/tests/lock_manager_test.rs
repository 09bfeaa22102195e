//! Integration tests for the lock manager: guardian locks, auto-expiry,
//! lock ownership and contract guardians.

mod common;

use chrono::Duration;
use common::{keypair, Fixture};
use warden_contracts::guardian_manager::GuardianManagerCall;
use warden_contracts::lock_manager::LockManagerCall;
use warden_contracts::recovery_manager::RecoveryManagerCall;
use warden_contracts::{WalletError, WalletEvent};
use warden_protocol::Address;

fn lock(fx: &Fixture) -> Vec<u8> {
    LockManagerCall::Lock { wallet: fx.wallet }.encode().unwrap()
}

fn unlock(fx: &Fixture) -> Vec<u8> {
    LockManagerCall::Unlock { wallet: fx.wallet }.encode().unwrap()
}

// ---------------------------------------------------------------------------
// Direct calls
// ---------------------------------------------------------------------------

#[test]
fn wallet_starts_unlocked() {
    let fx = Fixture::new();
    assert!(!fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));
    assert_eq!(fx.lock_manager.get_lock(&fx.ledger, &fx.wallet), 0);
}

#[test]
fn guardian_locks_and_unlocks() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let (lm, data) = (fx.lm(), lock(&fx));
    fx.ledger.call(guardians[0].address(), lm, &data).unwrap();
    assert!(fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));
    assert_eq!(fx.lock_manager.locked_by(&fx.ledger, &fx.wallet), Some(lm));

    let data = unlock(&fx);
    fx.ledger.call(guardians[0].address(), lm, &data).unwrap();
    assert!(!fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));

    let events = fx.ledger.take_events();
    assert!(matches!(events[0], WalletEvent::Locked { .. }));
    assert_eq!(events[1], WalletEvent::Unlocked { wallet: fx.wallet });
}

#[test]
fn lock_expires_after_lock_period() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let (lm, data) = (fx.lm(), lock(&fx));
    let locked_at = fx.ledger.now();
    fx.ledger.call(guardians[0].address(), lm, &data).unwrap();

    let expected = locked_at + fx.ledger.config().lock_period();
    assert_eq!(
        fx.lock_manager.get_lock(&fx.ledger, &fx.wallet),
        expected.timestamp() as u64
    );

    fx.advance(Duration::days(5) - Duration::seconds(1));
    assert!(fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));

    fx.advance(Duration::seconds(1));
    assert!(!fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));
    assert_eq!(fx.lock_manager.get_lock(&fx.ledger, &fx.wallet), 0);
}

#[test]
fn non_guardian_cannot_lock() {
    let mut fx = Fixture::new();
    fx.add_guardians(1);
    let (lm, data) = (fx.lm(), lock(&fx));
    let stranger = Address::derive("account", "stranger");
    assert_eq!(
        fx.ledger.call(stranger, lm, &data),
        Err(WalletError::NotGuardian)
    );
    let owner = fx.owner.address();
    assert_eq!(fx.ledger.call(owner, lm, &data), Err(WalletError::NotGuardian));
}

#[test]
fn cannot_lock_twice() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(2);
    let (lm, data) = (fx.lm(), lock(&fx));
    fx.ledger.call(guardians[0].address(), lm, &data).unwrap();
    let err = fx.ledger.call(guardians[1].address(), lm, &data).unwrap_err();
    assert_eq!(err, WalletError::AlreadyLocked);
    assert_eq!(err.to_string(), "wallet must be unlocked");
}

#[test]
fn cannot_unlock_an_unlocked_wallet() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let (lm, data) = (fx.lm(), unlock(&fx));
    let err = fx.ledger.call(guardians[0].address(), lm, &data).unwrap_err();
    assert_eq!(err, WalletError::NotLocked);
    assert_eq!(err.to_string(), "wallet must be locked");
}

#[test]
fn locked_wallet_refuses_guardian_changes() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let (lm, data) = (fx.lm(), lock(&fx));
    fx.ledger.call(guardians[0].address(), lm, &data).unwrap();

    let add = GuardianManagerCall::AddGuardian {
        wallet: fx.wallet,
        guardian: keypair(40).address(),
    };
    let (owner, gm) = (fx.owner.address(), fx.gm());
    assert_eq!(
        fx.ledger.call(owner, gm, &add.encode().unwrap()),
        Err(WalletError::WalletLocked)
    );
}

#[test]
fn cannot_unlock_a_recovery_lock() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let execute = RecoveryManagerCall::ExecuteRecovery {
        wallet: fx.wallet,
        recovery: keypair(60).address(),
    };
    let rm = fx.rm();
    assert_eq!(fx.relay(rm, execute.encode().unwrap(), &[&guardians[0]]), Ok(true));
    assert!(fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));

    let (lm, data) = (fx.lm(), unlock(&fx));
    let err = fx.ledger.call(guardians[0].address(), lm, &data).unwrap_err();
    assert_eq!(err, WalletError::LockedByOtherModule);
    assert_eq!(
        err.to_string(),
        "cannot unlock a wallet that was locked by another module"
    );
}

// ---------------------------------------------------------------------------
// Relayed calls
// ---------------------------------------------------------------------------

#[test]
fn guardian_locks_and_unlocks_through_relayer() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let lm = fx.lm();
    assert_eq!(fx.relay(lm, lock(&fx), &[&guardians[0]]), Ok(true));
    assert!(fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));

    // Unlock is allowed while locked.
    assert_eq!(fx.relay(lm, unlock(&fx), &[&guardians[0]]), Ok(true));
    assert!(!fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));
}

#[test]
fn relayed_lock_while_locked_is_rejected_before_signatures() {
    let mut fx = Fixture::new();
    let guardians = fx.add_guardians(1);
    let lm = fx.lm();
    fx.relay(lm, lock(&fx), &[&guardians[0]]).unwrap();
    let nonce = fx.next_nonce();
    assert_eq!(
        fx.relay(lm, lock(&fx), &[&guardians[0]]),
        Err(WalletError::WalletLocked)
    );
    assert_eq!(fx.next_nonce(), nonce);
}

#[test]
fn non_guardian_signature_is_invalid() {
    let mut fx = Fixture::new();
    fx.add_guardians(1);
    let lm = fx.lm();
    let stranger = keypair(99);
    let err = fx.relay(lm, lock(&fx), &[&stranger]).unwrap_err();
    assert_eq!(err, WalletError::InvalidSignatures);
    assert_eq!(err.to_string(), "Invalid signatures");
}

#[test]
fn owner_signature_cannot_lock() {
    let mut fx = Fixture::new();
    fx.add_guardians(1);
    let lm = fx.lm();
    let owner = fx.owner.clone();
    assert_eq!(
        fx.relay(lm, lock(&fx), &[&owner]),
        Err(WalletError::PolicyNotSatisfied)
    );
}

// ---------------------------------------------------------------------------
// Contract guardians
// ---------------------------------------------------------------------------

/// Make a second wallet, owned by `guardian_owner`, the wallet's guardian.
fn add_wallet_guardian(fx: &mut Fixture, guardian_owner: Address) -> Address {
    let modules = fx.module_addresses();
    let guardian_wallet = fx.ledger.create_wallet(guardian_owner, &modules).unwrap();
    let add = GuardianManagerCall::AddGuardian {
        wallet: fx.wallet,
        guardian: guardian_wallet,
    };
    let (owner, gm) = (fx.owner.address(), fx.gm());
    fx.ledger.call(owner, gm, &add.encode().unwrap()).unwrap();
    guardian_wallet
}

#[test]
fn wallet_guardian_acts_through_its_owner() {
    let mut fx = Fixture::new();
    let guardian_owner = keypair(70);
    add_wallet_guardian(&mut fx, guardian_owner.address());

    let (lm, data) = (fx.lm(), lock(&fx));
    fx.ledger.call(guardian_owner.address(), lm, &data).unwrap();
    assert!(fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));

    assert_eq!(fx.relay(lm, unlock(&fx), &[&guardian_owner]), Ok(true));
    assert!(!fx.lock_manager.is_locked(&fx.ledger, &fx.wallet));
}

#[test]
fn unrelated_key_cannot_act_for_wallet_guardian() {
    let mut fx = Fixture::new();
    add_wallet_guardian(&mut fx, keypair(70).address());
    let lm = fx.lm();
    assert_eq!(
        fx.relay(lm, lock(&fx), &[&keypair(71)]),
        Err(WalletError::InvalidSignatures)
    );
}
