// Relayer benchmarks for the Warden authorization core.
//
// Covers sign-hash computation, owner-signed relayed dispatch, and guardian
// quorum verification for recovery at several guardian-set sizes.

use std::sync::Arc;

use chrono::Duration;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use warden_contracts::guardian_manager::{GuardianManager, GuardianManagerCall};
use warden_contracts::ledger::Ledger;
use warden_contracts::lock_manager::LockManager;
use warden_contracts::module::guardian_majority;
use warden_contracts::recovery_manager::{RecoveryManager, RecoveryManagerCall};
use warden_contracts::relayer::{RelayedCall, RelayerModule};
use warden_contracts::Module;
use warden_protocol::crypto::Keypair;
use warden_protocol::{Address, CoreConfig, ManualClock};

struct World {
    ledger: Ledger,
    relayer: Arc<RelayerModule>,
    gm: Address,
    rm: Address,
    owner: Keypair,
    wallet: Address,
    guardians: Vec<Keypair>,
}

/// A ledger with the core modules and one wallet guarded by `n` guardians.
fn setup_world(n: usize) -> World {
    let clock = ManualClock::starting_now();
    let registrar = Address::derive("account", "registrar");
    let mut ledger = Ledger::new(CoreConfig::default(), Arc::new(clock.clone()), registrar).unwrap();

    let relayer = Arc::new(RelayerModule::new("RelayerModule"));
    let modules = vec![
        ledger.deploy_module(relayer.clone()),
        ledger.deploy_module(Arc::new(GuardianManager::new("GuardianManager"))),
        ledger.deploy_module(Arc::new(LockManager::new("LockManager"))),
        ledger.deploy_module(Arc::new(RecoveryManager::new("RecoveryManager"))),
    ];
    for (i, module) in modules.iter().enumerate() {
        ledger
            .register_module(registrar, *module, &format!("core-{i}"))
            .unwrap();
    }
    let (gm, rm) = (modules[1], modules[3]);

    let owner = Keypair::from_seed(&[1; 32]);
    let wallet = ledger.create_wallet(owner.address(), &modules).unwrap();

    let guardians: Vec<Keypair> = (0..n)
        .map(|i| Keypair::from_seed(&[(i + 10) as u8; 32]))
        .collect();
    for g in &guardians {
        let call = GuardianManagerCall::AddGuardian {
            wallet,
            guardian: g.address(),
        };
        ledger.call(owner.address(), gm, &call.encode().unwrap()).unwrap();
    }
    clock.advance(Duration::days(1));
    for g in guardians.iter().skip(1) {
        let call = GuardianManagerCall::ConfirmGuardianAddition {
            wallet,
            guardian: g.address(),
        };
        ledger.call(owner.address(), gm, &call.encode().unwrap()).unwrap();
    }
    ledger.take_events();

    World {
        ledger,
        relayer,
        gm,
        rm,
        owner,
        wallet,
        guardians,
    }
}

fn bench_sign_hash(c: &mut Criterion) {
    let call = RelayedCall::new(
        Address::derive("wallet", "bench"),
        Address::derive("module", "GuardianManager"),
        vec![0xAB; 128],
        42,
    );
    let relayer = Address::derive("module", "RelayerModule");

    c.bench_function("relay/sign_hash", |b| {
        b.iter(|| call.sign_hash(&relayer, 1));
    });
}

fn bench_owner_relay(c: &mut Criterion) {
    c.bench_function("relay/owner_add_guardian", |b| {
        b.iter_batched(
            || {
                let world = setup_world(0);
                let domain = world.ledger.config().relay_domain;
                let data = GuardianManagerCall::AddGuardian {
                    wallet: world.wallet,
                    guardian: Address::derive("account", "guardian"),
                }
                .encode()
                .unwrap();
                let call = RelayedCall::new(world.wallet, world.gm, data, 0).sign(
                    &world.relayer.address(),
                    domain,
                    &[&world.owner],
                );
                (world, call)
            },
            |(mut world, call)| {
                let submitter = Address::derive("account", "submitter");
                world.relayer.execute(&mut world.ledger, submitter, &call).unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_recovery_quorum(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay/recovery_quorum");

    for n in [1usize, 3, 5, 9] {
        let quorum = guardian_majority(n);
        group.throughput(Throughput::Elements(quorum as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let world = setup_world(n);
                    let domain = world.ledger.config().relay_domain;
                    let data = RecoveryManagerCall::ExecuteRecovery {
                        wallet: world.wallet,
                        recovery: Address::derive("account", "recovery"),
                    }
                    .encode()
                    .unwrap();
                    let signers: Vec<&Keypair> = world.guardians.iter().take(quorum).collect();
                    let call = RelayedCall::new(world.wallet, world.rm, data, 0).sign(
                        &world.relayer.address(),
                        domain,
                        &signers,
                    );
                    (world, call)
                },
                |(mut world, call)| {
                    let submitter = Address::derive("account", "submitter");
                    world.relayer.execute(&mut world.ledger, submitter, &call).unwrap()
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sign_hash, bench_owner_relay, bench_recovery_quorum);
criterion_main!(benches);
