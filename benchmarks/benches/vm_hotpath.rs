//! vm_hotpath.rs — micro-benchs « hot path » de la VM IntCode
//!
//! Groupes :
//!   • `vm/run`      : boucle d'exécution pure (pas d'attente sur les canaux)
//!   • `vm/handoff`  : aller-retour hôte ↔ machine en rendezvous et bufferisé
//!   • `load`        : parsing d'un listing depuis un fichier
//!
//! Lancer :
//!   cargo bench -p intcode-benches --bench vm_hotpath
//!   cargo bench -p intcode-benches --bench vm_hotpath -- --save-baseline hot
//!   cargo bench -p intcode-benches --bench vm_hotpath -- --baseline hot
//!
//! Données : tout est self-contained (programmes embarqués).

use std::{fs, time::Duration};

use anyhow::{anyhow, Context, Result};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use intcode_vm::{Exchange, Machine, MachineConfig};
use tempfile::tempdir;

// ────────────────────────────────────────────────────────────────────────────
// Programmes
// ────────────────────────────────────────────────────────────────────────────

/// Lit `n` puis le décrémente jusqu'à zéro : trois instructions par tour.
const COUNTDOWN: &[i64] = &[3, 100, 1001, 100, -1, 100, 1005, 100, 2, 99];

const QUINE: &[i64] = &[109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];

/// Renvoie chaque entrée jusqu'à lire 0.
const ECHO_UNTIL_ZERO: &[i64] = &[3, 100, 1006, 100, 10, 4, 100, 1105, 1, 0, 99];

// ────────────────────────────────────────────────────────────────────────────
// Outils
// ────────────────────────────────────────────────────────────────────────────

fn run_countdown(n: i64) -> Result<u64> {
    let mut machine = Machine::with_config(COUNTDOWN, MachineConfig::default().with_capacities(1, 0))?;
    let host = machine.handle().ok_or_else(|| anyhow!("machine already ran"))?;
    if !host.add_input(n) {
        anyhow::bail!("countdown refused its input");
    }
    machine.run()?;
    Ok(machine.steps())
}

fn collect_quine() -> Result<Vec<i64>> {
    let (host, join) = Machine::new(QUINE, 0, 32)?.spawn()?;
    let out: Vec<i64> = host.outputs().collect();
    join.join().map_err(|_| anyhow!("quine thread panicked"))?;
    Ok(out)
}

/// Fait passer `count` valeurs dans une machine écho, lectures et écritures entrelacées.
fn echo_roundtrips(count: i64, capacity: usize) -> Result<i64> {
    let (host, join) = Machine::new(ECHO_UNTIL_ZERO, capacity, capacity)?.spawn()?;
    let mut next = 1;
    let mut sum = 0;
    loop {
        let offer = if next <= count { next } else { 0 };
        match host.get_output_or_add_input_or_end(offer) {
            Exchange::Output(v) => sum += v,
            Exchange::InputAccepted => next += 1,
            Exchange::Ended => break,
        }
    }
    join.join().map_err(|_| anyhow!("echo thread panicked"))?;
    Ok(sum)
}

// ────────────────────────────────────────────────────────────────────────────
// Benchs
// ────────────────────────────────────────────────────────────────────────────

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/run");
    group.sample_size(40);
    group.warm_up_time(Duration::from_millis(400));
    group.measurement_time(Duration::from_secs(6));

    for n in [10_000_i64, 200_000] {
        let steps = run_countdown(n).unwrap_or_default();
        group.throughput(Throughput::Elements(steps));
        group.bench_with_input(BenchmarkId::new("countdown", n), &n, |b, &n| {
            b.iter(|| black_box(run_countdown(black_box(n)).expect("countdown")));
        });
    }

    group.throughput(Throughput::Elements(QUINE.len() as u64));
    group.bench_function("quine", |b| b.iter(|| black_box(collect_quine().expect("quine"))));
    group.finish();
}

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/handoff");
    group.sample_size(30);
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(6));

    let count = 2_000_i64;
    group.throughput(Throughput::Elements(count.unsigned_abs()));
    for capacity in [0_usize, 1, 64] {
        group.bench_with_input(BenchmarkId::new("echo", capacity), &capacity, |b, &cap| {
            b.iter(|| black_box(echo_roundtrips(count, cap).expect("echo")));
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let tmp = tempdir().expect("tmpdir load");
    let path = tmp.path().join("listing.txt");
    let listing: Vec<String> = (0..50_000).map(|i| ((i * 7919) % 20_001 - 10_000).to_string()).collect();
    fs::write(&path, listing.join(","))
        .context("write listing")
        .expect("listing");

    let mut group = c.benchmark_group("load");
    group.throughput(Throughput::Elements(listing.len() as u64));
    group.bench_function("listing/50k", |b| {
        b.iter(|| black_box(intcode_cli::load_program(black_box(&path)).expect("load")));
    });
    group.finish();
}

criterion_group!(benches, bench_run, bench_handoff, bench_load);
criterion_main!(benches);
