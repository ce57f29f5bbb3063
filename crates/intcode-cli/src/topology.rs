//! Câblage multi-machines : relais, chaînes d'amplificateurs, boucles de rétroaction.
//!
//! Chaque machine tourne sur son thread et chaque lien est un thread relais :
//! l'ordre sur un lien est exactement l'ordre d'émission de la machine source.

use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};
use intcode_vm::{Completion, Handle, Machine, MachineConfig};
use log::debug;

/// Transmet chaque sortie de `from` à `to`, dans l'ordre, jusqu'à l'arrêt de
/// `from` ou un refus de `to`. Renvoie le nombre de valeurs transmises.
///
/// Le relais ne garde qu'une vue en sortie de `from` : il ne maintient jamais
/// ouverte la file d'entrée de cette machine.
pub fn relay(from: Handle, to: Handle) -> JoinHandle<usize> {
    let from = from.output_view();
    thread::spawn(move || {
        let mut forwarded = 0;
        while let Some(v) = from.get_output_or_end() {
            if !to.add_input(v) {
                debug!("relay: receiver stopped after {forwarded} values");
                break;
            }
            forwarded += 1;
        }
        forwarded
    })
}

/// Machines `0..n` démarrées avec leur phase, reliées `i -> i+1`.
struct Ring {
    first: Handle,
    /// Vue en sortie du dernier amplificateur.
    last: Handle,
    machines: Vec<JoinHandle<Machine>>,
    relays: Vec<JoinHandle<usize>>,
}

impl Ring {
    fn start(program: &[i64], phases: &[i64]) -> Result<Self> {
        if phases.is_empty() {
            bail!("at least one phase is required");
        }
        let mut hosts = Vec::with_capacity(phases.len());
        let mut machines = Vec::with_capacity(phases.len());
        for (i, &phase) in phases.iter().enumerate() {
            let config = MachineConfig::default().name(format!("amp-{i}"));
            let (host, join) = Machine::with_config(program, config)?.spawn()?;
            if !host.add_input(phase) {
                bail!("amplifier {i} stopped before reading its phase {phase}");
            }
            hosts.push(host);
            machines.push(join);
        }
        let relays = hosts.windows(2).map(|w| relay(w[0].clone(), w[1].clone())).collect();
        let first = hosts[0].clone();
        let last = hosts[hosts.len() - 1].output_view();
        Ok(Self { first, last, machines, relays })
    }

    fn feed(&self, signal: i64) -> Result<()> {
        if !self.first.add_input(signal) {
            bail!("first amplifier stopped before reading the signal");
        }
        Ok(())
    }

    /// Plus d'entrée pour la tête : un programme qui en redemande fait faute au lieu de bloquer.
    fn close_head(&mut self) { self.first = self.first.output_view(); }

    /// Attend tout le monde ; l'erreur est le premier amplificateur en faute (ordre de la chaîne).
    fn join(self) -> Result<()> {
        drop((self.first, self.last));
        for r in self.relays {
            r.join().map_err(|_| anyhow!("relay thread panicked"))?;
        }
        let mut first_fault = None;
        for (i, m) in self.machines.into_iter().enumerate() {
            let machine = m.join().map_err(|_| anyhow!("amplifier {i} panicked"))?;
            if let Some(Completion::Faulted(fault)) = machine.completion() {
                first_fault.get_or_insert((i, fault));
            }
        }
        match first_fault {
            Some((i, fault)) => Err(anyhow!(fault)).with_context(|| format!("amplifier {i} faulted")),
            None => Ok(()),
        }
    }
}

/// Fait passer `signal` une fois dans une série d'amplificateurs et renvoie la
/// dernière valeur émise par le dernier.
pub fn run_chain(program: &[i64], phases: &[i64], signal: i64) -> Result<i64> {
    let mut ring = Ring::start(program, phases)?;
    ring.feed(signal)?;
    ring.close_head();
    let result = ring.last.outputs().last();
    ring.join()?;
    result.ok_or_else(|| anyhow!("final amplifier produced no output"))
}

/// Comme [`run_chain`], avec la sortie du dernier réinjectée dans le premier
/// jusqu'à l'arrêt de tous les amplificateurs.
pub fn run_feedback_loop(program: &[i64], phases: &[i64], signal: i64) -> Result<i64> {
    let ring = Ring::start(program, phases)?;
    ring.feed(signal)?;
    let mut result = None;
    let mut rounds = 0_usize;
    while let Some(v) = ring.last.get_output_or_end() {
        result = Some(v);
        rounds += 1;
        if !ring.first.add_input(v) {
            debug!("feedback: first amplifier stopped, draining");
        }
    }
    debug!("feedback loop ended after {rounds} rounds");
    ring.join()?;
    result.ok_or_else(|| anyhow!("final amplifier produced no output"))
}

/// Toutes les permutations de `values` (algorithme de Heap).
pub fn permutations(values: &[i64]) -> Vec<Vec<i64>> {
    fn heap(k: usize, s: &mut Vec<i64>, out: &mut Vec<Vec<i64>>) {
        if k <= 1 {
            out.push(s.clone());
            return;
        }
        heap(k - 1, s, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                s.swap(i, k - 1);
            } else {
                s.swap(0, k - 1);
            }
            heap(k - 1, s, out);
        }
    }

    let mut out = Vec::new();
    let mut s = values.to_vec();
    heap(s.len(), &mut s, &mut out);
    out
}

/// Meilleur signal final sur toutes les permutations de `phases`, avec la permutation gagnante.
pub fn max_signal(program: &[i64], phases: &[i64], feedback: bool) -> Result<(i64, Vec<i64>)> {
    let mut best: Option<(i64, Vec<i64>)> = None;
    for order in permutations(phases) {
        let signal = if feedback { run_feedback_loop(program, &order, 0) } else { run_chain(program, &order, 0) }
            .with_context(|| format!("phases {order:?}"))?;
        if best.as_ref().is_none_or(|(s, _)| signal > *s) {
            best = Some((signal, order));
        }
    }
    best.ok_or_else(|| anyhow!("no phases given"))
}
