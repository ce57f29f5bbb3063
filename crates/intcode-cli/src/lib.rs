//! intcode-cli — couche hôte du binaire `intcode`
//!
//! Tout ce qui est testable, loin du parsing d'arguments (réservé à `main.rs`) :
//! - `program` : parsing et chargement des listings (fichier ou stdin)
//! - `ascii` : encodage des lignes et rendu de la sortie des programmes interactifs
//! - `topology` : relais, chaînes d'amplificateurs, boucles de rétroaction, recherche de phases
//! - `run_program` : pilote mono-machine qui alimente l'entrée en file tout en vidant la sortie
//! - traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::collections::VecDeque;

use anyhow::{anyhow, Context, Result};
use intcode_vm::{Completion, Exchange, Machine, MachineConfig, Snapshot, DEFAULT_MEMORY_LIMIT};
use log::{debug, info};

#[cfg(feature = "color")]
use owo_colors::{OwoColorize, Stream, Style};

pub mod ascii;
pub mod program;
pub mod topology;

pub use program::{load_program, parse_program, parse_values};

// ───────────────────────────── Types publics ─────────────────────────────

/// Comment [`run_program`] alimente et dimensionne une machine.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Entiers mis en file d'entrée, dans l'ordre.
    pub inputs: Vec<i64>,
    /// Lignes ASCII mises en file après `inputs`, chacune terminée par `\n`.
    pub lines: Vec<String>,
    /// Capacité de la file d'entrée (0 = rendezvous).
    pub in_capacity: usize,
    /// Capacité de la file de sortie (0 = rendezvous).
    pub out_capacity: usize,
    /// Valeur lue par l'opcode 3 quand rien n'est en file (ne bloque jamais).
    pub default_input: Option<i64>,
    /// Nombre max de cellules mémoire.
    pub memory_limit: usize,
    /// Nom de la machine (traces, thread).
    pub name: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            lines: Vec::new(),
            in_capacity: 0,
            out_capacity: 0,
            default_input: None,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            name: None,
        }
    }
}

impl RunOptions {
    fn config(&self) -> MachineConfig {
        let mut config = MachineConfig::default()
            .with_capacities(self.in_capacity, self.out_capacity)
            .memory_limit(self.memory_limit);
        if let Some(v) = self.default_input {
            config = config.default_input(v);
        }
        if let Some(name) = &self.name {
            config = config.name(name.clone());
        }
        config
    }

    fn queued(&self) -> VecDeque<i64> {
        self.inputs
            .iter()
            .copied()
            .chain(self.lines.iter().flat_map(|l| ascii::encode_line(l)))
            .collect()
    }
}

/// Ce que laisse une exécution terminée.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Sorties, dans l'ordre d'émission.
    pub outputs: Vec<i64>,
    /// Raison de fin.
    pub completion: Completion,
    /// État final de la machine.
    pub snapshot: Snapshot,
}

impl RunReport {
    /// Vrai pour un arrêt propre.
    pub const fn is_halted(&self) -> bool { self.completion.is_halted() }

    /// 0 sur arrêt propre, 1 sur faute.
    pub const fn exit_code(&self) -> u8 {
        if self.is_halted() {
            0
        } else {
            1
        }
    }
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
///
/// `RUST_LOG`, s'il est défini, l'emporte sur `default_level`.
pub fn init_logger(default_level: &str) {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .try_init();
    }
    #[cfg(not(feature = "trace"))]
    let _ = default_level;
}

/// Traduit `-q` / le nombre de `-v` en filtre de log.
pub const fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une machine jusqu'au bout.
///
/// L'entrée en file est offerte pendant que la sortie est vidée : un programme
/// qui alterne lectures et écritures sur des files rendezvous ne bloque jamais
/// contre l'hôte. Une fois la file vide, l'hôte lâche le côté entrée : un
/// programme qui en redemande fait faute `InputClosed` (sauf entrée par défaut).
pub fn run_program(program: &[i64], opts: &RunOptions) -> Result<RunReport> {
    let machine = Machine::with_config(program, opts.config()).context("chargement du programme")?;
    let (mut host, join) = machine.spawn().context("démarrage de la machine")?;
    let mut queue = opts.queued();
    let mut outputs = Vec::new();
    debug!("run: {} values queued", queue.len());

    // un programme en attente active lit la valeur par défaut : l'entrée reste ouverte
    let release = opts.default_input.is_none();
    if release && queue.is_empty() {
        host = host.output_view();
    }
    loop {
        let exchange = match queue.front() {
            Some(&next) => host.get_output_or_add_input_or_end(next),
            None => host.get_output_or_end().map_or(Exchange::Ended, Exchange::Output),
        };
        match exchange {
            Exchange::Output(v) => outputs.push(v),
            Exchange::InputAccepted => {
                queue.pop_front();
                if release && queue.is_empty() {
                    host = host.output_view();
                }
            },
            Exchange::Ended => break,
        }
    }
    if !queue.is_empty() {
        info!("run: {} queued values never read", queue.len());
    }
    drop(host);

    let machine = join.join().map_err(|_| anyhow!("machine thread panicked"))?;
    let completion = machine.completion().ok_or_else(|| anyhow!("machine stopped without completing"))?;
    Ok(RunReport { outputs, completion, snapshot: machine.snapshot() })
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

/// Force les couleurs ; `None` revient à la détection du terminal.
pub fn set_color(force: Option<bool>) {
    #[cfg(feature = "color")]
    match force {
        Some(on) => owo_colors::set_override(on),
        None => owo_colors::unset_override(),
    }
    #[cfg(not(feature = "color"))]
    let _ = force;
}

/// `tag msg` sur stderr, tag en vert.
pub fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        eprintln!("{} {}", tag.if_supports_color(Stream::Stderr, |t| t.style(Style::new().green().bold())), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{tag} {msg}");
    }
}

/// `tag msg` sur stderr, tag en rouge.
pub fn status_err(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        eprintln!("{} {}", tag.if_supports_color(Stream::Stderr, |t| t.style(Style::new().red().bold())), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{tag} {msg}");
    }
}

// ───────────────────────────── Tests ─────────────────────────────
