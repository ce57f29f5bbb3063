//! `intcode` — CLI hôte de la VM IntCode
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `intcode_cli` (lib).

#![forbid(unsafe_code)]

use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use intcode_vm::DEFAULT_MEMORY_LIMIT;

use intcode_cli::{self as cli, ascii, topology, RunOptions};

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "intcode", version, about = "VM IntCode : exécuter des programmes, fournir l'entrée, câbler des amplificateurs", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Exécuter un programme jusqu'au bout
    Run {
        /// Listing du programme (ou - pour stdin)
        program: PathBuf,
        /// Valeurs d'entrée, séparées par des virgules ; répétable
        #[arg(short = 'i', long = "input", allow_hyphen_values = true)]
        input: Vec<String>,
        /// Ligne ASCII envoyée après les entrées entières ; répétable
        #[arg(long = "line")]
        line: Vec<String>,
        /// Afficher la sortie en texte ASCII
        #[arg(long = "ascii")]
        as_text: bool,
        /// Capacité de la file d'entrée (0 = rendezvous)
        #[arg(long = "in-buffer", default_value_t = 0)]
        in_buffer: usize,
        /// Capacité de la file de sortie (0 = rendezvous)
        #[arg(long = "out-buffer", default_value_t = 0)]
        out_buffer: usize,
        /// Valeur lue quand rien n'est en file (l'opcode 3 ne bloque jamais)
        #[arg(long = "default-input", allow_hyphen_values = true)]
        default_input: Option<i64>,
        /// Nombre max de cellules mémoire
        #[arg(long = "memory-limit", default_value_t = DEFAULT_MEMORY_LIMIT)]
        memory_limit: usize,
        /// Écrire l'état final de la machine en JSON
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Exécuter des amplificateurs en série (ou en boucle de rétroaction)
    Chain {
        /// Listing du programme (ou - pour stdin)
        program: PathBuf,
        /// Phases, séparées par des virgules
        #[arg(long, allow_hyphen_values = true)]
        phases: String,
        /// Réinjecter la dernière sortie dans le premier amplificateur
        #[arg(long)]
        feedback: bool,
        /// Essayer toutes les permutations de phases et garder le meilleur signal
        #[arg(long)]
        search: bool,
        /// Signal initial (une recherche part toujours de 0)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        signal: i64,
    },
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            cli::status_err("error:", &format!("{e:#}"));
            ExitCode::from(1)
        },
    }
}

fn real_main() -> Result<u8> {
    let opt = Opt::parse();

    cli::set_color(match opt.color {
        ColorChoice::Auto => None,
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
    });
    cli::init_logger(cli::level_for(opt.verbose, opt.quiet));

    match opt.cmd {
        Command::Run {
            program,
            input,
            line,
            as_text,
            in_buffer,
            out_buffer,
            default_input,
            memory_limit,
            snapshot,
        } => {
            let code = cli::load_program(&program)?;
            let mut inputs = Vec::new();
            for list in &input {
                inputs.extend(cli::parse_values(list).with_context(|| format!("--input {list}"))?);
            }
            let opts = RunOptions {
                inputs,
                lines: line,
                in_capacity: in_buffer,
                out_capacity: out_buffer,
                default_input,
                memory_limit,
                name: program.file_stem().map(|s| s.to_string_lossy().into_owned()),
            };
            let report = cli::run_program(&code, &opts)?;

            if as_text {
                print!("{}", ascii::render(&report.outputs));
            } else {
                for v in &report.outputs {
                    println!("{v}");
                }
            }
            if let Some(path) = snapshot {
                let json = serde_json::to_string_pretty(&report.snapshot).context("sérialisation du snapshot")?;
                fs::write(&path, json).with_context(|| format!("écriture de {}", path.display()))?;
                cli::status_ok("snapshot", &path.display().to_string());
            }
            if let Some(fault) = report.completion.fault() {
                cli::status_err("fault:", &fault.to_string());
            }
            Ok(report.exit_code())
        },
        Command::Chain { program, phases, feedback, search, signal } => {
            let code = cli::load_program(&program)?;
            let phases = cli::parse_values(&phases).context("--phases")?;
            if search {
                let (best, order) = topology::max_signal(&code, &phases, feedback)?;
                println!("{best}");
                cli::status_ok("phases", &format!("{order:?}"));
            } else {
                let out = if feedback {
                    topology::run_feedback_loop(&code, &phases, signal)?
                } else {
                    topology::run_chain(&code, &phases, signal)?
                };
                println!("{out}");
            }
            Ok(0)
        },
    }
}
