//! intcode-vm — machine virtuelle IntCode
//!
//! Fournit :
//! - `Machine` : mémoire plate extensible, pointeur d'instruction, base relative, boucle d'exécution
//! - `Handle` : extrémité hôte (passage bloquant entrée/sortie, signal de fin)
//! - `Instruction`/`Opcode`/`Mode` : décodage des mots d'instruction
//! - `Fault`/`Completion`/`VmError` : fautes de programme mal formé vs arrêt propre
//! - `MachineConfig` : capacités des canaux, entrée par défaut non bloquante, limite mémoire
//!
//! Une machine tourne sur un seul fil d'exécution (`Machine::spawn`, ou `run`
//! sur un thread à toi). L'hôte ne touche jamais l'état de la machine : il
//! échange seulement des entiers via le handle.
//!
//! ```
//! use intcode_vm::Machine;
//!
//! let program = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
//! let (host, join) = Machine::new(&program, 1, 1)?.spawn()?;
//! assert!(host.add_input(8));
//! assert_eq!(host.get_output()?, 1);
//! assert!(join.join().is_ok());
//! # Ok::<(), intcode_vm::VmError>(())
//! ```
//!
//! Features :
//! - `serde` : (dé)sérialisation dérivée sur `MachineConfig`, `Snapshot`, `Completion`, `Fault`

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

pub mod config;
pub mod decode;
pub mod error;
pub mod handle;
pub mod machine;
pub mod memory;

pub use config::MachineConfig;
pub use decode::{Instruction, Mode, Opcode};
pub use error::{Completion, Fault, VmError, VmResult};
pub use handle::{Exchange, Handle};
pub use machine::{Machine, Snapshot};
pub use memory::{Memory, DEFAULT_MEMORY_LIMIT};

/// Prelude pratique pour importer d’un coup.
pub mod prelude {
    pub use crate::{Completion, Exchange, Fault, Handle, Machine, MachineConfig, VmError, VmResult};
}
