//! Fautes levées par la boucle d'exécution et erreurs remontées à l'hôte.

use std::io;

use thiserror::Error;

/* ─────────────────────────── Faults (guest side) ─────────────────────────── */

/// Faute de programme mal formé. Terminale pour la machine qui la lève.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fault {
    /// Opcode hors de la table (mots négatifs compris).
    #[error("unknown opcode {opcode} at ip {ip}")]
    UnknownOpcode {
        /// Deux chiffres de poids faible du mot fautif.
        opcode: i64,
        /// Adresse de l'instruction.
        ip: usize,
    },

    /// Chiffre de mode autre que 0, 1 ou 2.
    #[error("invalid parameter mode {mode} at ip {ip}")]
    InvalidMode {
        /// Le chiffre fautif.
        mode: i64,
        /// Adresse de l'instruction.
        ip: usize,
    },

    /// Paramètre destination encodé en mode immédiat.
    #[error("write to an immediate-mode parameter at ip {ip}")]
    ImmediateWrite {
        /// Adresse de l'instruction.
        ip: usize,
    },

    /// Adresse résolue (ou cible de saut) négative.
    #[error("negative address {address} at ip {ip}")]
    NegativeAddress {
        /// L'adresse résolue.
        address: i64,
        /// Adresse de l'instruction.
        ip: usize,
    },

    /// Le pointeur d'instruction est sorti de la mémoire sans rencontrer d'arrêt.
    #[error("instruction pointer {ip} ran past the end of memory ({len} cells) without halting")]
    RanOffEnd {
        /// Pointeur d'instruction au moment de la faute.
        ip: usize,
        /// Taille mémoire au moment de la faute.
        len: usize,
    },

    /// Débordement de l'arithmétique i64 vérifiée.
    #[error("arithmetic overflow at ip {ip}")]
    Overflow {
        /// Adresse de l'instruction.
        ip: usize,
    },

    /// Une écriture agrandirait la mémoire au-delà de la limite.
    #[error("address {address} exceeds the memory limit of {limit} cells")]
    MemoryLimit {
        /// Adresse demandée.
        address: usize,
        /// Limite configurée.
        limit: usize,
    },

    /// Tous les handles hôte ont été lâchés pendant que la machine attendait une entrée.
    #[error("input channel closed while waiting at ip {ip}")]
    InputClosed {
        /// Adresse de l'instruction d'entrée.
        ip: usize,
    },

    /// Tous les handles hôte ont été lâchés pendant que la machine émettait une sortie.
    #[error("output channel closed while sending at ip {ip}")]
    OutputClosed {
        /// Adresse de l'instruction de sortie.
        ip: usize,
    },
}

/* ─────────────────────────── Completion ─────────────────────────── */

/// Raison de l'arrêt d'une machine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Completion {
    /// Opcode 99 atteint.
    Halted,
    /// La boucle s'est arrêtée sur une faute.
    Faulted(Fault),
}

impl Completion {
    /// Vrai pour un arrêt propre.
    pub const fn is_halted(&self) -> bool { matches!(self, Self::Halted) }

    /// La faute, s'il y en a une.
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Halted => None,
            Self::Faulted(f) => Some(f),
        }
    }

    /// Retour à la forme renvoyée par `run`.
    pub fn into_result(self) -> Result<(), Fault> {
        match self {
            Self::Halted => Ok(()),
            Self::Faulted(f) => Err(f),
        }
    }
}

impl From<&Result<(), Fault>> for Completion {
    fn from(r: &Result<(), Fault>) -> Self {
        match r {
            Ok(()) => Self::Halted,
            Err(f) => Self::Faulted(f.clone()),
        }
    }
}

/* ─────────────────────────── Host errors ─────────────────────────── */

/// Erreurs renvoyées par l'API côté hôte.
#[derive(Debug, Error)]
pub enum VmError {
    /// `Machine::new` a reçu un programme vide.
    #[error("program is empty")]
    EmptyProgram,

    /// Sortie demandée à une machine arrêtée proprement sans rien en attente.
    #[error("machine halted with no pending output")]
    Halted,

    /// Sortie demandée à une machine en faute sans rien en attente.
    #[error("machine faulted: {0}")]
    Faulted(#[from] Fault),

    /// La machine a déjà tourné : elle n'a plus d'extrémités hôte à distribuer.
    #[error("machine has already run")]
    Detached,

    /// Le thread dédié n'a pas pu être lancé.
    #[error("failed to spawn machine thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Alias de résultat pour l'API côté hôte.
pub type VmResult<T> = Result<T, VmError>;
