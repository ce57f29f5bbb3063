//! Configuration par machine.

use crate::memory::DEFAULT_MEMORY_LIMIT;

/// Options appliquées à la construction d'une machine.
///
/// `Default` : canaux rendezvous des deux côtés, entrée bloquante, limite
/// mémoire par défaut.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MachineConfig {
    /// Capacité de la file d'entrée (0 = passage synchrone).
    pub input_capacity: usize,
    /// Capacité de la file de sortie (0 = passage synchrone).
    pub output_capacity: usize,
    /// Valeur lue par l'opcode 3 quand la file d'entrée est vide. `None` bloque.
    pub default_input: Option<i64>,
    /// Nombre max de cellules mémoire que le programme peut atteindre.
    pub memory_limit: usize,
    /// Libellé des spans de trace et du thread de la machine.
    pub name: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            input_capacity: 0,
            output_capacity: 0,
            default_input: None,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            name: None,
        }
    }
}

impl MachineConfig {
    /// Fixe les deux capacités de canal.
    #[must_use]
    pub const fn with_capacities(mut self, input: usize, output: usize) -> Self {
        self.input_capacity = input;
        self.output_capacity = output;
        self
    }

    /// Rend l'opcode 3 non bloquant : lit `value` quand rien n'est en file.
    #[must_use]
    pub const fn default_input(mut self, value: i64) -> Self {
        self.default_input = Some(value);
        self
    }

    /// Fixe la limite mémoire, en cellules.
    #[must_use]
    pub const fn memory_limit(mut self, cells: usize) -> Self {
        self.memory_limit = cells;
        self
    }

    /// Nomme la machine (span de trace, nom du thread).
    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Nom effectif ; `intcode` si aucun n'a été donné.
    pub fn label(&self) -> &str { self.name.as_deref().unwrap_or("intcode") }
}
