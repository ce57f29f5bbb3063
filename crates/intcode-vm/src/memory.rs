//! Mémoire invitée plate, extensible par la fin.
//!
//! Une lecture hors bornes rend `0` sans toucher au buffer ; une écriture hors
//! bornes remplit d'abord le trou de zéros. Le buffer ne rétrécit jamais.

use crate::error::Fault;

/// Plafond par défaut du nombre de cellules (16 Mi cellules).
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 24;

/// Mémoire du programme invité.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
    limit: usize,
}

impl Memory {
    /// Copie `program` dans un buffer neuf.
    ///
    /// La limite n'est jamais sous la taille du programme : l'image initiale
    /// reste toujours inscriptible.
    pub fn new(program: &[i64], limit: usize) -> Self {
        Self { cells: program.to_vec(), limit: limit.max(program.len()) }
    }

    /// Valeur à `addr`, `0` au-delà de la fin.
    #[inline]
    pub fn read(&self, addr: usize) -> i64 { self.cells.get(addr).copied().unwrap_or(0) }

    /// Écrit `value` à `addr`, en agrandissant le buffer si besoin.
    pub fn write(&mut self, addr: usize, value: i64) -> Result<(), Fault> {
        if addr >= self.cells.len() {
            if addr >= self.limit {
                return Err(Fault::MemoryLimit { address: addr, limit: self.limit });
            }
            self.cells.resize(addr + 1, 0);
        }
        self.cells[addr] = value;
        Ok(())
    }

    /// Taille courante, en cellules.
    pub fn len(&self) -> usize { self.cells.len() }
    /// Vrai si aucune cellule n'est allouée.
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
    /// Limite de croissance configurée.
    pub const fn limit(&self) -> usize { self.limit }
    /// Vue en lecture seule des cellules allouées.
    pub fn as_slice(&self) -> &[i64] { &self.cells }
    /// Consomme la mémoire et rend ses cellules.
    pub fn into_vec(self) -> Vec<i64> { self.cells }
}
