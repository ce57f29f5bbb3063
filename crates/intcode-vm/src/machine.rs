//! La machine : registres, mémoire et boucle chargement/décodage/exécution.
//!
//! Une machine est pilotée par un seul fil d'exécution. La mémoire, le
//! pointeur d'instruction et la base relative ne sont jamais partagés ; l'hôte
//! ne parle à la machine que via un [`Handle`].

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use crate::config::MachineConfig;
use crate::decode::{Instruction, Mode, Opcode};
use crate::error::{Completion, Fault, VmError, VmResult};
use crate::handle::Handle;
use crate::memory::Memory;

/// Résultat d'un pas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Copie instantanée de l'état d'une machine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Cellules mémoire allouées.
    pub memory: Vec<i64>,
    /// Pointeur d'instruction.
    pub ip: usize,
    /// Registre de base relative.
    pub relative_base: i64,
    /// Instructions exécutées jusqu'ici.
    pub steps: u64,
    /// Raison de fin, si la machine s'est arrêtée.
    pub completion: Option<Completion>,
}

/// Une machine IntCode.
#[derive(Debug)]
pub struct Machine {
    memory: Memory,
    ip: usize,
    base: i64,
    steps: u64,
    config: MachineConfig,

    input: Receiver<i64>,
    output: Sender<i64>,
    /// Lâché une seule fois, à l'arrêt de la machine.
    done: Option<Sender<()>>,
    /// Modèle d'extrémité hôte, relâché au démarrage de `run`.
    host: Option<Handle>,
    completion: Arc<OnceLock<Completion>>,
}

impl Machine {
    /// Construit une machine sur une copie privée de `program`.
    ///
    /// Une capacité de 0 fait du canal correspondant un passage synchrone.
    /// Les opcodes ne sont pas validés ici ; un programme invalide fait faute à l'exécution.
    pub fn new(program: &[i64], input_capacity: usize, output_capacity: usize) -> VmResult<Self> {
        Self::with_config(program, MachineConfig::default().with_capacities(input_capacity, output_capacity))
    }

    /// Construit une machine avec des options explicites.
    pub fn with_config(program: &[i64], config: MachineConfig) -> VmResult<Self> {
        if program.is_empty() {
            return Err(VmError::EmptyProgram);
        }
        let (input_tx, input_rx) = bounded(config.input_capacity);
        let (output_tx, output_rx) = bounded(config.output_capacity);
        let (done_tx, done_rx) = bounded(0);
        let completion = Arc::new(OnceLock::new());
        let host = Handle::new(input_tx, output_rx, done_rx, Arc::clone(&completion));

        Ok(Self {
            memory: Memory::new(program, config.memory_limit),
            ip: 0,
            base: 0,
            steps: 0,
            config,
            input: input_rx,
            output: output_tx,
            done: Some(done_tx),
            host: Some(host),
            completion,
        })
    }

    /// Nouvelle extrémité hôte.
    ///
    /// `None` dès que `run` a démarré : la machine ne garde alors aucune
    /// extrémité hôte, donc lâcher tous les handles débloque une machine en
    /// attente sur un canal (faute `InputClosed`/`OutputClosed`).
    pub fn handle(&self) -> Option<Handle> { self.host.clone() }

    /// Lance la machine sur un thread dédié.
    ///
    /// Le join handle rend la machine une fois arrêtée, pour inspection.
    pub fn spawn(self) -> VmResult<(Handle, JoinHandle<Self>)> {
        let host = self.handle().ok_or(VmError::Detached)?;
        let join = thread::Builder::new()
            .name(self.config.label().to_owned())
            .spawn(move || {
                let mut machine = self;
                let _ = machine.run();
                machine
            })
            .map_err(VmError::Spawn)?;
        Ok((host, join))
    }

    /// Exécute jusqu'à l'arrêt ou la faute du programme.
    ///
    /// Enregistre la raison de fin, puis déclenche le signal de fin. Un second
    /// appel renvoie l'issue enregistrée sans rien exécuter.
    pub fn run(&mut self) -> Result<(), Fault> {
        if let Some(done) = self.completion.get() {
            return done.clone().into_result();
        }
        self.host = None;

        let span = tracing::debug_span!("machine", name = self.config.label());
        let _guard = span.enter();
        debug!(cells = self.memory.len(), "started");

        let outcome = loop {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => break Ok(()),
                Err(fault) => break Err(fault),
            }
        };

        match &outcome {
            Ok(()) => debug!(steps = self.steps, "halted"),
            Err(fault) => warn!(steps = self.steps, %fault, "faulted"),
        }
        self.finish(&outcome);
        outcome
    }

    /* ───────────────────────── Accessors ───────────────────────── */

    /// Cellules mémoire allouées.
    pub fn memory(&self) -> &[i64] { self.memory.as_slice() }
    /// Pointeur d'instruction.
    pub const fn ip(&self) -> usize { self.ip }
    /// Registre de base relative.
    pub const fn relative_base(&self) -> i64 { self.base }
    /// Instructions exécutées jusqu'ici (arrêt compris).
    pub const fn steps(&self) -> u64 { self.steps }
    /// Options de construction de la machine.
    pub const fn config(&self) -> &MachineConfig { &self.config }
    /// Raison de fin, `None` tant que la machine tourne.
    pub fn completion(&self) -> Option<Completion> { self.completion.get().cloned() }

    /// Copie l'état courant.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            memory: self.memory.as_slice().to_vec(),
            ip: self.ip,
            relative_base: self.base,
            steps: self.steps,
            completion: self.completion(),
        }
    }

    /* ───────────────────────── Execution ───────────────────────── */

    fn finish(&mut self, outcome: &Result<(), Fault>) {
        let _ = self.completion.set(Completion::from(outcome));
        self.done = None;
    }

    fn step(&mut self) -> Result<Flow, Fault> {
        let ip = self.ip;
        if ip >= self.memory.len() {
            return Err(Fault::RanOffEnd { ip, len: self.memory.len() });
        }
        let instr = Instruction::decode(self.memory.read(ip), ip)?;
        trace!(ip, op = %instr.opcode, base = self.base, "step");
        self.steps += 1;

        let mut next = ip + instr.opcode.width();
        match instr.opcode {
            Opcode::Add => {
                let dst = self.destination(&instr, 2)?;
                let v = self.param(&instr, 0)?.checked_add(self.param(&instr, 1)?).ok_or(Fault::Overflow { ip })?;
                self.memory.write(dst, v)?;
            }
            Opcode::Mul => {
                let dst = self.destination(&instr, 2)?;
                let v = self.param(&instr, 0)?.checked_mul(self.param(&instr, 1)?).ok_or(Fault::Overflow { ip })?;
                self.memory.write(dst, v)?;
            }
            Opcode::Input => {
                // destination invalide : faute avant de prendre une valeur à l'hôte
                let dst = self.destination(&instr, 0)?;
                let v = self.receive()?;
                self.memory.write(dst, v)?;
            }
            Opcode::Output => {
                let v = self.param(&instr, 0)?;
                trace!(ip, value = v, "output");
                self.output.send(v).map_err(|_| Fault::OutputClosed { ip })?;
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let (cond, target) = (self.param(&instr, 0)?, self.param(&instr, 1)?);
                if (cond != 0) == (instr.opcode == Opcode::JumpIfTrue) {
                    next = self.address(target)?;
                }
            }
            Opcode::LessThan => {
                let dst = self.destination(&instr, 2)?;
                let v = i64::from(self.param(&instr, 0)? < self.param(&instr, 1)?);
                self.memory.write(dst, v)?;
            }
            Opcode::Equals => {
                let dst = self.destination(&instr, 2)?;
                let v = i64::from(self.param(&instr, 0)? == self.param(&instr, 1)?);
                self.memory.write(dst, v)?;
            }
            Opcode::AdjustBase => {
                self.base = self.base.checked_add(self.param(&instr, 0)?).ok_or(Fault::Overflow { ip })?;
            }
            Opcode::Halt => return Ok(Flow::Halt),
        }
        self.ip = next;
        Ok(Flow::Continue)
    }

    /// Résout le paramètre `index` en lecture.
    fn param(&self, instr: &Instruction, index: usize) -> Result<i64, Fault> {
        let raw = self.memory.read(self.ip + 1 + index);
        match instr.mode(index) {
            Mode::Immediate => Ok(raw),
            Mode::Position => Ok(self.memory.read(self.address(raw)?)),
            Mode::Relative => Ok(self.memory.read(self.address(self.relative(raw)?)?)),
        }
    }

    /// Résout le paramètre `index` comme adresse d'écriture.
    fn destination(&self, instr: &Instruction, index: usize) -> Result<usize, Fault> {
        let raw = self.memory.read(self.ip + 1 + index);
        match instr.mode(index) {
            Mode::Immediate => Err(Fault::ImmediateWrite { ip: self.ip }),
            Mode::Position => self.address(raw),
            Mode::Relative => self.address(self.relative(raw)?),
        }
    }

    fn relative(&self, offset: i64) -> Result<i64, Fault> {
        self.base.checked_add(offset).ok_or(Fault::Overflow { ip: self.ip })
    }

    fn address(&self, addr: i64) -> Result<usize, Fault> {
        usize::try_from(addr).map_err(|_| Fault::NegativeAddress { address: addr, ip: self.ip })
    }

    fn receive(&self) -> Result<i64, Fault> {
        let ip = self.ip;
        if let Some(fallback) = self.config.default_input {
            return match self.input.try_recv() {
                Ok(v) => Ok(v),
                Err(TryRecvError::Empty) => {
                    // les programmes en attente active bouclent ici
                    thread::yield_now();
                    Ok(fallback)
                }
                Err(TryRecvError::Disconnected) => Err(Fault::InputClosed { ip }),
            };
        }
        trace!(ip, "waiting for input");
        self.input.recv().map_err(|_| Fault::InputClosed { ip })
    }
}
