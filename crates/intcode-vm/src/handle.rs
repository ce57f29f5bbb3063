//! Côté hôte d'une machine : passage bloquant sur les canaux d'entrée/sortie.
//!
//! Un [`Handle`] possède les extrémités hôte des deux files et un récepteur
//! sur le signal de fin. Ce signal est un canal qui ne transporte jamais de
//! message : la machine lâche son unique émetteur en s'arrêtant, ce qui
//! réveille d'un coup tous les `select!` en attente et reste observable ensuite.

use std::sync::{Arc, OnceLock};

use crossbeam_channel::{select, Receiver, Sender, TryRecvError};

use crate::error::{Completion, VmError, VmResult};

/// Issue de [`Handle::get_output_or_add_input_or_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// La machine a produit une valeur.
    Output(i64),
    /// La machine (ou sa file d'entrée) a pris la valeur offerte.
    InputAccepted,
    /// La machine s'est arrêtée sans rien d'autre à livrer.
    Ended,
}

/// Extrémité hôte clonable d'une machine.
#[derive(Debug, Clone)]
pub struct Handle {
    /// `None` sur une vue en sortie seule.
    input: Option<Sender<i64>>,
    output: Receiver<i64>,
    done: Receiver<()>,
    completion: Arc<OnceLock<Completion>>,
}

impl Handle {
    pub(crate) const fn new(
        input: Sender<i64>,
        output: Receiver<i64>,
        done: Receiver<()>,
        completion: Arc<OnceLock<Completion>>,
    ) -> Self {
        Self { input: Some(input), output, done, completion }
    }

    /// Clone qui lit la sortie et observe la fin, sans émetteur d'entrée :
    /// il ne garde jamais la file d'entrée de la machine ouverte.
    ///
    /// `add_input` sur la vue renvoie toujours `false`.
    #[must_use]
    pub fn output_view(&self) -> Self {
        Self {
            input: None,
            output: self.output.clone(),
            done: self.done.clone(),
            completion: Arc::clone(&self.completion),
        }
    }

    /* ───────────────────────── Completion ───────────────────────── */

    /// Vrai une fois la machine arrêtée (ou lâchée sans avoir tourné).
    pub fn is_done(&self) -> bool { matches!(self.done.try_recv(), Err(TryRecvError::Disconnected)) }

    /// Raison de fin enregistrée, `None` en cours d'exécution ou si la machine n'a jamais tourné.
    pub fn completion(&self) -> Option<Completion> { self.completion.get().cloned() }

    /// Bloque jusqu'à l'arrêt de la machine.
    ///
    /// Ne vide pas la sortie : avec une file de sortie rendezvous, une machine
    /// bloquée sur l'opcode 4 ne s'arrête pas tant que personne ne lit.
    pub fn wait(&self) -> Option<Completion> {
        let _ = self.done.recv();
        self.completion()
    }

    /* ───────────────────────── Input ───────────────────────── */

    /// Passe `value` à la machine.
    ///
    /// Bloque jusqu'à la mise en file (ou la prise, pour une file rendezvous).
    /// Renvoie `false` si la machine s'est arrêtée avant.
    pub fn add_input(&self, value: i64) -> bool {
        let Some(input) = &self.input else { return false };
        if self.is_done() {
            return false;
        }
        select! {
            send(input, value) -> res => res.is_ok(),
            recv(self.done) -> _ => false,
        }
    }

    /* ───────────────────────── Output ───────────────────────── */

    /// Valeur de sortie suivante.
    ///
    /// Échoue avec [`VmError::Halted`] ou [`VmError::Faulted`] quand la machine
    /// s'est arrêtée sans rien en tampon, au lieu de bloquer indéfiniment.
    pub fn get_output(&self) -> VmResult<i64> {
        self.get_output_or_end().ok_or_else(|| match self.completion.get() {
            Some(Completion::Faulted(fault)) => VmError::Faulted(fault.clone()),
            _ => VmError::Halted,
        })
    }

    /// Valeur de sortie suivante, ou `None` une fois la machine arrêtée et sa
    /// file de sortie vide. Les valeurs en tampon passent toujours avant la fin.
    pub fn get_output_or_end(&self) -> Option<i64> {
        select! {
            recv(self.output) -> msg => msg.ok(),
            recv(self.done) -> _ => self.output.try_recv().ok(),
        }
    }

    /// Course entre « sortie disponible », « `value` acceptée » et « machine arrêtée ».
    ///
    /// Une sortie déjà en file passe avant l'offre d'entrée.
    pub fn get_output_or_add_input_or_end(&self, value: i64) -> Exchange {
        if let Ok(v) = self.output.try_recv() {
            return Exchange::Output(v);
        }
        if self.is_done() {
            return self.drain_or_end();
        }
        let Some(input) = &self.input else {
            return self.get_output_or_end().map_or(Exchange::Ended, Exchange::Output);
        };
        select! {
            recv(self.output) -> msg => msg.map_or(Exchange::Ended, Exchange::Output),
            send(input, value) -> res => {
                if res.is_ok() { Exchange::InputAccepted } else { self.drain_or_end() }
            },
            recv(self.done) -> _ => self.drain_or_end(),
        }
    }

    /// Vide la sortie jusqu'à l'arrêt de la machine.
    pub fn outputs(&self) -> impl Iterator<Item = i64> + '_ { std::iter::from_fn(|| self.get_output_or_end()) }

    fn drain_or_end(&self) -> Exchange { self.output.try_recv().map_or(Exchange::Ended, Exchange::Output) }

    /* ───────────────────────── Depths ───────────────────────── */

    /// Valeurs en file côté entrée, pas encore lues par la machine.
    pub fn pending_input(&self) -> usize { self.input.as_ref().map_or(0, Sender::len) }
    /// Valeurs en file côté sortie, pas encore lues par l'hôte.
    pub fn pending_output(&self) -> usize { self.output.len() }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Fault, Machine, MachineConfig};

    // renvoie chaque entrée jusqu'à lire 0
    const ECHO_UNTIL_ZERO: &[i64] = &[3, 100, 1006, 100, 10, 4, 100, 1105, 1, 0, 99];
    const ECHO_ONCE: &[i64] = &[3, 9, 4, 9, 99];

    #[test]
    fn add_input_after_halt_is_refused() -> VmResult<()> {
        let (host, join) = Machine::new(&[99], 0, 0)?.spawn()?;
        assert_eq!(host.wait(), Some(Completion::Halted));
        for _ in 0..3 {
            assert!(host.is_done());
            assert!(!host.add_input(1));
        }
        let machine = join.join().expect("machine thread");
        assert_eq!(machine.completion(), Some(Completion::Halted));
        Ok(())
    }

    #[test]
    fn buffered_output_survives_halt() -> VmResult<()> {
        let (host, join) = Machine::new(&[104, 1, 104, 2, 104, 3, 99], 0, 8)?.spawn()?;
        host.wait();
        assert_eq!(host.pending_output(), 3);
        assert_eq!(host.get_output()?, 1);
        assert_eq!(host.get_output_or_end(), Some(2));
        assert_eq!(host.get_output_or_add_input_or_end(0), Exchange::Output(3));
        assert_eq!(host.get_output_or_end(), None);
        assert!(matches!(host.get_output(), Err(VmError::Halted)));
        assert_eq!(host.get_output_or_add_input_or_end(0), Exchange::Ended);
        drop(join.join());
        Ok(())
    }

    #[test]
    fn get_output_reports_fault_instead_of_blocking() -> VmResult<()> {
        let (host, _join) = Machine::new(&[42], 0, 0)?.spawn()?;
        match host.get_output() {
            Err(VmError::Faulted(Fault::UnknownOpcode { opcode: 42, ip: 0 })) => {}
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn exchange_interleaves_reads_and_writes() -> VmResult<()> {
        let (host, join) = Machine::new(ECHO_ONCE, 0, 0)?.spawn()?;
        assert_eq!(host.get_output_or_add_input_or_end(41), Exchange::InputAccepted);
        assert_eq!(host.get_output_or_add_input_or_end(0), Exchange::Output(41));
        assert_eq!(host.get_output_or_add_input_or_end(0), Exchange::Ended);
        let machine = join.join().expect("machine thread");
        assert_eq!(machine.memory()[9], 41);
        Ok(())
    }

    #[test]
    fn relay_preserves_order_between_machines() -> VmResult<()> {
        let (a, ja) = Machine::with_config(ECHO_UNTIL_ZERO, MachineConfig::default().name("a"))?.spawn()?;
        let (b, jb) = Machine::with_config(ECHO_UNTIL_ZERO, MachineConfig::default().name("b"))?.spawn()?;

        let (from, to) = (a.clone(), b.clone());
        let relay = thread::spawn(move || {
            let mut forwarded = 0;
            while let Some(v) = from.get_output_or_end() {
                if !to.add_input(v) {
                    break;
                }
                forwarded += 1;
            }
            forwarded
        });

        let values: Vec<i64> = (0..200).map(|i| i * 7 - 300).collect();
        let feeder = {
            let values = values.clone();
            thread::spawn(move || values.into_iter().chain([0]).all(|v| a.add_input(v)))
        };
        let received: Vec<i64> = (0..values.len()).map(|_| b.get_output()).collect::<VmResult<_>>()?;
        assert!(feeder.join().expect("feeder"));
        assert_eq!(received, values);
        assert_eq!(relay.join().expect("relay"), values.len());

        assert!(b.add_input(0));
        assert_eq!(b.wait(), Some(Completion::Halted));
        assert_eq!(ja.join().expect("a").completion(), Some(Completion::Halted));
        assert_eq!(jb.join().expect("b").completion(), Some(Completion::Halted));
        Ok(())
    }

    #[test]
    fn pending_depths_track_queues() -> VmResult<()> {
        let machine = Machine::new(ECHO_ONCE, 4, 4)?;
        let host = machine.handle().expect("fresh machine");
        assert!(host.add_input(5));
        assert!(host.add_input(6));
        assert_eq!(host.pending_input(), 2);
        let join = thread::spawn(move || {
            let mut machine = machine;
            machine.run().map(|()| machine)
        });
        let machine = join.join().expect("machine thread").expect("clean halt");
        assert_eq!(host.pending_input(), 1);
        assert_eq!(host.pending_output(), 1);
        assert_eq!(host.outputs().collect::<Vec<_>>(), vec![5]);
        assert_eq!(machine.steps(), 3);
        Ok(())
    }

    #[test]
    fn dropping_an_unrun_machine_releases_waiters() -> VmResult<()> {
        let machine = Machine::new(ECHO_ONCE, 0, 0)?;
        let host = machine.handle().expect("fresh machine");
        let waiter = {
            let host = host.clone();
            thread::spawn(move || host.get_output_or_end())
        };
        thread::sleep(Duration::from_millis(10));
        drop(machine);
        assert_eq!(waiter.join().expect("waiter"), None);
        assert!(host.is_done());
        assert_eq!(host.completion(), None);
        assert!(!host.add_input(1));
        Ok(())
    }

    #[test]
    fn output_view_does_not_keep_input_open() -> VmResult<()> {
        let (host, join) = Machine::new(ECHO_UNTIL_ZERO, 0, 0)?.spawn()?;
        let view = host.output_view();
        assert!(host.add_input(3));
        assert_eq!(view.get_output()?, 3);
        drop(host);
        assert!(!view.add_input(4));
        assert_eq!(view.pending_input(), 0);
        assert_eq!(view.get_output_or_end(), None);
        assert_eq!(view.completion(), Some(Completion::Faulted(Fault::InputClosed { ip: 0 })));
        drop(join.join());
        Ok(())
    }
}
