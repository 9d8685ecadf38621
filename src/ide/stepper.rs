//! Continuous execution on a background thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel as cbc;

use crate::asm::Assemble;
use crate::sim::Emulator;

use super::{lock, Controller};

/// Why the stepper thread exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Cancelled,
    Inactive,
    TicksClosed,
    ControllerDropped,
}

/// Calls [`Controller::tick`] every time a tick is received, until the controller stops auto-stepping.
///
/// The stepper holds a weak reference to the controller,
/// so it never keeps a torn-down controller alive.
///
/// Once cancelled (explicitly or by dropping the stepper), no further ticks reach the controller.
pub struct AutoStepper {
    cancelled: Arc<AtomicBool>,
    stop_tx: Option<cbc::Sender<()>>,
    handle: Option<JoinHandle<()>>
}
impl AutoStepper {
    /// Starts stepping the controller whenever the tick receiver yields.
    ///
    /// Use [`crossbeam_channel::tick`] for a fixed cadence,
    /// or any other receiver to drive the controller from an external clock.
    pub fn spawn<A, E>(controller: Weak<Mutex<Controller<A, E>>>, ticks: cbc::Receiver<Instant>) -> Self
        where A: Assemble + Send + 'static,
              E: Emulator + Send + 'static
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = cbc::bounded::<()>(0);

        let flag = Arc::clone(&cancelled);
        let handle = std::thread::spawn(move || {
            tracing::debug!("auto-step started");
            let exit = loop {
                cbc::select! {
                    recv(stop_rx) -> _ => break Exit::Cancelled,
                    recv(ticks) -> msg => {
                        if msg.is_err() { break Exit::TicksClosed };
                        let Some(ctrl) = controller.upgrade() else { break Exit::ControllerDropped };
                        let mut ctrl = lock(&ctrl);

                        // a tick may have been selected after cancellation
                        if flag.load(Ordering::Acquire) { break Exit::Cancelled };
                        if !ctrl.tick() { break Exit::Inactive };
                    }
                }
            };
            tracing::debug!(reason = ?exit, "auto-step stopped");
        });

        Self { cancelled, stop_tx: Some(stop_tx), handle: Some(handle) }
    }

    /// Whether the stepper thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the stepper. No more ticks reach the controller after this returns.
    ///
    /// This must not be called while holding the controller's lock.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    /// Waits for the stepper to exit on its own.
    ///
    /// It exits once the controller stops auto-stepping or the tick source closes.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            // a panic in the thread already poisoned the lock, which is recovered from
            let _ = handle.join();
        }
    }

    fn shutdown(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // disconnecting wakes the thread
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
impl Drop for AutoStepper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
impl std::fmt::Debug for AutoStepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoStepper")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crossbeam_channel as cbc;

    use crate::ide::{lock, Controller};
    use crate::puzzle::{PuzzleTest, TestSet};

    use super::AutoStepper;

    const ECHO: &str = "
        loop: subleq tmp, @IN
        subleq @OUT, tmp
        subleq tmp, tmp, loop
        tmp: .data 0
    ";

    fn controller() -> Arc<Mutex<Controller>> {
        let tests = PuzzleTest::single(TestSet::new([1, 2, 3, 4], [1, 2, 3, 4]));
        let mut ctrl = Controller::new(tests);
        ctrl.run(ECHO).unwrap();
        Arc::new(Mutex::new(ctrl))
    }

    fn ticks(n: usize) -> cbc::Receiver<Instant> {
        let (tx, rx) = cbc::bounded(n);
        for _ in 0..n {
            tx.send(Instant::now()).unwrap();
        }
        rx
    }

    #[test]
    fn test_steps_once_per_tick() {
        let ctrl = controller();
        AutoStepper::spawn(Arc::downgrade(&ctrl), ticks(5)).join();

        let ctrl = lock(&ctrl);
        assert_eq!(ctrl.session().cycles_executed(), 5);
        assert!(ctrl.is_auto_stepping());
    }

    #[test]
    fn test_stops_when_inactive() {
        let ctrl = controller();
        lock(&ctrl).pause();

        let (tx, rx) = cbc::unbounded();
        let stepper = AutoStepper::spawn(Arc::downgrade(&ctrl), rx);
        tx.send(Instant::now()).unwrap();
        stepper.join();

        assert_eq!(lock(&ctrl).session().cycles_executed(), 0);
        // the thread is gone, so the tick source is disconnected
        assert!(tx.send(Instant::now()).is_err());
    }

    #[test]
    fn test_cancel() {
        let ctrl = controller();
        let (tx, rx) = cbc::unbounded();
        let stepper = AutoStepper::spawn(Arc::downgrade(&ctrl), rx);
        stepper.cancel();

        let _ = tx.send(Instant::now());
        assert_eq!(lock(&ctrl).session().cycles_executed(), 0);
        assert!(lock(&ctrl).is_auto_stepping());
    }

    #[test]
    fn test_controller_dropped() {
        let ctrl = controller();
        let weak = Arc::downgrade(&ctrl);
        drop(ctrl);

        let stepper = AutoStepper::spawn(weak, cbc::tick(Duration::from_millis(1)));
        stepper.join();
    }
}
