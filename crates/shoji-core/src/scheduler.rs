//! Main loop and redraw pacing.
//!
//! The loop itself is event-driven: each iteration drains deferred
//! callbacks, paints every visible dirty screen, and then blocks inside the
//! backend event pump until something happens. Animation cadence comes from
//! a separate pacing thread that periodically marks screens dirty through
//! their pulses and wakes the pump; it never touches a screen or its widget
//! tree directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::registry::ScreenRegistry;
use crate::screen::ScreenPulse;

/// Longest sleep between checks of the stop flag and tooltip fades.
const MAX_QUANTUM: Duration = Duration::from_millis(50);

/// How the pacing thread drives redraws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRate {
    /// Mark every screen dirty once per period. The period is subdivided
    /// into quanta no longer than 50ms so tooltip fades stay smooth and the
    /// loop shuts down promptly.
    Periodic(Duration),
    /// No unconditional redraws; the pacing thread only keeps tooltip fades
    /// animating.
    OnDemand,
    /// No pacing thread at all.
    Manual,
}

impl Default for RefreshRate {
    fn default() -> Self {
        RefreshRate::Periodic(Duration::from_millis(50))
    }
}

/// Quantum length and quanta-per-period for a refresh rate; `None` when no
/// pacing thread should run.
fn pacing_quanta(refresh: RefreshRate) -> Option<(Duration, usize)> {
    match refresh {
        RefreshRate::Periodic(period) => {
            let mut quantum = period.max(Duration::from_micros(1));
            let mut count = 1usize;
            while quantum > MAX_QUANTUM {
                quantum /= 2;
                count = count.saturating_mul(2);
            }
            Some((quantum, count))
        }
        RefreshRate::OnDemand => Some((MAX_QUANTUM, usize::MAX)),
        RefreshRate::Manual => None,
    }
}

type DeferredCallback = Box<dyn FnOnce(&mut ScreenRegistry) + Send>;

/// Handle for posting work onto the main loop from any thread.
///
/// Callbacks run on the main thread at the start of the next iteration, in
/// submission order.
#[derive(Clone)]
pub struct Deferred {
    queue: Arc<Mutex<Vec<DeferredCallback>>>,
}

impl Deferred {
    fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn post(&self, callback: impl FnOnce(&mut ScreenRegistry) + Send + 'static) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    fn drain(&self) -> Vec<DeferredCallback> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Blocking bridge into the backend's native event queue.
pub trait EventPump {
    /// Blocks until at least one backend event (or a waker kick) arrives and
    /// dispatches everything pending into the registry's screens.
    fn wait_events(
        &mut self,
        registry: &mut ScreenRegistry,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

#[derive(Debug)]
pub enum LoopError {
    /// `run` was entered while another run was still active.
    AlreadyRunning,
    Pump(Box<dyn std::error::Error>),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::AlreadyRunning => write!(f, "the main loop is already running"),
            LoopError::Pump(err) => write!(f, "event pump failed: {err}"),
        }
    }
}

impl std::error::Error for LoopError {}

pub struct MainLoop {
    registry: ScreenRegistry,
    deferred: Deferred,
    active: Arc<AtomicBool>,
    refresh: RefreshRate,
}

impl MainLoop {
    pub fn new(refresh: RefreshRate) -> Self {
        Self {
            registry: ScreenRegistry::new(),
            deferred: Deferred::new(),
            active: Arc::new(AtomicBool::new(false)),
            refresh,
        }
    }

    pub fn registry(&self) -> &ScreenRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ScreenRegistry {
        &mut self.registry
    }

    pub fn deferred(&self) -> Deferred {
        self.deferred.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// A flag other threads may clear to stop the loop after its current
    /// iteration.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Runs until all screens close, the stop flag is cleared, or the pump
    /// fails. The pacing thread lives exactly as long as the loop and is
    /// joined before returning.
    pub fn run(&mut self, pump: &mut dyn EventPump) -> Result<(), LoopError> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(LoopError::AlreadyRunning);
        }
        let pacer = self.spawn_pacing_thread();
        let result = self.run_inner(pump);
        self.active.store(false, Ordering::Release);
        if let Some(pacer) = pacer {
            if pacer.join().is_err() {
                log::error!("redraw pacing thread panicked");
            }
        }
        result
    }

    fn run_inner(&mut self, pump: &mut dyn EventPump) -> Result<(), LoopError> {
        while self.active.load(Ordering::Acquire) {
            for callback in self.deferred.drain() {
                callback(&mut self.registry);
            }

            let mut live = 0usize;
            for screen in self.registry.iter_mut() {
                if !screen.visible() {
                    continue;
                }
                if screen.close_requested() {
                    screen.set_visible(false);
                    continue;
                }
                screen.draw_all();
                live += 1;
            }
            if live == 0 {
                self.active.store(false, Ordering::Release);
                break;
            }

            if let Err(err) = pump.wait_events(&mut self.registry) {
                log::error!("event pump failed: {err}");
                self.active.store(false, Ordering::Release);
                return Err(LoopError::Pump(err));
            }
        }
        Ok(())
    }

    fn spawn_pacing_thread(&self) -> Option<thread::JoinHandle<()>> {
        let (quantum, count) = pacing_quanta(self.refresh)?;
        let pulses = self.registry.shared_pulses();
        let active = self.active.clone();
        let spawned = thread::Builder::new()
            .name(String::from("shoji-redraw"))
            .spawn(move || loop {
                for _ in 0..count {
                    if !active.load(Ordering::Acquire) {
                        return;
                    }
                    thread::sleep(quantum);
                    let pulses = pulses.lock().unwrap_or_else(PoisonError::into_inner);
                    for pulse in pulses.iter() {
                        if pulse.tooltip_fade_active() {
                            pulse.mark_dirty();
                        }
                    }
                }
                let pulses = pulses.lock().unwrap_or_else(PoisonError::into_inner);
                for pulse in pulses.iter() {
                    pulse.mark_dirty();
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("failed to spawn redraw pacing thread: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_refresh_subdivides_into_small_quanta() {
        let (quantum, count) = pacing_quanta(RefreshRate::Periodic(Duration::from_millis(400)))
            .expect("periodic pacing");
        assert_eq!(quantum, Duration::from_millis(50));
        assert_eq!(count, 8);
        assert_eq!(quantum * count as u32, Duration::from_millis(400));
    }

    #[test]
    fn short_refresh_is_a_single_quantum() {
        let (quantum, count) =
            pacing_quanta(RefreshRate::Periodic(Duration::from_millis(30))).expect("pacing");
        assert_eq!(quantum, Duration::from_millis(30));
        assert_eq!(count, 1);
    }

    #[test]
    fn on_demand_never_completes_a_period() {
        let (quantum, count) = pacing_quanta(RefreshRate::OnDemand).expect("pacing");
        assert_eq!(quantum, MAX_QUANTUM);
        assert_eq!(count, usize::MAX);
    }

    #[test]
    fn manual_spawns_no_pacer() {
        assert!(pacing_quanta(RefreshRate::Manual).is_none());
    }

    #[test]
    fn deferred_callbacks_drain_in_submission_order() {
        let deferred = Deferred::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let order = order.clone();
            deferred.post(move |_| order.lock().unwrap().push(i));
        }
        let mut registry = ScreenRegistry::new();
        for callback in deferred.drain() {
            callback(&mut registry);
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(deferred.drain().is_empty());
    }
}
