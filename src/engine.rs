use crate::config::{Settings, SettingsUpdate};
use crate::error::EngineError;
use crate::jitter::{self, JitterStats, LastMove};
use crate::models::RunState;
use crate::monitor::{self, ActivityState, MONITOR_TICK};
use crate::system::Pointer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound on how long `stop` waits for a loop to exit.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Everything both loops share, behind a single mutex.
#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub activity: ActivityState,
    pub stats: JitterStats,
}

struct Shared {
    ctx: Mutex<Context>,
    pointer: Arc<dyn Pointer>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Context> {
        // The context is plain data, so a panicked holder leaves nothing half-built.
        self.ctx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A periodic thread that can be told to stop between ticks.
struct Worker {
    name: &'static str,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawns `tick` in a loop. Each call returns how long to wait before the next one.
    fn spawn<F>(name: &'static str, mut tick: F) -> Result<Self, EngineError>
    where
        F: FnMut() -> Duration + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("cursorvibe-{}", name))
            .spawn(move || {
                loop {
                    let wait = tick();
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(|source| EngineError::Spawn { name, source })?;

        tracing::debug!(worker = name, "worker started");
        Ok(Self {
            name,
            stop_tx,
            done_rx,
            handle,
        })
    }

    /// Signals the loop and waits up to `grace` for it to finish.
    /// Returns false if the thread was left to exit on its own.
    fn stop(self, grace: Duration) -> bool {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(grace) {
            Ok(()) => {
                let _ = self.handle.join();
                tracing::debug!(worker = self.name, "worker stopped");
                true
            }
            Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!(worker = self.name, "worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    worker = self.name,
                    "worker did not stop within {:?}, detaching",
                    grace
                );
                false
            }
        }
    }
}

/// Point-in-time view for the presentation layer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub run_state: RunState,
    pub settings: Settings,
    pub idle_for: Duration,
    pub is_idle: bool,
    pub moves: u64,
    pub failures: u64,
    pub last_move: Option<LastMove>,
}

/// Owns the idle monitor (always on) and the jitter loop (toggled by the user).
pub struct Engine {
    shared: Arc<Shared>,
    monitor: Option<Worker>,
    jitter: Option<Worker>,
}

impl Engine {
    pub fn new(settings: Settings, pointer: Arc<dyn Pointer>) -> Result<Self, EngineError> {
        settings.validate()?;

        let now = Instant::now();
        let mut activity = ActivityState::new(now);
        monitor::sample(&mut activity, pointer.as_ref(), now);

        let shared = Arc::new(Shared {
            ctx: Mutex::new(Context {
                settings,
                activity,
                stats: JitterStats::default(),
            }),
            pointer,
        });

        let monitor_shared = Arc::clone(&shared);
        let monitor = Worker::spawn("monitor", move || {
            let mut ctx = monitor_shared.lock();
            monitor::sample(&mut ctx.activity, monitor_shared.pointer.as_ref(), Instant::now());
            MONITOR_TICK
        })?;

        Ok(Self {
            shared,
            monitor: Some(monitor),
            jitter: None,
        })
    }

    /// Starts the jitter loop. Returns `Ok(false)` if it was already running.
    pub fn start(&mut self) -> Result<bool, EngineError> {
        if self.jitter.is_some() {
            tracing::info!("jitter loop already running");
            return Ok(false);
        }

        let shared = Arc::clone(&self.shared);
        let mut rng = StdRng::from_entropy();
        let worker = Worker::spawn("jitter", move || {
            let mut ctx = shared.lock();
            jitter::tick(&mut ctx, shared.pointer.as_ref(), &mut rng, Instant::now());
            ctx.settings.interval()
        })?;

        self.jitter = Some(worker);
        tracing::info!("jitter loop started");
        Ok(true)
    }

    /// Stops the jitter loop. Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.jitter.take() {
            Some(worker) => {
                worker.stop(STOP_GRACE);
                tracing::info!("jitter loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.jitter.is_some()
    }

    pub fn run_state(&self) -> RunState {
        if self.is_running() {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    /// Validates and applies `update`; the next tick of either loop sees it.
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, EngineError> {
        let mut ctx = self.shared.lock();
        let next = ctx.settings.with_update(&update)?;
        tracing::info!(
            frequency = next.frequency,
            distance = next.distance,
            idle_threshold = next.idle_threshold,
            "settings updated"
        );
        ctx.settings = next.clone();
        Ok(next)
    }

    pub fn settings(&self) -> Settings {
        self.shared.lock().settings.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        let ctx = self.shared.lock();
        Snapshot {
            run_state: self.run_state(),
            settings: ctx.settings.clone(),
            idle_for: ctx.activity.idle_for(now),
            is_idle: ctx.activity.is_idle(now, ctx.settings.threshold()),
            moves: ctx.stats.moves,
            failures: ctx.stats.failures,
            last_move: ctx.stats.last_move,
        }
    }

    /// Stops both loops. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(monitor) = self.monitor.take() {
            monitor.stop(STOP_GRACE);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use crate::system::mock::MockPointer;

    fn fast_settings() -> Settings {
        Settings {
            frequency: 0.1,
            distance: 2,
            idle_threshold: 1,
            run_on_startup: false,
        }
    }

    fn engine(pointer: Arc<MockPointer>) -> Engine {
        Engine::new(fast_settings(), pointer).unwrap()
    }

    #[test]
    fn test_starts_stopped() {
        let e = engine(Arc::new(MockPointer::at(0, 0)));
        assert!(!e.is_running());
        assert_eq!(e.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut e = engine(Arc::new(MockPointer::at(0, 0)));
        assert!(e.start().unwrap());
        assert!(!e.start().unwrap());
        assert!(e.is_running());
        assert_eq!(e.run_state(), RunState::Running);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut e = engine(Arc::new(MockPointer::at(0, 0)));
        assert!(!e.stop());
        e.start().unwrap();
        assert!(e.stop());
        assert!(!e.stop());
        assert!(!e.is_running());
    }

    #[test]
    fn test_stop_is_prompt() {
        let mut e = Engine::new(
            Settings {
                frequency: 30.0,
                ..fast_settings()
            },
            Arc::new(MockPointer::at(0, 0)),
        )
        .unwrap();
        e.start().unwrap();
        let begin = Instant::now();
        assert!(e.stop());
        assert!(begin.elapsed() < STOP_GRACE);
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let bad = Settings {
            distance: -1,
            ..fast_settings()
        };
        assert!(matches!(
            Engine::new(bad, Arc::new(MockPointer::at(0, 0))),
            Err(EngineError::Settings(_))
        ));
    }

    #[test]
    fn test_update_settings() {
        let e = engine(Arc::new(MockPointer::at(0, 0)));
        let next = e
            .update_settings(SettingsUpdate {
                distance: Some(5),
                ..SettingsUpdate::default()
            })
            .unwrap();
        assert_eq!(next.distance, 5);
        assert_eq!(e.settings().distance, 5);

        assert!(e
            .update_settings(SettingsUpdate {
                idle_threshold: Some(0),
                ..SettingsUpdate::default()
            })
            .is_err());
        assert_eq!(e.settings().idle_threshold, 1);
    }

    #[test]
    fn test_update_settings_bounds_later_moves() {
        let pointer = Arc::new(MockPointer::at(100, 100));
        let mut e = Engine::new(
            Settings {
                distance: 0,
                ..fast_settings()
            },
            Arc::clone(&pointer) as Arc<dyn Pointer>,
        )
        .unwrap();
        e.start().unwrap();
        thread::sleep(Duration::from_millis(1400));

        let before = pointer.moves();
        assert!(!before.is_empty());
        assert!(before.iter().all(|p| *p == Position::new(100, 100)));

        e.update_settings(SettingsUpdate {
            distance: Some(5),
            ..SettingsUpdate::default()
        })
        .unwrap();
        thread::sleep(Duration::from_millis(800));
        e.stop();

        let moves = pointer.moves();
        let mut prev = Position::new(100, 100);
        let mut nonzero = false;
        for to in &moves {
            let (dx, dy) = (to.x - prev.x, to.y - prev.y);
            assert!(dx.abs() <= 5 && dy.abs() <= 5, "step ({dx}, {dy})");
            nonzero |= dx != 0 || dy != 0;
            prev = *to;
        }
        assert!(moves.len() > before.len());
        assert!(nonzero);
    }

    #[test]
    fn test_idle_pointer_gets_jittered() {
        let pointer = Arc::new(MockPointer::at(100, 100));
        let mut e = engine(Arc::clone(&pointer));
        e.start().unwrap();
        thread::sleep(Duration::from_millis(1600));
        e.stop();

        let moves = pointer.moves();
        assert!(!moves.is_empty());
        assert_eq!(e.snapshot().moves, moves.len() as u64);
    }

    #[test]
    fn test_no_jitter_while_stopped() {
        let pointer = Arc::new(MockPointer::at(100, 100));
        let e = engine(Arc::clone(&pointer));
        thread::sleep(Duration::from_millis(1300));
        assert!(pointer.moves().is_empty());
        assert!(e.snapshot().is_idle);
    }

    #[test]
    fn test_shutdown_twice() {
        let mut e = engine(Arc::new(MockPointer::at(0, 0)));
        e.start().unwrap();
        e.shutdown();
        e.shutdown();
        assert!(!e.is_running());
    }
}
