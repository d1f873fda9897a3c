//! Tick-tock hand-off between the presenter and the simulation worker
//!
//! Two frame slots alternate. The worker writes the slot named by `calc`
//! while the presenter reads the slot named by `draw`; only the swap of
//! those two indices is guarded by the condition variable. The presenter's
//! loop is:
//!
//! ```no_run
//! # use shipsim::Engine;
//! # fn run(engine: &Engine) {
//! loop {
//!     engine.wait();
//!     engine.advance();
//!     let frame = engine.frame();
//!     // draw `frame`, queue clicks for the next step
//! }
//! # }
//! ```
//!
//! After the k-th `advance()`, `frame()` shows step `k - 1` while the worker
//! computes step `k` into the other slot.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use glam::Vec2;

use crate::error::EngineError;
use crate::sim::frame::Frame;
use crate::sim::pilot::Pilot;
use crate::sim::ship::{Command, Ship};
use crate::sim::state::World;
use crate::sim::tick::{Request, tick};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Indices and flags behind the condition variable
#[derive(Debug)]
struct TickTock {
    /// Slot the worker writes next (equal to `draw` when idle)
    calc: usize,
    /// Slot the presenter reads
    draw: usize,
    /// Steps requested so far
    step: u64,
    terminate: bool,
    /// The worker has exited, normally or by panicking
    stopped: bool,
    /// Requests handed over by the last `advance()`
    queued: Vec<Request>,
}

struct Shared {
    sync: Mutex<TickTock>,
    condition: Condvar,
    frames: [Mutex<Frame>; 2],
    /// Requests collected since the last `advance()`
    requests: Mutex<Vec<Request>>,
}

/// Marks the worker stopped however it exits, so `wait()` never hangs on
/// a dead worker
struct StopGuard<'a>(&'a Shared);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        let mut sync = lock(&self.0.sync);
        sync.stopped = true;
        self.0.condition.notify_all();
    }
}

/// Owns the worker thread that steps a [`World`]
pub struct Engine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<World>>,
}

impl Engine {
    /// Validate the world's settings and start the worker. Step 0 is
    /// computed right away.
    pub fn new(world: World, pilot: Box<dyn Pilot>) -> Result<Self, EngineError> {
        world.settings.validate()?;

        let shared = Arc::new(Shared {
            sync: Mutex::new(TickTock {
                calc: 1,
                draw: 0,
                step: 0,
                terminate: false,
                stopped: false,
                queued: Vec::new(),
            }),
            condition: Condvar::new(),
            frames: [Mutex::new(Frame::default()), Mutex::new(Frame::default())],
            requests: Mutex::new(Vec::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("sim-worker".into())
            .spawn(move || run(&worker_shared, world, pilot))?;
        log::info!("engine started");

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Block until the worker has finished the step it is computing.
    pub fn wait(&self) {
        let mut sync = lock(&self.shared.sync);
        while sync.calc != sync.draw && !sync.stopped {
            sync = self
                .shared
                .condition
                .wait(sync)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Present the step just finished and start computing the next one.
    /// Never blocks on the worker. Calling it again without `wait()` in
    /// between does not start a second computation.
    pub fn advance(&self) {
        let requests = std::mem::take(&mut *lock(&self.shared.requests));
        let mut sync = lock(&self.shared.sync);
        sync.step += 1;
        sync.draw = 1 - sync.draw;
        sync.queued.extend(requests);
        self.shared.condition.notify_all();
    }

    /// The frame being presented. The worker never writes this slot until
    /// the next `advance()`.
    pub fn frame(&self) -> MutexGuard<'_, Frame> {
        let draw = lock(&self.shared.sync).draw;
        lock(&self.shared.frames[draw])
    }

    /// Number of `advance()` calls so far
    pub fn step(&self) -> u64 {
        lock(&self.shared.sync).step
    }

    /// Queue a request for the step after the next `advance()`
    pub fn request(&self, request: Request) {
        lock(&self.shared.requests).push(request);
    }

    pub fn click(&self, point: Vec2, right: bool, shift: bool) {
        self.request(Request::Click { point, right, shift });
    }

    pub fn select_group(&self, group: u8, shift: bool, control: bool) {
        self.request(Request::SelectGroup {
            group,
            shift,
            control,
        });
    }

    /// Replace the flagship's keys
    pub fn set_keys(&self, keys: Command) {
        self.request(Request::Keys(keys));
    }

    pub fn add_ships(&self, ships: Vec<Ship>) {
        self.request(Request::AddShips(ships));
    }

    /// Stop the worker and take the world back.
    pub fn shutdown(mut self) -> Result<World, EngineError> {
        self.signal_terminate();
        let worker = self.worker.take().ok_or(EngineError::WorkerPanicked)?;
        let world = worker.join().map_err(|_| EngineError::WorkerPanicked)?;
        log::info!("engine stopped after {} steps", world.step);
        Ok(world)
    }

    fn signal_terminate(&self) {
        let mut sync = lock(&self.shared.sync);
        sync.terminate = true;
        self.shared.condition.notify_all();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.signal_terminate();
        if worker.join().is_err() {
            log::warn!("simulation worker panicked");
        } else {
            log::info!("engine stopped");
        }
    }
}

fn run(shared: &Shared, mut world: World, mut pilot: Box<dyn Pilot>) -> World {
    let _stop = StopGuard(shared);
    let step_seconds = world.settings.step_seconds();
    let smoothing = world.settings.load_smoothing;
    let mut load = 0.0;

    loop {
        let (slot, requests) = {
            let mut sync = lock(&shared.sync);
            while sync.calc == sync.draw && !sync.terminate {
                sync = shared
                    .condition
                    .wait(sync)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if sync.terminate {
                break;
            }
            (sync.calc, std::mem::take(&mut sync.queued))
        };

        {
            let start = Instant::now();
            let mut frame = lock(&shared.frames[slot]);
            tick(&mut world, &mut frame, pilot.as_mut(), requests);
            let elapsed = start.elapsed().as_secs_f64();
            load += (elapsed / step_seconds - load) * smoothing;
            frame.load = load;
            log::trace!("step {} took {:.3} ms", frame.step, elapsed * 1000.0);
        }

        let mut sync = lock(&shared.sync);
        sync.calc = sync.draw;
        shared.condition.notify_all();
    }
    world
}
