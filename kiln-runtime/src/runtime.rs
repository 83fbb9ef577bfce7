//! Logic and render threads
//!
//! The logic thread ticks the scene map at a fixed rate. The render thread
//! harvests every activated scene in render order and hands the frame to the
//! backend. The two threads only meet inside the scenes' harvest queues.

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::frame::{Frame, RenderBackend};
use crossbeam::channel::{self, Receiver, Sender};
use kiln_scene::{SceneMap, Tick};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shared counters (atomic for lock-free reads)
#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    frames: AtomicU64,
    last_tick_us: AtomicU64,
    last_frame_us: AtomicU64,
}

/// Running logic and render threads over one scene map
pub struct Runtime {
    config: RuntimeConfig,
    scenes: Arc<SceneMap>,
    counters: Arc<Counters>,
    errors: Receiver<RuntimeError>,

    // Thread control
    running: Arc<AtomicBool>,
    logic_thread: Option<JoinHandle<()>>,
    render_thread: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Validate `config` and spawn both threads
    pub fn start<B: RenderBackend>(
        config: RuntimeConfig,
        scenes: Arc<SceneMap>,
        backend: B,
    ) -> RuntimeResult<Self> {
        config.validate()?;

        let counters = Arc::new(Counters::default());
        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, errors) = channel::bounded(1);

        let logic_thread = Self::spawn_logic_thread(
            config.clone(),
            scenes.clone(),
            counters.clone(),
            running.clone(),
        )?;

        let render_thread = match Self::spawn_render_thread(
            config.clone(),
            scenes.clone(),
            backend,
            counters.clone(),
            running.clone(),
            error_tx,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                running.store(false, Ordering::Relaxed);
                logic_thread.join().ok();
                return Err(err);
            }
        };

        log::info!(
            "runtime started: {} ticks/s, frame rate {:?}",
            config.tick_rate,
            config.frame_rate
        );

        Ok(Self {
            config,
            scenes,
            counters,
            errors,
            running,
            logic_thread: Some(logic_thread),
            render_thread: Some(render_thread),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn scenes(&self) -> &Arc<SceneMap> {
        &self.scenes
    }

    /// `false` once shut down or after the backend reported an error
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The backend error that stopped the runtime, if any
    pub fn take_error(&self) -> Option<RuntimeError> {
        self.errors.try_recv().ok()
    }

    /// Get statistics
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            frames: self.counters.frames.load(Ordering::Relaxed),
            last_tick: Duration::from_micros(self.counters.last_tick_us.load(Ordering::Relaxed)),
            last_frame: Duration::from_micros(self.counters.last_frame_us.load(Ordering::Relaxed)),
        }
    }

    fn spawn_logic_thread(
        config: RuntimeConfig,
        scenes: Arc<SceneMap>,
        counters: Arc<Counters>,
        running: Arc<AtomicBool>,
    ) -> RuntimeResult<JoinHandle<()>> {
        thread::Builder::new()
            .name("kiln-logic".to_string())
            .spawn(move || {
                pin_current_thread("logic", config.logic_core);

                let interval = config.tick_interval();
                let mut pacer = Pacer::new(Some(interval));
                let mut previous: Option<Instant> = None;
                let mut index = 0u64;

                while running.load(Ordering::Relaxed) {
                    let start = Instant::now();
                    let delta = previous.map_or(interval, |previous| start - previous);
                    let tick = Tick::new(index, delta);
                    previous = Some(start);

                    if config.parallel_scene_updates {
                        scenes.update_scenes_parallel(&tick);
                    } else {
                        scenes.update_scenes(&tick);
                    }

                    index += 1;
                    counters.ticks.fetch_add(1, Ordering::Relaxed);
                    counters
                        .last_tick_us
                        .store(elapsed_micros(start), Ordering::Relaxed);
                    pacer.wait();
                }

                log::info!("logic thread exiting after {index} ticks");
            })
            .map_err(RuntimeError::ThreadSpawn)
    }

    fn spawn_render_thread<B: RenderBackend>(
        config: RuntimeConfig,
        scenes: Arc<SceneMap>,
        mut backend: B,
        counters: Arc<Counters>,
        running: Arc<AtomicBool>,
        errors: Sender<RuntimeError>,
    ) -> RuntimeResult<JoinHandle<()>> {
        thread::Builder::new()
            .name("kiln-render".to_string())
            .spawn(move || {
                pin_current_thread("render", config.render_core);

                let mut pacer = Pacer::new(config.frame_interval());
                let mut index = 0u64;

                while running.load(Ordering::Relaxed) {
                    let start = Instant::now();
                    let frame = Frame::capture(index, &scenes);

                    if let Err(err) = backend.render_frame(&frame) {
                        log::error!("render backend failed on frame {index}: {err}");
                        running.store(false, Ordering::Relaxed);
                        let _ = errors.try_send(err);
                        break;
                    }

                    index += 1;
                    counters.frames.fetch_add(1, Ordering::Relaxed);
                    counters
                        .last_frame_us
                        .store(elapsed_micros(start), Ordering::Relaxed);
                    pacer.wait();
                }

                log::info!("render thread exiting after {index} frames");
            })
            .map_err(RuntimeError::ThreadSpawn)
    }

    /// Stop both threads and wait for them
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);

        for handle in [self.logic_thread.take(), self.render_thread.take()]
            .into_iter()
            .flatten()
        {
            if handle.join().is_err() {
                log::error!("runtime thread panicked");
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub frames: u64,
    pub last_tick: Duration,
    pub last_frame: Duration,
}

/// Fixed-rate loop pacing
///
/// Deadlines advance by whole intervals; a loop that falls behind resets its
/// deadline instead of bursting to catch up.
struct Pacer {
    interval: Option<Duration>,
    deadline: Instant,
}

impl Pacer {
    fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            deadline: Instant::now(),
        }
    }

    fn wait(&mut self) {
        let Some(interval) = self.interval else {
            thread::yield_now();
            return;
        };

        self.deadline += interval;
        let now = Instant::now();
        if self.deadline > now {
            thread::sleep(self.deadline - now);
        } else {
            self.deadline = now;
        }
    }
}

fn elapsed_micros(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

fn pin_current_thread(role: &str, core: Option<usize>) {
    let Some(core) = core else {
        return;
    };

    let available = core_affinity::get_core_ids().unwrap_or_default();
    match available.into_iter().find(|id| id.id == core) {
        Some(id) if core_affinity::set_for_current(id) => {
            log::info!("{role} thread pinned to core {core}");
        }
        Some(_) => log::warn!("failed to pin {role} thread to core {core}"),
        None => log::warn!("core {core} not available for the {role} thread"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_scene::{
        CommandBuffer, Component, ComponentBase, QuadComponent, RenderStates, Scene,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Default)]
    struct Spin {
        base: ComponentBase,
        updates: AtomicUsize,
    }

    impl Component for Spin {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn update(&self, tick: &Tick) {
            if let Some(transform) = self.base.transform() {
                transform.rotate(90.0 * tick.delta_secs());
            }
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records scene names and draw counts of every frame
    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<(Vec<String>, usize)>>>,
        fail_at: Option<u64>,
    }

    impl RenderBackend for Recorder {
        fn render_frame(&mut self, frame: &Frame) -> RuntimeResult<()> {
            if self.fail_at == Some(frame.index) {
                return Err(RuntimeError::Backend("device lost".to_string()));
            }
            let mut buffer = CommandBuffer::new();
            let drawn = frame.draw(&mut buffer, &RenderStates::default());
            let names = frame.scenes.iter().map(|scene| scene.name.clone()).collect();
            self.frames.lock().push((names, drawn));
            Ok(())
        }
    }

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            tick_rate: 500,
            frame_rate: Some(500),
            ..RuntimeConfig::default()
        }
    }

    fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RuntimeConfig {
            tick_rate: 0,
            ..RuntimeConfig::default()
        };
        let result = Runtime::start(config, Arc::new(SceneMap::new()), Recorder::default());
        assert!(matches!(result, Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn test_ticks_and_frames() {
        init_logging();

        let map = Arc::new(SceneMap::new());
        let scene = Scene::new("world");
        let object = scene.create_object("spinner");
        let spin = object.add_component::<Spin>().unwrap();
        object.add_component::<QuadComponent>().unwrap();
        map.add_scene(scene);

        let recorder = Recorder::default();
        let frames = recorder.frames.clone();
        let mut runtime = Runtime::start(fast_config(), map, recorder).unwrap();

        assert!(wait_until(|| {
            let stats = runtime.stats();
            stats.ticks >= 5 && stats.frames >= 5
        }));
        runtime.shutdown();
        assert!(!runtime.is_running());

        assert!(spin.updates.load(Ordering::Relaxed) > 0);
        assert!(runtime.take_error().is_none());

        let frames = frames.lock();
        assert!(frames.len() as u64 >= 5);
        assert!(frames.iter().all(|(names, drawn)| names == &["world"] && *drawn == 1));
    }

    #[test]
    fn test_parallel_updates() {
        init_logging();

        let map = Arc::new(SceneMap::new());
        let spins: Vec<Arc<Spin>> = (0..4)
            .map(|i| {
                let scene = Scene::new(&format!("scene {i}"));
                let spin = scene.create_object("spinner").add_component::<Spin>().unwrap();
                map.add_scene(scene);
                spin
            })
            .collect();

        let config = RuntimeConfig {
            parallel_scene_updates: true,
            frame_rate: None,
            ..fast_config()
        };
        let mut runtime = Runtime::start(config, map, Recorder::default()).unwrap();
        assert!(wait_until(|| spins
            .iter()
            .all(|spin| spin.updates.load(Ordering::Relaxed) >= 3)));
        runtime.shutdown();
    }

    #[test]
    fn test_backend_error_stops_runtime() {
        init_logging();

        let recorder = Recorder {
            fail_at: Some(3),
            ..Recorder::default()
        };
        let frames = recorder.frames.clone();
        let runtime = Runtime::start(fast_config(), Arc::new(SceneMap::new()), recorder).unwrap();

        assert!(wait_until(|| !runtime.is_running()));
        match runtime.take_error() {
            Some(RuntimeError::Backend(message)) => assert_eq!(message, "device lost"),
            other => panic!("unexpected error report: {other:?}"),
        }
        assert_eq!(frames.lock().len(), 3);
        assert_eq!(runtime.stats().frames, 3);
    }

    #[test]
    fn test_drop_joins_threads() {
        let map = Arc::new(SceneMap::new());
        let runtime = Runtime::start(fast_config(), map.clone(), Recorder::default()).unwrap();
        assert!(wait_until(|| runtime.stats().ticks > 0));
        drop(runtime);

        // both threads released their handles on the map
        assert_eq!(Arc::strong_count(&map), 1);
    }
}
