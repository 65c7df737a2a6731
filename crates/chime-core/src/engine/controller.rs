//! Engine lifecycle controller
//!
//! Owns the activation state machine and the public playback surface.
//! Activation is enable-gated: nothing touches the platform until
//! [`AudioEngine::enable`] is called. Concurrent starts share a single
//! activation sequence through a claim on the state channel; failed
//! activations retry with exponential backoff until a cap, after which the
//! engine parks in `Failed` until disposed. Playback entry points never
//! panic or propagate errors: they report success as `bool` and degrade to
//! silence when the engine isn't available.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossbeam::channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::analysis::{AnalysisFeed, AnalysisSnapshot};
use crate::audio::{AudioBackend, EngineError, EngineResult, OfflineBackend};
use crate::config::EngineConfig;
use crate::engine::bus::MasterBus;
use crate::engine::chain::{ChainManager, EffectParams};
use crate::engine::events::{EngineEvent, EventBus};
use crate::engine::pool::PoolStats;
use crate::engine::transport::{LoopCallback, Transport};
use crate::music::{note_frequency, Interval};
use crate::synth::VoiceTrigger;
use crate::types::{StereoSample, VoiceType, BLOCK_SIZE};

/// Reserved chain id for the spawn cue
const SPAWN_CUE_ID: &str = "chime:spawn-cue";

/// Reserved chain id for the held intro note
const HELD_NOTE_ID: &str = "chime:held-note";

/// Lifecycle states of the audio engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing activated; the state after construction and after dispose
    Uninitialized,
    /// One caller owns an in-flight activation attempt
    Initializing,
    /// The graph is live and rendering
    Ready,
    /// An attempt failed; a backoff retry is scheduled
    Suspended,
    /// Retries exhausted or the platform is unsupported; terminal until
    /// dispose
    Failed,
}

/// How a successful [`AudioEngine::start_engine`] call resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This caller ran the activation sequence
    Started,
    /// The engine was already `Ready`
    AlreadyRunning,
    /// Another caller's in-flight activation was shared
    Joined,
}

/// Static facts about the active output path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMetrics {
    pub sample_rate: u32,
    pub buffer_size: Option<u32>,
    /// Buffer latency estimate in milliseconds
    pub output_latency_ms: f32,
}

impl PerformanceMetrics {
    fn new(sample_rate: u32, buffer_size: Option<u32>) -> Self {
        let output_latency_ms = buffer_size
            .map(|frames| frames as f32 / sample_rate as f32 * 1000.0)
            .unwrap_or(0.0);
        Self {
            sample_rate,
            buffer_size,
            output_latency_ms,
        }
    }
}

/// Options for [`AudioEngine::play_voice`]
#[derive(Debug, Clone)]
pub struct PlayOptions {
    /// Note names like `"C4"`; `None` uses the flavor's defaults
    pub notes: Option<Vec<String>>,
    /// Velocity scaling, 0..1
    pub velocity: f32,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            notes: None,
            velocity: 1.0,
        }
    }
}

/// The live synthesis graph, present only while `Ready`
struct Graph {
    bus: MasterBus,
    chains: ChainManager,
}

struct EngineInner {
    config: EngineConfig,
    backend: Arc<dyn AudioBackend>,
    enabled: AtomicBool,
    state_tx: watch::Sender<EngineState>,
    /// Consecutive failed activation attempts; reset on success
    attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
    graph: Mutex<Option<Graph>>,
    transport: Mutex<Transport>,
    analysis: Mutex<AnalysisFeed>,
    events: EventBus,
    /// Frame-render and pool-sweep tasks, aborted on dispose
    tasks: Mutex<Vec<JoinHandle<()>>>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    metrics: Mutex<Option<PerformanceMetrics>>,
}

impl EngineInner {
    /// Drive the state machine until this caller either owns an activation
    /// attempt or can share the outcome of someone else's.
    async fn start_engine(self: &Arc<Self>) -> EngineResult<StartOutcome> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(EngineError::NotEnabled);
        }
        let mut rx = self.state_tx.subscribe();
        loop {
            let mut claimed = false;
            let mut observed = EngineState::Uninitialized;
            self.state_tx.send_modify(|state| {
                observed = *state;
                if matches!(*state, EngineState::Uninitialized | EngineState::Suspended) {
                    *state = EngineState::Initializing;
                    claimed = true;
                }
            });
            if claimed {
                self.run_activation().await?;
                return Ok(StartOutcome::Started);
            }
            match observed {
                EngineState::Ready => return Ok(StartOutcome::AlreadyRunning),
                EngineState::Failed => return Err(self.terminal_error()),
                // Another caller owns the attempt; wait for its outcome
                _ => loop {
                    if rx.changed().await.is_err() {
                        return Err(EngineError::Disposed);
                    }
                    let state = *rx.borrow_and_update();
                    match state {
                        EngineState::Ready => return Ok(StartOutcome::Joined),
                        EngineState::Failed => return Err(self.terminal_error()),
                        EngineState::Initializing => continue,
                        // Claimable again
                        _ => break,
                    }
                },
            }
        }
    }

    fn terminal_error(&self) -> EngineError {
        EngineError::RetriesExhausted {
            attempts: self.attempts.load(Ordering::SeqCst),
            last_error: self
                .last_error
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// One owned activation attempt; the state is `Initializing` on entry.
    ///
    /// Boxed: the scheduled retry re-enters `start_engine`, which would
    /// otherwise make this future's type recursive.
    fn run_activation(self: &Arc<Self>) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send>> {
        let inner = Arc::clone(self);
        Box::pin(async move {
            let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!("audio activation attempt {attempt}");

            if !inner.backend.is_supported() {
                let err = EngineError::PlatformUnsupported;
                inner.fail_terminally(err.to_string());
                return Err(err);
            }

            match inner.activate_with_timeout().await {
                Ok(()) => {
                    inner.finish_activation().await;
                    Ok(())
                }
                Err(err) => {
                    *inner.last_error.lock().unwrap() = Some(err.to_string());
                    if attempt < inner.config.retry.max_attempts {
                        let delay = inner.config.retry.backoff_delay(attempt);
                        log::warn!(
                            "activation attempt {attempt} failed ({err}); retrying in {} ms",
                            delay.as_millis()
                        );
                        inner.state_tx.send_replace(EngineState::Suspended);
                        let weak = Arc::downgrade(&inner);
                        let handle = tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            if let Some(inner) = weak.upgrade() {
                                let _ = inner.start_engine().await;
                            }
                        });
                        *inner.retry_task.lock().unwrap() = Some(handle);
                    } else {
                        inner.fail_terminally(err.to_string());
                    }
                    Err(err)
                }
            }
        })
    }

    /// Backend activation with a hang guard
    async fn activate_with_timeout(&self) -> EngineResult<()> {
        let backend = self.backend.clone();
        let activation = tokio::task::spawn_blocking(move || backend.activate());
        match tokio::time::timeout(self.config.activation_timeout(), activation).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::InitFailure(join_err.to_string())),
            Err(_) => Err(EngineError::InitTimeout(self.config.activation_timeout_ms)),
        }
    }

    /// Build the graph and flip to `Ready`
    async fn finish_activation(self: &Arc<Self>) {
        let sample_rate = self.backend.sample_rate();
        let volume = self.config.master_volume;
        // Device backends only report their real rate once activated
        self.analysis.lock().unwrap().set_sample_rate(sample_rate);

        // Bus construction gets its own timeout; on expiry or failure the
        // engine runs a passthrough bus rather than failing activation
        let backend = Arc::clone(&self.backend);
        let build = tokio::task::spawn_blocking(move || -> EngineResult<MasterBus> {
            backend.prepare_effects()?;
            Ok(MasterBus::build(sample_rate, volume))
        });
        let bus = match tokio::time::timeout(self.config.bus_timeout(), build).await {
            Ok(Ok(Ok(bus))) => bus,
            Ok(Ok(Err(err))) => {
                log::error!("master bus construction failed: {err}");
                MasterBus::passthrough(volume)
            }
            Ok(Err(join_err)) => {
                log::error!("master bus construction panicked: {join_err}");
                MasterBus::passthrough(volume)
            }
            Err(_) => {
                log::error!(
                    "master bus construction timed out after {} ms",
                    self.config.bus_timeout_ms
                );
                MasterBus::passthrough(volume)
            }
        };

        *self.graph.lock().unwrap() = Some(Graph {
            bus,
            chains: ChainManager::new(self.config.pool.clone(), sample_rate),
        });
        self.attempts.store(0, Ordering::SeqCst);
        *self.last_error.lock().unwrap() = None;

        let buffer_size = self.backend.buffer_size();
        *self.metrics.lock().unwrap() = Some(PerformanceMetrics::new(sample_rate, buffer_size));

        self.spawn_frame_task();
        self.spawn_sweep_task();
        self.state_tx.send_replace(EngineState::Ready);
        self.events.publish(EngineEvent::InitSucceeded {
            sample_rate,
            buffer_size,
        });
        log::info!("audio engine ready at {sample_rate} Hz");
    }

    fn fail_terminally(&self, error: String) {
        log::error!("audio engine failed terminally: {error}");
        *self.last_error.lock().unwrap() = Some(error.clone());
        self.state_tx.send_replace(EngineState::Failed);
        self.events.publish(EngineEvent::InitFailed { error });
    }

    /// Wait until the engine is usable, kicking activation when needed.
    /// Resolves `false` when disabled or terminally failed.
    async fn ensure_ready(self: &Arc<Self>) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        let mut rx = self.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                EngineState::Ready => return true,
                EngineState::Failed => return false,
                EngineState::Uninitialized => {
                    // Failure here schedules its own retry; keep waiting
                    let _ = self.start_engine().await;
                }
                EngineState::Initializing | EngineState::Suspended => {
                    if rx.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn spawn_frame_task(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.config.frame_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.render_frame();
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    fn spawn_sweep_task(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.config.pool.sweep_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick is immediate; skip it so the first sweep happens
            // one full interval in
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let mut graph = inner.graph.lock().unwrap();
                if let Some(graph) = graph.as_mut() {
                    graph.chains.sweep_pool(Instant::now());
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Render one block through the graph, push it to the backend, and feed
    /// the analysis tap
    fn render_frame(&self) {
        let mut block = vec![StereoSample::zero(); BLOCK_SIZE];
        {
            let mut graph = self.graph.lock().unwrap();
            let Some(graph) = graph.as_mut() else { return };
            graph.chains.render(&mut block);
            graph.bus.process(&mut block);
        }
        self.backend.write(&block);
        let mut analysis = self.analysis.lock().unwrap();
        analysis.push_block(&block);
        analysis.tick();
    }

    /// Trigger on the live graph; `false` when the graph is gone
    fn trigger_now(&self, id: &str, voice_type: VoiceType, trigger: VoiceTrigger) -> bool {
        let mut graph = self.graph.lock().unwrap();
        match graph.as_mut() {
            Some(graph) => {
                graph.chains.trigger(id, voice_type, &trigger);
                true
            }
            None => false,
        }
    }

    /// Default trigger for a voice flavor, transposed into the configured key
    fn build_trigger(
        &self,
        voice_type: VoiceType,
        notes: Option<&[String]>,
        velocity: f32,
    ) -> VoiceTrigger {
        let (defaults, duration): (&[&str], Interval) = match voice_type {
            VoiceType::Note => (&["C4"], Interval::Division(8)),
            VoiceType::Chord => (&["C4", "E4", "G4"], Interval::Division(2)),
            VoiceType::Beat => (&["C2"], Interval::Division(8)),
        };
        let key = self.config.key.as_str();
        let freqs: Vec<f32> = match notes {
            Some(notes) if !notes.is_empty() => {
                notes.iter().map(|n| note_frequency(n, key)).collect()
            }
            _ => defaults.iter().map(|n| note_frequency(n, key)).collect(),
        };
        let mut trigger = VoiceTrigger::new(freqs, duration.seconds(self.config.bpm) as f32);
        trigger.velocity = velocity;
        trigger
    }

    fn dispose(&self) {
        log::info!("disposing audio engine");
        if let Some(handle) = self.retry_task.lock().unwrap().take() {
            handle.abort();
        }
        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
        self.transport.lock().unwrap().stop_all();
        if let Some(mut graph) = self.graph.lock().unwrap().take() {
            graph.chains.dispose_all();
        }
        self.analysis.lock().unwrap().reset();
        *self.metrics.lock().unwrap() = None;
        *self.last_error.lock().unwrap() = None;
        self.attempts.store(0, Ordering::SeqCst);
        self.state_tx.send_replace(EngineState::Uninitialized);
    }
}

/// Public handle to the synthesis engine
///
/// Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Engine over the in-process offline backend
    pub fn new(config: EngineConfig) -> Self {
        let backend = Arc::new(OfflineBackend::new());
        Self::with_backend(config, backend)
    }

    /// Engine over a caller-supplied backend
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let (state_tx, _) = watch::channel(EngineState::Uninitialized);
        let analysis = AnalysisFeed::new(config.fft_size, backend.sample_rate());
        let transport = Transport::new(config.bpm);
        Self {
            inner: Arc::new(EngineInner {
                backend,
                enabled: AtomicBool::new(false),
                state_tx,
                attempts: AtomicU32::new(0),
                last_error: Mutex::new(None),
                graph: Mutex::new(None),
                transport: Mutex::new(transport),
                analysis: Mutex::new(analysis),
                events: EventBus::new(),
                tasks: Mutex::new(Vec::new()),
                retry_task: Mutex::new(None),
                metrics: Mutex::new(None),
                config,
            }),
        }
    }

    /// Open the activation gate (call on a user gesture)
    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Activate the engine, sharing in-flight activations
    ///
    /// Safe to call from any number of tasks; exactly one backend
    /// activation sequence runs regardless.
    pub async fn start_engine(&self) -> EngineResult<StartOutcome> {
        self.inner.start_engine().await
    }

    /// Convenience wrapper: `true` when the engine came up
    pub async fn start(&self) -> bool {
        self.inner.start_engine().await.is_ok()
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state_tx.borrow()
    }

    /// Watch lifecycle state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive one-shot lifecycle events
    pub fn subscribe_events(&self) -> Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Failed activation attempts so far; 0 after success or dispose
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().unwrap().clone()
    }

    /// Trigger a voice for an object id, activating the engine first if
    /// needed. Never panics; `false` covers every failure mode.
    pub async fn play_voice(&self, id: &str, voice_type: VoiceType, options: PlayOptions) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        let trigger =
            self.inner
                .build_trigger(voice_type, options.notes.as_deref(), options.velocity);
        self.inner.trigger_now(id, voice_type, trigger)
    }

    /// Short high cue played when an object enters the scene
    pub async fn play_spawn_cue(&self) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        let key = self.inner.config.key.as_str();
        let mut trigger = VoiceTrigger::new(
            vec![note_frequency("C6", key)],
            Interval::Division(16).seconds(self.inner.config.bpm) as f32,
        );
        trigger.velocity = 0.7;
        self.inner.trigger_now(SPAWN_CUE_ID, VoiceType::Note, trigger)
    }

    /// Hold a note until [`AudioEngine::stop_note`]
    pub async fn start_note(&self, note: &str) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        let key = self.inner.config.key.as_str();
        // Duration 0 sustains until release
        let trigger = VoiceTrigger::new(vec![note_frequency(note, key)], 0.0);
        self.inner.trigger_now(HELD_NOTE_ID, VoiceType::Note, trigger)
    }

    /// Release the held note
    pub fn stop_note(&self) {
        self.release_voice(HELD_NOTE_ID);
    }

    /// Begin envelope release for an object's voice
    pub fn release_voice(&self, id: &str) {
        if let Some(graph) = self.inner.graph.lock().unwrap().as_mut() {
            graph.chains.release(id);
        }
    }

    /// Tear down one object's chain, returning its voice to the pool
    pub fn dispose_voice(&self, id: &str) {
        if let Some(graph) = self.inner.graph.lock().unwrap().as_mut() {
            graph.chains.dispose(id);
        }
    }

    pub fn dispose_all_voices(&self) {
        if let Some(graph) = self.inner.graph.lock().unwrap().as_mut() {
            graph.chains.dispose_all();
        }
    }

    /// Store per-object effect settings (applied now if the chain exists)
    pub fn set_voice_params(&self, id: &str, params: EffectParams) {
        if let Some(graph) = self.inner.graph.lock().unwrap().as_mut() {
            graph.chains.set_params(id, params);
        }
    }

    /// Move an object's spatial position
    pub fn set_voice_position(&self, id: &str, x: f32, y: f32, z: f32) -> bool {
        match self.inner.graph.lock().unwrap().as_mut() {
            Some(graph) => graph.chains.set_position(id, x, y, z),
            None => false,
        }
    }

    /// Smoothed output level of one object, `None` before its first trigger
    pub fn meter_level(&self, id: &str) -> Option<f32> {
        self.inner
            .graph
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|g| g.chains.meter_level(id))
    }

    pub fn active_voice_count(&self) -> usize {
        self.inner
            .graph
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |g| g.chains.chain_count())
    }

    pub fn pool_stats(&self, voice_type: VoiceType) -> PoolStats {
        self.inner
            .graph
            .lock()
            .unwrap()
            .as_ref()
            .map_or_else(PoolStats::default, |g| g.chains.pool_stats(voice_type))
    }

    /// Whether the master bus is running in degraded passthrough mode
    pub fn is_degraded(&self) -> bool {
        self.inner
            .graph
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|g| g.bus.is_degraded())
    }

    pub async fn set_master_volume(&self, volume: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        match self.inner.graph.lock().unwrap().as_mut() {
            Some(graph) => {
                graph.bus.set_master_volume(volume);
                true
            }
            None => false,
        }
    }

    pub async fn set_reverb_wet(&self, wet: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        self.with_bus(|bus| bus.set_reverb_wet(wet))
    }

    pub async fn set_delay_feedback(&self, feedback: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        self.with_bus(|bus| bus.set_delay_feedback(feedback))
    }

    pub async fn set_chorus_depth(&self, depth: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        self.with_bus(|bus| bus.set_chorus_depth(depth))
    }

    pub async fn set_bitcrusher_bits(&self, bits: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        self.with_bus(|bus| bus.set_bitcrusher_bits(bits))
    }

    pub async fn set_filter_frequency(&self, frequency: f32) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        self.with_bus(|bus| bus.set_filter_frequency(frequency))
    }

    fn with_bus(&self, write: impl FnOnce(&mut MasterBus) -> bool) -> bool {
        match self.inner.graph.lock().unwrap().as_mut() {
            Some(graph) => write(&mut graph.bus),
            None => false,
        }
    }

    /// Start a named beat loop
    ///
    /// Idempotent: an id that is already looping reports success without
    /// being restarted. `false` means the engine couldn't come up.
    pub async fn start_loop(&self, id: &str, cycle: Interval) -> bool {
        if !self.inner.ensure_ready().await {
            return false;
        }
        let weak = Arc::downgrade(&self.inner);
        let callback: LoopCallback = Arc::new(move |loop_id: &str| {
            let Some(inner) = weak.upgrade() else { return };
            let trigger = inner.build_trigger(VoiceType::Beat, None, 1.0);
            inner.trigger_now(loop_id, VoiceType::Beat, trigger);
        });
        self.inner
            .transport
            .lock()
            .unwrap()
            .start_loop(id, cycle, callback)
    }

    pub fn stop_loop(&self, id: &str) {
        self.inner.transport.lock().unwrap().stop_loop(id);
    }

    /// Normalized position within the loop cycle, 0..1; 0 for unknown ids
    pub fn loop_progress(&self, id: &str) -> f64 {
        self.inner
            .transport
            .lock()
            .unwrap()
            .progress(id)
            .unwrap_or(0.0)
    }

    /// Latest analysis snapshot
    pub fn analysis_snapshot(&self) -> Arc<AnalysisSnapshot> {
        self.inner.analysis.lock().unwrap().snapshot()
    }

    /// The snapshot before the current one (frame-to-frame deltas)
    pub fn analysis_previous(&self) -> Arc<AnalysisSnapshot> {
        self.inner.analysis.lock().unwrap().previous()
    }

    /// Watch analysis snapshots as they are published each frame
    pub fn subscribe_analysis(&self) -> watch::Receiver<Arc<AnalysisSnapshot>> {
        self.inner.analysis.lock().unwrap().subscribe()
    }

    /// Output-path facts, `None` until `Ready`
    pub fn metrics(&self) -> Option<PerformanceMetrics> {
        *self.inner.metrics.lock().unwrap()
    }

    /// Tear everything down and return to `Uninitialized`
    ///
    /// Pending retries are cancelled, loops stopped, chains disposed, and
    /// pooled voices dropped. The engine can be started again afterwards.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;
    use std::time::Duration;

    /// Backend whose first `fail_first` activations fail
    struct FlakyBackend {
        fail_first: u32,
        supported: bool,
        effects_fail: bool,
        activations: AtomicU32,
    }

    impl FlakyBackend {
        fn failing(fail_first: u32) -> Arc<Self> {
            Arc::new(Self {
                fail_first,
                supported: true,
                effects_fail: false,
                activations: AtomicU32::new(0),
            })
        }

        fn unsupported() -> Arc<Self> {
            Arc::new(Self {
                fail_first: 0,
                supported: false,
                effects_fail: false,
                activations: AtomicU32::new(0),
            })
        }

        fn effects_failing() -> Arc<Self> {
            Arc::new(Self {
                fail_first: 0,
                supported: true,
                effects_fail: true,
                activations: AtomicU32::new(0),
            })
        }
    }

    impl AudioBackend for FlakyBackend {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn activate(&self) -> EngineResult<()> {
            let n = self.activations.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(EngineError::InitFailure(format!("simulated failure {n}")))
            } else {
                Ok(())
            }
        }

        fn prepare_effects(&self) -> EngineResult<()> {
            if self.effects_fail {
                Err(EngineError::EffectBusConstruction(
                    "simulated effect failure".to_string(),
                ))
            } else {
                Ok(())
            }
        }

        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }

        fn write(&self, _block: &[StereoSample]) {}

        fn activation_count(&self) -> u32 {
            self.activations.load(Ordering::SeqCst)
        }
    }

    /// Backend that only learns its device rate during activation
    struct LateRateBackend {
        rate: AtomicU32,
    }

    impl AudioBackend for LateRateBackend {
        fn is_supported(&self) -> bool {
            true
        }

        fn activate(&self) -> EngineResult<()> {
            self.rate.store(SAMPLE_RATE, Ordering::SeqCst);
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            self.rate.load(Ordering::SeqCst)
        }

        fn write(&self, _block: &[StereoSample]) {}

        fn activation_count(&self) -> u32 {
            0
        }
    }

    fn engine() -> AudioEngine {
        AudioEngine::new(EngineConfig::default())
    }

    #[tokio::test]
    async fn test_start_requires_enable() {
        let engine = engine();
        assert!(matches!(
            engine.start_engine().await,
            Err(EngineError::NotEnabled)
        ));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_is_idempotent() {
        let backend = FlakyBackend::failing(0);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        let events = engine.subscribe_events();
        engine.enable();

        assert_eq!(
            engine.start_engine().await.unwrap(),
            StartOutcome::Started
        );
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(
            engine.start_engine().await.unwrap(),
            StartOutcome::AlreadyRunning
        );
        assert_eq!(backend.activation_count(), 1);

        let metrics = engine.metrics().unwrap();
        assert_eq!(metrics.sample_rate, SAMPLE_RATE);
        match events.try_recv() {
            Ok(EngineEvent::InitSucceeded { sample_rate, .. }) => {
                assert_eq!(sample_rate, SAMPLE_RATE)
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(events.try_recv().is_err(), "more than one event");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_starts_share_one_activation() {
        let backend = FlakyBackend::failing(0);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        engine.enable();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.start().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(backend.activation_count(), 1);
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_recover_with_backoff() {
        let backend = FlakyBackend::failing(2);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        engine.enable();

        assert!(!engine.start().await);
        assert_eq!(engine.state(), EngineState::Suspended);
        assert_eq!(engine.attempts(), 1);
        assert!(engine.last_error().is_some());

        // Backoff delays are 500 ms then 1000 ms; third attempt succeeds
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(backend.activation_count(), 3);
        assert_eq!(engine.attempts(), 0, "attempt counter resets on success");
        assert!(engine.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_the_cap() {
        let backend = FlakyBackend::failing(u32::MAX);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        let events = engine.subscribe_events();
        engine.enable();

        assert!(!engine.start().await);
        // Worst case: 500 + 1000 + 2000 + 4000 ms of backoff
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(engine.state(), EngineState::Failed);
        assert_eq!(backend.activation_count(), 5);
        assert!(matches!(
            events.try_recv(),
            Ok(EngineEvent::InitFailed { .. })
        ));
        assert!(events.try_recv().is_err(), "init-failed fired twice");

        // Terminal: further starts fail fast without touching the backend
        assert!(matches!(
            engine.start_engine().await,
            Err(EngineError::RetriesExhausted { .. })
        ));
        assert_eq!(backend.activation_count(), 5);
    }

    #[tokio::test]
    async fn test_unsupported_platform_is_fatal() {
        let backend = FlakyBackend::unsupported();
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        let events = engine.subscribe_events();
        engine.enable();

        assert!(matches!(
            engine.start_engine().await,
            Err(EngineError::PlatformUnsupported)
        ));
        assert_eq!(engine.state(), EngineState::Failed);
        assert_eq!(backend.activation_count(), 0);
        assert!(matches!(
            events.try_recv(),
            Ok(EngineEvent::InitFailed { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_play_voice_activates_lazily() {
        let engine = engine();
        // Not enabled: playback declines without side effects
        assert!(
            !engine
                .play_voice("rock-1", VoiceType::Note, PlayOptions::default())
                .await
        );
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.enable();
        assert!(
            engine
                .play_voice("rock-1", VoiceType::Note, PlayOptions::default())
                .await
        );
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.active_voice_count(), 1);
        assert!(engine.meter_level("rock-1").is_some());
        assert_eq!(engine.pool_stats(VoiceType::Note).in_use, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_voice_after_terminal_failure_returns_false() {
        let backend = FlakyBackend::failing(u32::MAX);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend);
        engine.enable();
        assert!(!engine.start().await);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(engine.state(), EngineState::Failed);

        assert!(
            !engine
                .play_voice("rock-1", VoiceType::Note, PlayOptions::default())
                .await
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_master_setters_require_full_bus() {
        let engine = engine();
        engine.enable();
        assert!(engine.start().await);
        assert!(!engine.is_degraded());

        assert!(engine.set_master_volume(0.5).await);
        assert!(engine.set_reverb_wet(0.4).await);
        assert!(engine.set_delay_feedback(0.3).await);
        assert!(engine.set_chorus_depth(0.2).await);
        assert!(engine.set_bitcrusher_bits(8.0).await);
        assert!(engine.set_filter_frequency(2_000.0).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_bus_build_degrades_to_passthrough() {
        let backend = FlakyBackend::effects_failing();
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend);
        engine.enable();
        assert!(engine.start().await);
        assert_eq!(engine.state(), EngineState::Ready);
        assert!(engine.is_degraded());

        // Effect writes decline, but playback and volume still work
        assert!(!engine.set_reverb_wet(0.4).await);
        assert!(engine.set_master_volume(0.5).await);
        assert!(
            engine
                .play_voice("rock-1", VoiceType::Beat, PlayOptions::default())
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_feed_backend_and_analysis() {
        let backend = Arc::new(OfflineBackend::new());
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        engine.enable();
        assert!(engine.start().await);
        assert!(
            engine
                .play_voice("rock-1", VoiceType::Chord, PlayOptions::default())
                .await
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(backend.take_peak() > 0.0, "no audio reached the backend");
        let snapshot = engine.analysis_snapshot();
        assert!(snapshot.rms > 0.0);
        assert!(snapshot.frequency.iter().any(|&m| m > 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_uses_post_activation_sample_rate() {
        let backend = Arc::new(LateRateBackend {
            rate: AtomicU32::new(0),
        });
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend);
        engine.enable();
        assert!(engine.start().await);
        assert!(
            engine
                .play_voice("rock-1", VoiceType::Chord, PlayOptions::default())
                .await
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = engine.analysis_snapshot();
        assert!(snapshot.rms > 0.0);
        // Frequency-scaled features come out zero when the feed keeps the
        // pre-activation rate of 0 Hz
        assert!(snapshot.spectral_centroid > 0.0);
        assert!(snapshot.peak_frequency > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_fire_beats() {
        let engine = engine();
        engine.enable();
        assert!(engine.start().await);

        assert!(engine.start_loop("beat-1", Interval::Measures(1)).await);
        // Idempotent: success again, without a second task firing beats
        assert!(engine.start_loop("beat-1", Interval::Measures(1)).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.active_voice_count(), 1);
        assert!(engine.loop_progress("beat-1") > 0.0);

        engine.stop_loop("beat-1");
        assert_eq!(engine.loop_progress("beat-1"), 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_held_note_and_spawn_cue() {
        let engine = engine();
        engine.enable();
        assert!(engine.start_note("A4").await);
        assert!(engine.play_spawn_cue().await);
        assert_eq!(engine.active_voice_count(), 2);

        // Release keeps the chain; dispose removes it
        engine.stop_note();
        assert_eq!(engine.active_voice_count(), 2);
        engine.dispose_all_voices();
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispose_allows_restart() {
        let backend = FlakyBackend::failing(0);
        let engine = AudioEngine::with_backend(EngineConfig::default(), backend.clone());
        engine.enable();
        assert!(engine.start().await);
        assert!(
            engine
                .play_voice("rock-1", VoiceType::Note, PlayOptions::default())
                .await
        );

        engine.dispose();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.active_voice_count(), 0);
        assert!(engine.metrics().is_none());
        assert!(engine.meter_level("rock-1").is_none());

        assert!(engine.start().await);
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(backend.activation_count(), 2);
    }
}
