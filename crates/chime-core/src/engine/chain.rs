//! Per-voice effect chains
//!
//! Each sounding object owns a private chain: voice, highpass, lowpass,
//! delay, reverb, spatial panner, and level meter, mixed into the master
//! bus. Chains are keyed by object id and created lazily on first trigger.
//! Voices come from the bounded resource pool and go back to it when the
//! chain is disposed.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::PoolConfig;
use crate::effect::{
    set_or_log, Delay, Filter, FilterMode, LevelMeter, Reverb, SpatialPanner, Stage, StageParam,
};
use crate::engine::pool::{Lease, PoolStats, ResourcePool};
use crate::synth::{build_voice, Voice, VoiceTrigger};
use crate::types::{clamped, StereoSample, VoiceType, BLOCK_SIZE};

/// Per-chain delay time (seconds)
const CHAIN_DELAY_TIME: f32 = 0.25;

/// Per-chain reverb tail (seconds)
const CHAIN_REVERB_DECAY: f32 = 1.5;

/// Lowpass cutoff bounds (Hz)
const LOWPASS_MIN_HZ: f32 = 20.0;
const LOWPASS_MAX_HZ: f32 = 20_000.0;

/// Highpass cutoff bounds (Hz); 0 parks the filter in bypass
const HIGHPASS_MIN_HZ: f32 = 0.0;
const HIGHPASS_MAX_HZ: f32 = 20_000.0;

/// Per-object effect settings
///
/// Values are clamped to their documented ranges when applied, so stale or
/// out-of-range UI state can never destabilize a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Reverb wet mix, 0..1
    pub reverb: f32,
    /// Delay wet mix, 0..1
    pub delay: f32,
    /// Lowpass cutoff in Hz
    pub lowpass: f32,
    /// Highpass cutoff in Hz; 0 disables the highpass
    pub highpass: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            reverb: 0.25,
            delay: 0.25,
            lowpass: LOWPASS_MAX_HZ,
            highpass: 0.0,
        }
    }
}

impl EffectParams {
    /// Copy with every field forced into range
    pub fn clamped(&self) -> Self {
        Self {
            reverb: clamped(self.reverb, 0.0, 1.0),
            delay: clamped(self.delay, 0.0, 1.0),
            lowpass: clamped(self.lowpass, LOWPASS_MIN_HZ, LOWPASS_MAX_HZ),
            highpass: clamped(self.highpass, HIGHPASS_MIN_HZ, HIGHPASS_MAX_HZ),
        }
    }
}

/// One object's private signal path
struct VoiceChain {
    voice_type: VoiceType,
    voice: Lease<Box<dyn Voice>>,
    highpass: Filter,
    lowpass: Filter,
    delay: Delay,
    reverb: Reverb,
    panner: SpatialPanner,
    meter: LevelMeter,
    mono: Vec<f32>,
    stereo: Vec<StereoSample>,
}

impl VoiceChain {
    fn new(voice_type: VoiceType, voice: Lease<Box<dyn Voice>>, sample_rate: u32) -> Self {
        Self {
            voice_type,
            voice,
            highpass: Filter::new(FilterMode::HighPass, 0.0, sample_rate),
            lowpass: Filter::new(FilterMode::LowPass, LOWPASS_MAX_HZ, sample_rate),
            delay: Delay::new(CHAIN_DELAY_TIME, sample_rate),
            reverb: Reverb::new(CHAIN_REVERB_DECAY, sample_rate),
            panner: SpatialPanner::new(),
            meter: LevelMeter::new(),
            mono: vec![0.0; BLOCK_SIZE],
            stereo: vec![StereoSample::zero(); BLOCK_SIZE],
        }
    }

    fn apply_params(&mut self, params: &EffectParams) {
        let params = params.clamped();
        set_or_log(&mut self.reverb, StageParam::Wet, params.reverb);
        set_or_log(&mut self.delay, StageParam::Wet, params.delay);
        set_or_log(&mut self.lowpass, StageParam::Frequency, params.lowpass);
        set_or_log(&mut self.highpass, StageParam::Frequency, params.highpass);
    }

    /// Render one block and mix it into `out`
    fn render_into(&mut self, out: &mut [StereoSample]) {
        let frames = out.len().min(self.mono.len());
        let mono = &mut self.mono[..frames];
        self.voice.resource.render(mono);

        let stereo = &mut self.stereo[..frames];
        for (frame, &sample) in stereo.iter_mut().zip(mono.iter()) {
            *frame = StereoSample::from_mono(sample);
        }
        self.highpass.process(stereo);
        self.lowpass.process(stereo);
        self.delay.process(stereo);
        self.reverb.process(stereo);
        self.panner.process(stereo);
        self.meter.process(stereo);

        for (mix, &frame) in out.iter_mut().zip(stereo.iter()) {
            *mix += frame;
        }
    }
}

/// Lifecycle owner for all per-voice chains
pub struct ChainManager {
    chains: HashMap<String, VoiceChain>,
    /// Stored settings survive chain disposal and re-apply on recreation
    params: HashMap<String, EffectParams>,
    pool: ResourcePool<VoiceType, Box<dyn Voice>>,
    sample_rate: u32,
}

impl ChainManager {
    pub fn new(pool_config: PoolConfig, sample_rate: u32) -> Self {
        Self {
            chains: HashMap::new(),
            params: HashMap::new(),
            pool: ResourcePool::new(pool_config),
            sample_rate,
        }
    }

    /// Trigger a voice for `id`, creating its chain on first use
    ///
    /// Re-triggering an existing chain reuses it when the voice type matches
    /// and rebuilds it when the type changed.
    pub fn trigger(&mut self, id: &str, voice_type: VoiceType, trigger: &VoiceTrigger) {
        if self
            .chains
            .get(id)
            .is_some_and(|c| c.voice_type != voice_type)
        {
            self.dispose(id);
        }
        if !self.chains.contains_key(id) {
            let sample_rate = self.sample_rate;
            let voice = self
                .pool
                .acquire(voice_type, || build_voice(voice_type, sample_rate));
            log::debug!("creating {voice_type} chain for {id}");
            self.chains.insert(
                id.to_string(),
                VoiceChain::new(voice_type, voice, sample_rate),
            );
        }
        let params = self.params.get(id).copied().unwrap_or_default();
        let chain = self.chains.get_mut(id).expect("chain just ensured");
        chain.apply_params(&params);
        chain.voice.resource.trigger(trigger);
    }

    /// Begin envelope release for `id`'s voice
    pub fn release(&mut self, id: &str) {
        if let Some(chain) = self.chains.get_mut(id) {
            chain.voice.resource.release();
        }
    }

    /// Store effect settings for `id`, applying them now if a chain exists
    pub fn set_params(&mut self, id: &str, params: EffectParams) {
        let params = params.clamped();
        self.params.insert(id.to_string(), params);
        if let Some(chain) = self.chains.get_mut(id) {
            chain.apply_params(&params);
        }
    }

    /// Move `id`'s spatial position
    pub fn set_position(&mut self, id: &str, x: f32, y: f32, z: f32) -> bool {
        match self.chains.get_mut(id) {
            Some(chain) => {
                chain.panner.set_position(x, y, z);
                true
            }
            None => false,
        }
    }

    /// Smoothed output level for `id`
    pub fn meter_level(&self, id: &str) -> Option<f32> {
        self.chains.get(id).map(|c| c.meter.level())
    }

    pub fn has_chain(&self, id: &str) -> bool {
        self.chains.contains_key(id)
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn pool_stats(&self, voice_type: VoiceType) -> PoolStats {
        self.pool.stats(voice_type)
    }

    /// Evict stale idle pool entries
    pub fn sweep_pool(&mut self, now: Instant) {
        self.pool.sweep(now);
    }

    /// Render every chain and mix into `out` (additive; caller zeroes)
    pub fn render(&mut self, out: &mut [StereoSample]) {
        for chain in self.chains.values_mut() {
            chain.render_into(out);
        }
    }

    /// Tear down `id`'s chain and return its voice to the pool
    ///
    /// The voice stops first, then the effect stages are dropped, then the
    /// voice is reset on its way back to the pool. Stored effect settings
    /// are kept so a later trigger recreates the chain with them.
    pub fn dispose(&mut self, id: &str) {
        if let Some(chain) = self.chains.remove(id) {
            log::debug!("disposing {} chain for {id}", chain.voice_type);
            self.pool.release(chain.voice_type, chain.voice);
        }
    }

    /// Tear down every chain and all pooled voices
    pub fn dispose_all(&mut self) {
        let ids: Vec<String> = self.chains.keys().cloned().collect();
        for id in ids {
            self.dispose(&id);
        }
        self.pool.dispose_all();
        self.params.clear();
    }
}
