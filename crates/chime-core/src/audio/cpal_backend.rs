//! CPAL audio backend
//!
//! Real device output for hosts that want sound, not just analysis.
//! The engine's frame renderer pushes blocks into a lock-free ring
//! (`rtrb`, single-producer single-consumer); the device callback pops
//! interleaved samples from the other end. Neither side ever blocks:
//! an empty ring plays silence, a full ring drops the block.
//!
//! The `cpal::Stream` is not `Send`, so it lives on a dedicated thread
//! that parks until deactivation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Producer, RingBuffer};

use super::backend::AudioBackend;
use super::error::{EngineError, EngineResult};
use crate::types::{StereoSample, SAMPLE_RATE};

/// Ring capacity in interleaved stereo samples (~85 ms at 48 kHz)
const RING_CAPACITY: usize = 8192;

/// Device-backed audio output
pub struct CpalBackend {
    active: AtomicBool,
    activations: AtomicU32,
    sample_rate: AtomicU32,
    buffer_size: AtomicU32,
    producer: Mutex<Option<Producer<f32>>>,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl CpalBackend {
    /// Create a backend bound to the default output device (lazily opened)
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            activations: AtomicU32::new(0),
            sample_rate: AtomicU32::new(SAMPLE_RATE),
            buffer_size: AtomicU32::new(0),
            producer: Mutex::new(None),
            shutdown: Mutex::new(None),
        }
    }

    /// Stop the stream thread and release the device
    pub fn deactivate(&self) {
        if let Some(tx) = self.shutdown.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
        *self.producer.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.active.store(false, Ordering::Release);
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl AudioBackend for CpalBackend {
    fn is_supported(&self) -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    fn activate(&self) -> EngineResult<()> {
        if self.active.load(Ordering::Acquire) {
            return Ok(());
        }
        self.activations.fetch_add(1, Ordering::AcqRel);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::PlatformUnsupported)?;
        let config = device
            .default_output_config()
            .map_err(|e| EngineError::InitFailure(format!("no default output config: {e}")))?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        self.sample_rate.store(sample_rate, Ordering::Release);

        let (producer, mut consumer) = RingBuffer::<f32>::new(RING_CAPACITY * 2);
        let (ready_tx, ready_rx) = mpsc::channel::<EngineResult<u32>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("chime-audio-out".to_string())
            .spawn(move || {
                let stream = device.build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _| {
                        for frame in data.chunks_mut(channels) {
                            let left = consumer.pop().unwrap_or(0.0);
                            let right = consumer.pop().unwrap_or(left);
                            if let Some(l) = frame.first_mut() {
                                *l = left;
                            }
                            if let Some(r) = frame.get_mut(1) {
                                *r = right;
                            }
                            for extra in frame.iter_mut().skip(2) {
                                *extra = 0.0;
                            }
                        }
                    },
                    |err| log::error!("cpal stream error: {err}"),
                    None,
                );
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx
                            .send(Err(EngineError::InitFailure(format!("build stream: {e}"))));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx
                        .send(Err(EngineError::InitFailure(format!("start stream: {e}"))));
                    return;
                }
                let _ = ready_tx.send(Ok(sample_rate));
                // Keep the !Send stream alive until deactivation
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| EngineError::InitFailure(format!("spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(EngineError::InitFailure(
                    "audio thread exited before stream start".to_string(),
                ))
            }
        }

        *self.producer.lock().unwrap_or_else(|e| e.into_inner()) = Some(producer);
        *self.shutdown.lock().unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);
        self.active.store(true, Ordering::Release);
        log::info!("cpal backend active at {sample_rate} Hz, {channels} ch");
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    fn buffer_size(&self) -> Option<u32> {
        match self.buffer_size.load(Ordering::Acquire) {
            0 => None,
            n => Some(n),
        }
    }

    fn write(&self, block: &[StereoSample]) {
        let mut guard = self.producer.lock().unwrap_or_else(|e| e.into_inner());
        let Some(producer) = guard.as_mut() else {
            return;
        };
        for sample in block {
            // Drop the rest of the block if the device is behind
            if producer.push(sample.left).is_err() || producer.push(sample.right).is_err() {
                break;
            }
        }
    }

    fn activation_count(&self) -> u32 {
        self.activations.load(Ordering::Acquire)
    }
}
