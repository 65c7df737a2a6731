//! Transport and loop scheduler
//!
//! Named repeating loops on a shared tempo. Each loop is a spawned task that
//! fires its callback immediately and then on every cycle boundary. Stopping
//! a loop aborts the task; progress reports the normalized position within
//! the current cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::music::Interval;

/// Callback fired on every loop cycle
pub type LoopCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct LoopBinding {
    handle: JoinHandle<()>,
    started: Instant,
    cycle: Duration,
}

/// Loop registry bound to one tempo
pub struct Transport {
    bpm: f64,
    loops: HashMap<String, LoopBinding>,
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            loops: HashMap::new(),
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Start a named loop
    ///
    /// The callback fires once right away and again every `interval`.
    /// Calling again for an id that is already running is a no-op
    /// reporting success; the existing loop keeps its phase.
    pub fn start_loop(&mut self, id: &str, cycle: Interval, callback: LoopCallback) -> bool {
        if self.loops.contains_key(id) {
            return true;
        }
        let period = Duration::from_secs_f64(cycle.seconds(self.bpm));
        log::debug!("starting loop {id} every {:.3}s", period.as_secs_f64());

        let loop_id = id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback(&loop_id);
            }
        });
        self.loops.insert(
            id.to_string(),
            LoopBinding {
                handle,
                started: Instant::now(),
                cycle: period,
            },
        );
        true
    }

    /// Stop a named loop; unknown ids are ignored
    pub fn stop_loop(&mut self, id: &str) {
        if let Some(binding) = self.loops.remove(id) {
            log::debug!("stopping loop {id}");
            binding.handle.abort();
        }
    }

    /// Normalized position in the current cycle, 0..1
    pub fn progress(&self, id: &str) -> Option<f64> {
        self.loops.get(id).map(|binding| {
            let elapsed = binding.started.elapsed().as_secs_f64();
            let cycle = binding.cycle.as_secs_f64();
            (elapsed / cycle).fract()
        })
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.loops.contains_key(id)
    }

    /// Abort every loop task
    pub fn stop_all(&mut self) {
        for (id, binding) in self.loops.drain() {
            log::debug!("stopping loop {id}");
            binding.handle.abort();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_callback() -> (Arc<AtomicU32>, LoopCallback) {
        let count = Arc::new(AtomicU32::new(0));
        let captured = count.clone();
        let callback: LoopCallback = Arc::new(move |_id| {
            captured.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_fires_immediately_then_every_cycle() {
        let mut transport = Transport::new(120.0);
        let (count, callback) = counting_callback();
        // One measure at 120 bpm is two seconds
        assert!(transport.start_loop("rock", Interval::Measures(1), callback));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_twice_keeps_one_loop() {
        let mut transport = Transport::new(120.0);
        let (count, callback) = counting_callback();
        assert!(transport.start_loop("rock", Interval::Measures(1), callback.clone()));
        // Idempotent: success again without spawning a second task
        assert!(transport.start_loop("rock", Interval::Measures(1), callback));

        tokio::time::sleep(Duration::from_millis(100)).await;
        // A single task fired once, not two
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_firing() {
        let mut transport = Transport::new(120.0);
        let (count, callback) = counting_callback();
        transport.start_loop("rock", Interval::Measures(1), callback);

        tokio::time::sleep(Duration::from_millis(100)).await;
        transport.stop_loop("rock");
        assert!(!transport.is_running("rock"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Stopping again is harmless
        transport.stop_loop("rock");
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_tracks_cycle_position() {
        let mut transport = Transport::new(120.0);
        let (_, callback) = counting_callback();
        transport.start_loop("rock", Interval::Measures(1), callback);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let progress = transport.progress("rock").unwrap();
        assert!((progress - 0.25).abs() < 0.05, "progress = {progress}");

        // Wraps around after a full cycle
        tokio::time::sleep(Duration::from_secs(2)).await;
        let progress = transport.progress("rock").unwrap();
        assert!((progress - 0.25).abs() < 0.05, "progress = {progress}");

        assert!(transport.progress("unknown").is_none());
    }
}
