//! Staff alerting: toasts and the audio chime
//!
//! Audio is gated: nothing plays until the operator has interacted with the
//! surface at least once. The gate never closes again for the session.

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

// ============================================================================
// Audio gate + chime
// ============================================================================

/// "User has interacted at least once" latch
#[derive(Debug, Default)]
pub struct AudioGate {
    open: AtomicBool,
}

impl AudioGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction; opens the gate for the rest of the session
    pub fn record_interaction(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            tracing::debug!("Audio gate opened");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// One sine tone of a cue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
}

/// Short synthesized two-tone notification cue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoToneChime {
    pub tones: [Tone; 2],
    /// Peak amplitude in `0.0..=1.0`
    pub gain: f32,
}

impl Default for TwoToneChime {
    fn default() -> Self {
        Self {
            tones: [
                Tone {
                    frequency_hz: 880.0,
                    duration: Duration::from_millis(150),
                },
                Tone {
                    frequency_hz: 1320.0,
                    duration: Duration::from_millis(150),
                },
            ],
            gain: 0.3,
        }
    }
}

impl TwoToneChime {
    pub fn total_duration(&self) -> Duration {
        self.tones.iter().map(|t| t.duration).sum()
    }

    /// Render mono PCM samples; each tone fades out linearly to avoid clicks
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let mut samples = Vec::new();
        for tone in &self.tones {
            let n = (tone.duration.as_secs_f32() * sample_rate as f32).round() as usize;
            for i in 0..n {
                let t = i as f32 / sample_rate as f32;
                let envelope = 1.0 - i as f32 / n as f32;
                samples.push(self.gain * envelope * (2.0 * PI * tone.frequency_hz * t).sin());
            }
        }
        samples
    }
}

/// Audio output for the chime
pub trait ChimePlayer: Send + Sync {
    fn play(&self, chime: &TwoToneChime);
}

/// Logs the cue instead of producing sound (headless hosts)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChime;

impl ChimePlayer for TracingChime {
    fn play(&self, chime: &TwoToneChime) {
        tracing::info!(
            first_hz = chime.tones[0].frequency_hz,
            second_hz = chime.tones[1].frequency_hz,
            duration_ms = chime.total_duration().as_millis() as u64,
            "🔔 chime"
        );
    }
}

/// Counts plays (tests)
#[derive(Debug, Default)]
pub struct RecordingChime {
    plays: AtomicUsize,
}

impl RecordingChime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl ChimePlayer for RecordingChime {
    fn play(&self, _chime: &TwoToneChime) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

/// Gate + player: the only way watchers make sound
#[derive(Clone)]
pub struct Chime {
    gate: Arc<AudioGate>,
    player: Arc<dyn ChimePlayer>,
    cue: TwoToneChime,
}

impl Chime {
    pub fn new(gate: Arc<AudioGate>, player: Arc<dyn ChimePlayer>) -> Self {
        Self {
            gate,
            player,
            cue: TwoToneChime::default(),
        }
    }

    pub fn gate(&self) -> &Arc<AudioGate> {
        &self.gate
    }

    /// Play the cue if the gate is open; returns whether it played
    pub fn ring(&self) -> bool {
        if !self.gate.is_open() {
            tracing::debug!("Chime suppressed, no user interaction yet");
            return false;
        }
        self.player.play(&self.cue);
        true
    }
}

impl fmt::Debug for Chime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chime")
            .field("gate_open", &self.gate.is_open())
            .finish()
    }
}

// ============================================================================
// Toasts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    NewOrder,
    StatusChanged,
    WaiterCall,
}

/// Transient visual alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub table_number: u32,
    /// Order or waiter call id
    pub reference_id: String,
}

/// Where toasts are shown
pub trait AlertSink: Send + Sync {
    fn show(&self, toast: &Toast);
}

/// Logs every toast
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn show(&self, toast: &Toast) {
        tracing::info!(
            kind = ?toast.kind,
            table = toast.table_number,
            reference_id = %toast.reference_id,
            "{}: {}",
            toast.title,
            toast.message
        );
    }
}

/// Collects toasts (tests, demo)
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn count_of(&self, kind: ToastKind) -> usize {
        self.toasts.lock().iter().filter(|t| t.kind == kind).count()
    }
}

impl AlertSink for RecordingAlertSink {
    fn show(&self, toast: &Toast) {
        self.toasts.lock().push(toast.clone());
    }
}

/// Sink + chime bundle handed to watchers
#[derive(Clone)]
pub struct Alerts {
    pub sink: Arc<dyn AlertSink>,
    pub chime: Chime,
}

impl Alerts {
    pub fn new(sink: Arc<dyn AlertSink>, chime: Chime) -> Self {
        Self { sink, chime }
    }

    /// Logging sink, logging chime, gate closed
    pub fn tracing() -> Self {
        Self::new(
            Arc::new(TracingAlertSink),
            Chime::new(Arc::new(AudioGate::new()), Arc::new(TracingChime)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_stays_open() {
        let gate = Arc::new(AudioGate::new());
        let player = Arc::new(RecordingChime::new());
        let chime = Chime::new(gate.clone(), player.clone());

        assert!(!chime.ring());
        assert_eq!(player.play_count(), 0);

        gate.record_interaction();
        gate.record_interaction();
        assert!(chime.ring());
        assert!(chime.ring());
        assert_eq!(player.play_count(), 2);
        assert!(gate.is_open());
    }

    #[test]
    fn test_two_tone_cue() {
        let cue = TwoToneChime::default();
        assert_eq!(cue.tones[0].frequency_hz, 880.0);
        assert_eq!(cue.tones[1].frequency_hz, 1320.0);
        assert_eq!(cue.total_duration(), Duration::from_millis(300));

        let samples = cue.render(8_000);
        assert_eq!(samples.len(), 2_400);
        assert!(samples.iter().all(|s| s.abs() <= 0.3 + f32::EPSILON));
    }
}
