// Transport - Shared sample-accurate clock
// Counts samples while running and fires scheduled callbacks at exact sample positions

use super::timeline::Tempo;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Default sample rate until an output device reports its own
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// Callback fired by the clock with its scheduled time in seconds
pub type ClockCallback = Box<dyn FnMut(f64) + Send>;

/// Handle returned by every schedule call, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

struct Schedule {
    start: f64,
    /// `None` for one-shot schedules
    interval: Option<f64>,
    /// Exclusive end of a repeating schedule
    end: Option<f64>,
    /// Number of times this schedule has fired
    fired: u64,
    /// Taken out while the callback runs
    callback: Option<ClockCallback>,
}

impl Schedule {
    /// Time of the next firing. The k-th firing is computed from the start,
    /// never accumulated, so repeating schedules do not drift.
    fn next_time(&self) -> f64 {
        match self.interval {
            Some(interval) => self.start + self.fired as f64 * interval,
            None => self.start,
        }
    }

    fn is_finished(&self) -> bool {
        match (self.interval, self.end) {
            (None, _) => self.fired > 0,
            (Some(_), Some(end)) => self.next_time() >= end,
            (Some(_), None) => false,
        }
    }
}

struct ClockState {
    position: u64,
    sample_rate: f64,
    running: bool,
    tempo: Tempo,
    next_id: u64,
    /// Keyed by registration order
    schedules: BTreeMap<u64, Schedule>,
}

impl ClockState {
    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }

    fn seconds(&self) -> f64 {
        self.position as f64 / self.sample_rate
    }

    /// Earliest schedule (by sample, then registration order) whose callback is idle
    fn earliest(&self) -> Option<(u64, u64)> {
        self.schedules
            .iter()
            .filter(|(_, s)| s.callback.is_some())
            .map(|(id, s)| (self.to_samples(s.next_time()), *id))
            .min()
    }

    fn insert(&mut self, schedule: Schedule) -> ScheduleHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.schedules.insert(id, schedule);
        ScheduleHandle(id)
    }
}

/// Process-wide transport clock
///
/// Shared as `Arc<TransportClock>` between the thread that edits sequencers
/// and the audio output that drives it through [`TransportClock::process_block`].
/// Time only advances while running. Callbacks run with the clock unlocked,
/// so they may schedule or cancel.
pub struct TransportClock {
    state: Mutex<ClockState>,
}

impl TransportClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            state: Mutex::new(ClockState {
                position: 0,
                sample_rate: sample_rate.max(1.0),
                running: false,
                tempo: Tempo::default(),
                next_id: 0,
                schedules: BTreeMap::new(),
            }),
        }
    }

    pub fn set_tempo(&self, tempo: Tempo) {
        self.state.lock().tempo = tempo;
    }

    pub fn tempo(&self) -> Tempo {
        self.state.lock().tempo
    }

    /// Current position in seconds
    pub fn now(&self) -> f64 {
        self.state.lock().seconds()
    }

    pub fn position_samples(&self) -> u64 {
        self.state.lock().position
    }

    pub fn sample_rate(&self) -> f64 {
        self.state.lock().sample_rate
    }

    /// Switch sample rate, keeping the position in seconds
    pub fn set_sample_rate(&self, sample_rate: f64) {
        let mut state = self.state.lock();
        let sample_rate = sample_rate.max(1.0);
        let seconds = state.seconds();
        state.sample_rate = sample_rate;
        state.position = state.to_samples(seconds);
    }

    pub fn start(&self) {
        self.state.lock().running = true;
    }

    pub fn stop(&self) {
        self.state.lock().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Move to `seconds`. One-shot schedules before the new position are
    /// dropped; repeating schedules skip the firings they would have missed.
    pub fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        let target = state.to_samples(seconds.max(0.0));
        state.position = target;

        let sample_rate = state.sample_rate;
        let to_samples = |t: f64| (t * sample_rate).round().max(0.0) as u64;
        state.schedules.retain(|_, schedule| {
            match schedule.interval {
                None => to_samples(schedule.start) >= target,
                Some(interval) => {
                    let behind = (seconds - schedule.start) / interval;
                    schedule.fired = if behind > 0.0 { behind.floor() as u64 } else { 0 };
                    while to_samples(schedule.next_time()) < target {
                        schedule.fired += 1;
                    }
                    !schedule.is_finished()
                }
            }
        });
    }

    /// Fire `callback` once when the clock reaches `at` seconds
    pub fn schedule_once<F>(&self, at: f64, callback: F) -> ScheduleHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.state.lock().insert(Schedule {
            start: at,
            interval: None,
            end: None,
            fired: 0,
            callback: Some(Box::new(callback)),
        })
    }

    /// Fire `callback` at `start + k * interval` for every k until `end`
    /// (exclusive) or until cancelled. The interval is at least one sample.
    pub fn schedule_repeating<F>(
        &self,
        interval: f64,
        start: f64,
        end: Option<f64>,
        callback: F,
    ) -> ScheduleHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        let mut state = self.state.lock();
        let min_interval = 1.0 / state.sample_rate;
        state.insert(Schedule {
            start,
            interval: Some(interval.max(min_interval)),
            end,
            fired: 0,
            callback: Some(Box::new(callback)),
        })
    }

    /// Remove a schedule. Returns false if it already finished or was cancelled.
    pub fn cancel(&self, handle: ScheduleHandle) -> bool {
        self.state.lock().schedules.remove(&handle.0).is_some()
    }

    /// Number of live schedules
    pub fn pending(&self) -> usize {
        self.state.lock().schedules.len()
    }

    /// Run every callback due at the current position, in time order
    fn fire_due(&self) {
        loop {
            let (id, time, mut callback) = {
                let mut state = self.state.lock();
                let position = state.position;
                let Some((sample, id)) = state.earliest() else {
                    return;
                };
                if sample > position {
                    return;
                }
                let Some(schedule) = state.schedules.get_mut(&id) else {
                    return;
                };
                let time = schedule.next_time();
                let Some(callback) = schedule.callback.take() else {
                    return;
                };
                schedule.fired += 1;
                if schedule.is_finished() {
                    state.schedules.remove(&id);
                }
                (id, time, callback)
            };

            callback(time);

            // Hand the callback back unless it was cancelled or finished meanwhile
            if let Some(schedule) = self.state.lock().schedules.get_mut(&id) {
                schedule.callback = Some(callback);
            }
        }
    }

    /// Drive the clock for one output block of `frames` samples.
    ///
    /// `render(n)` is called with consecutive segment lengths summing to
    /// `frames`; callbacks fire between segments at their exact sample.
    /// While stopped the whole block is rendered and time stands still.
    pub fn process_block(&self, frames: usize, mut render: impl FnMut(usize)) {
        let mut remaining = frames as u64;
        loop {
            if !self.is_running() {
                if remaining > 0 {
                    render(remaining as usize);
                }
                return;
            }

            self.fire_due();
            if remaining == 0 {
                return;
            }

            let segment = {
                let state = self.state.lock();
                match state.earliest() {
                    Some((sample, _)) if sample > state.position => {
                        (sample - state.position).min(remaining)
                    }
                    _ => remaining,
                }
            };

            render(segment as usize);
            {
                let mut state = self.state.lock();
                if state.running {
                    state.position += segment;
                }
            }
            remaining -= segment;
        }
    }

    /// Advance `frames` samples without rendering audio
    pub fn advance(&self, frames: u64) {
        self.process_block(frames as usize, |_| {});
    }

    /// Advance until the clock reads `seconds` (no-op if already past it)
    pub fn advance_to(&self, seconds: f64) {
        let frames = {
            let state = self.state.lock();
            state.to_samples(seconds).saturating_sub(state.position)
        };
        self.advance(frames);
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}
