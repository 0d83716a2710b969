//! Client input sequencing, acknowledgment and round-trip estimation

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::tick::{tick_greater_than, tick_less_than, PlayerTick};
use shared::Input;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of round-trip samples averaged by [`RttWindow`]
pub const RTT_WINDOW: usize = 16;

/// Upper bound on unacknowledged inputs kept for replay
pub const MAX_BUFFERED_INPUTS: usize = 256;

/// One locally generated input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSample {
    pub player_tick: PlayerTick,
    pub input: Input,
    pub sampled_at: Instant,
}

/// Fixed-size ring of round-trip samples with a rolling average
#[derive(Debug, Clone)]
pub struct RttWindow {
    samples: Vec<Duration>,
    capacity: usize,
    cursor: usize,
}

impl RttWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Adds a sample, overwriting the oldest once full
    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.cursor] = sample;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Inputs sent to the server but not yet acknowledged
///
/// Every pushed input gets the next wrapping PlayerTick, starting at 1.
/// When an authoritative update acknowledges a PlayerTick, everything up to
/// and including it is trimmed and the remaining inputs are what the client
/// replays on top of the authoritative position.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    samples: VecDeque<InputSample>,
    player_tick: PlayerTick,
    last_ack: Option<PlayerTick>,
    rtt: RttWindow,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBuffer {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_BUFFERED_INPUTS),
            player_tick: 0,
            last_ack: None,
            rtt: RttWindow::new(RTT_WINDOW),
        }
    }

    /// Records an input and returns the PlayerTick assigned to it
    pub fn push(&mut self, input: Input, sampled_at: Instant) -> PlayerTick {
        self.player_tick = self.player_tick.wrapping_add(1);
        self.samples.push_back(InputSample {
            player_tick: self.player_tick,
            input,
            sampled_at,
        });

        if self.samples.len() > MAX_BUFFERED_INPUTS {
            self.samples.pop_front();
        }

        self.player_tick
    }

    /// Trims every input up to and including `ack`
    ///
    /// Each trimmed input contributes its age to the RTT estimate. An ack
    /// older than the previous one is ignored. Returns the number trimmed.
    pub fn acknowledge(&mut self, ack: PlayerTick, now: Instant) -> usize {
        if let Some(last) = self.last_ack {
            if tick_less_than(ack, last) {
                debug!("Ignoring stale ack {} (already at {})", ack, last);
                return 0;
            }
        }
        self.last_ack = Some(ack);

        let mut trimmed = 0;
        while let Some(front) = self.samples.front() {
            if tick_greater_than(front.player_tick, ack) {
                break;
            }
            self.rtt.push(now.saturating_duration_since(front.sampled_at));
            self.samples.pop_front();
            trimmed += 1;
        }
        trimmed
    }

    /// Buffered inputs newer than `player_tick`, oldest first
    pub fn pending_after(&self, player_tick: PlayerTick) -> impl Iterator<Item = &InputSample> {
        self.samples
            .iter()
            .filter(move |sample| tick_greater_than(sample.player_tick, player_tick))
    }

    /// The most recently assigned PlayerTick
    pub fn player_tick(&self) -> PlayerTick {
        self.player_tick
    }

    pub fn last_ack(&self) -> Option<PlayerTick> {
        self.last_ack
    }

    /// Rolling average round-trip time
    pub fn rtt(&self) -> Option<Duration> {
        self.rtt.average()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Seeded wandering input for headless clients
#[derive(Debug, Clone)]
pub struct Wander {
    rng: StdRng,
    current: Input,
    hold: u32,
    steps_left: u32,
}

impl Wander {
    /// Changes direction every `hold` steps
    pub fn new(seed: u64, hold: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            current: Input::default(),
            hold: hold.max(1),
            steps_left: 0,
        }
    }

    pub fn next_input(&mut self) -> Input {
        if self.steps_left == 0 {
            self.current = Input {
                up: self.rng.gen_bool(0.5),
                down: self.rng.gen_bool(0.5),
                left: self.rng.gen_bool(0.5),
                right: self.rng.gen_bool(0.5),
            };
            self.steps_left = self.hold;
        }
        self.steps_left -= 1;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right() -> Input {
        Input { right: true, ..Default::default() }
    }

    #[test]
    fn test_ticks_start_at_one() {
        let mut buffer = InputBuffer::new();
        let now = Instant::now();
        assert_eq!(buffer.push(right(), now), 1);
        assert_eq!(buffer.push(right(), now), 2);
        assert_eq!(buffer.player_tick(), 2);
    }

    #[test]
    fn test_acknowledge_trims_up_to_ack() {
        let mut buffer = InputBuffer::new();
        let now = Instant::now();
        for _ in 0..13 {
            buffer.push(right(), now);
        }

        assert_eq!(buffer.acknowledge(10, now), 10);
        assert_eq!(buffer.len(), 3);
        let pending: Vec<PlayerTick> = buffer.pending_after(10).map(|s| s.player_tick).collect();
        assert_eq!(pending, vec![11, 12, 13]);
    }

    #[test]
    fn test_stale_ack_ignored() {
        let mut buffer = InputBuffer::new();
        let now = Instant::now();
        for _ in 0..5 {
            buffer.push(right(), now);
        }

        buffer.acknowledge(4, now);
        for _ in 0..3 {
            buffer.push(right(), now);
        }
        assert_eq!(buffer.acknowledge(2, now), 0);
        assert_eq!(buffer.last_ack(), Some(4));
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_trim_across_wraparound() {
        let mut buffer = InputBuffer::new();
        buffer.player_tick = 65533;
        let now = Instant::now();

        let ticks: Vec<PlayerTick> = (0..6).map(|_| buffer.push(right(), now)).collect();
        assert_eq!(ticks, vec![65534, 65535, 0, 1, 2, 3]);

        assert_eq!(buffer.acknowledge(0, now), 3);
        let pending: Vec<PlayerTick> = buffer.pending_after(0).map(|s| s.player_tick).collect();
        assert_eq!(pending, vec![1, 2, 3]);

        // 65535 is older than 0 in wrapping order
        assert_eq!(buffer.acknowledge(65535, now), 0);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_rtt_from_trimmed_inputs() {
        let mut buffer = InputBuffer::new();
        let start = Instant::now();
        buffer.push(right(), start);
        buffer.push(right(), start + Duration::from_millis(20));

        buffer.acknowledge(2, start + Duration::from_millis(60));
        // ages 60ms and 40ms
        assert_eq!(buffer.rtt(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut buffer = InputBuffer::new();
        let now = Instant::now();
        for _ in 0..(MAX_BUFFERED_INPUTS + 10) {
            buffer.push(right(), now);
        }
        assert_eq!(buffer.len(), MAX_BUFFERED_INPUTS);
    }

    #[test]
    fn test_rtt_window_overwrites_oldest() {
        let mut window = RttWindow::new(2);
        assert!(window.average().is_none());

        window.push(Duration::from_millis(10));
        window.push(Duration::from_millis(20));
        window.push(Duration::from_millis(40));

        assert_eq!(window.len(), 2);
        assert_eq!(window.average(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_wander_is_deterministic_and_holds_direction() {
        let mut a = Wander::new(7, 3);
        let mut b = Wander::new(7, 3);
        let first: Vec<Input> = (0..9).map(|_| a.next_input()).collect();
        let second: Vec<Input> = (0..9).map(|_| b.next_input()).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], first[1]);
        assert_eq!(first[1], first[2]);
    }
}
