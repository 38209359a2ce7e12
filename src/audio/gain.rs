// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
// The shared volume control. The target level is written from the control side and
// read per output frame by the mixer, which approaches it exponentially.
//
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default time constant used when ramping towards a new gain target.
pub const DEFAULT_RAMP_TIME: Duration = Duration::from_millis(10);

/// The shared gain target. Values are always within [0.0, 1.0].
pub struct Gain {
    /// The target level, stored as f32 bits.
    target: AtomicU32,
    /// Set when the next frame should jump straight to the target.
    jump: AtomicBool,
}

impl Gain {
    /// Creates a new gain whose smoothed level starts at the given value.
    pub fn new(initial: f32) -> Gain {
        Gain {
            target: AtomicU32::new(clamp_level(initial).to_bits()),
            jump: AtomicBool::new(true),
        }
    }

    /// Sets a new target. The rendered level ramps towards it.
    pub fn set_target(&self, target: f32) {
        self.target
            .store(clamp_level(target).to_bits(), Ordering::Release);
    }

    /// Sets a new target and makes the rendered level jump to it without ramping.
    pub fn reset(&self, level: f32) {
        self.set_target(level);
        self.jump.store(true, Ordering::Release);
    }

    /// Returns the current target.
    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Acquire))
    }

    fn take_jump(&self) -> bool {
        self.jump.swap(false, Ordering::AcqRel)
    }
}

fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 1.0)
}

/// Per-frame smoother that follows a shared gain target with a one-pole
/// exponential approach, reaching ~63% of a step after one time constant.
pub struct GainSmoother {
    gain: Arc<Gain>,
    current: f32,
    coefficient: f32,
}

impl GainSmoother {
    /// Creates a smoother for the given gain at the given sample rate.
    pub fn new(gain: Arc<Gain>, sample_rate: u32, time_constant: Duration) -> GainSmoother {
        // The smoother starts on the target, so a pending jump is already satisfied.
        gain.take_jump();
        let current = gain.target();
        GainSmoother {
            gain,
            current,
            coefficient: Self::coefficient(sample_rate, time_constant),
        }
    }

    fn coefficient(sample_rate: u32, time_constant: Duration) -> f32 {
        let frames = time_constant.as_secs_f64() * sample_rate as f64;
        if frames <= 0.0 {
            return 1.0;
        }
        (1.0 - (-1.0 / frames).exp()) as f32
    }

    /// Advances the smoother by one frame and returns the level for that frame.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let target = self.gain.target();
        if self.gain.take_jump() {
            self.current = target;
        } else {
            self.current += (target - self.current) * self.coefficient;
            if (target - self.current).abs() < 1e-6 {
                self.current = target;
            }
        }
        self.current
    }

    /// Returns the level of the last rendered frame.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Returns the shared gain this smoother follows.
    pub fn gain(&self) -> Arc<Gain> {
        self.gain.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_clamps_targets() {
        let gain = Gain::new(2.0);
        assert_eq!(1.0, gain.target());
        gain.set_target(-0.5);
        assert_eq!(0.0, gain.target());
        gain.set_target(f32::NAN);
        assert_eq!(0.0, gain.target());
        gain.set_target(0.25);
        assert_eq!(0.25, gain.target());
    }

    #[test]
    fn test_smoother_ramps_instead_of_stepping() {
        let gain = Arc::new(Gain::new(0.0));
        let mut smoother = GainSmoother::new(gain.clone(), 48000, DEFAULT_RAMP_TIME);
        assert_eq!(0.0, smoother.next());

        gain.set_target(1.0);
        let first = smoother.next();
        assert!(first > 0.0, "level should start moving, got {}", first);
        assert!(first < 0.01, "level should not jump, got {}", first);

        // One time constant (480 frames) gets about 63% of the way there.
        let mut level = first;
        for _ in 1..480 {
            let next = smoother.next();
            assert!(next >= level, "level should rise monotonically");
            level = next;
        }
        assert!((level - 0.632).abs() < 0.01, "level after one tau was {}", level);

        // Ten time constants later the target has been reached.
        for _ in 0..4800 {
            level = smoother.next();
        }
        assert!((level - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_smoother_follows_downward_ramps() {
        let gain = Arc::new(Gain::new(1.0));
        let mut smoother = GainSmoother::new(gain.clone(), 44100, DEFAULT_RAMP_TIME);
        gain.set_target(0.5);
        let first = smoother.next();
        assert!(first < 1.0 && first > 0.99);
        for _ in 0..44100 {
            smoother.next();
        }
        assert_eq!(0.5, smoother.current());
    }

    #[test]
    fn test_reset_jumps() {
        let gain = Arc::new(Gain::new(0.0));
        let mut smoother = GainSmoother::new(gain.clone(), 44100, DEFAULT_RAMP_TIME);
        smoother.next();
        gain.reset(0.8);
        assert_eq!(0.8, smoother.next());
    }

    #[test]
    fn test_zero_time_constant_is_immediate() {
        let gain = Arc::new(Gain::new(0.0));
        let mut smoother = GainSmoother::new(gain.clone(), 44100, Duration::ZERO);
        smoother.next();
        gain.set_target(0.3);
        assert_eq!(0.3, smoother.next());
    }
}
