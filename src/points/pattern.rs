//! Value patterns driving the simulated points.
//!
//! All patterns except [`Pattern::RandomWalk`] are pure functions of the
//! elapsed time. A non-positive or non-finite period turns every periodic
//! pattern into a constant `min`.

use std::f64::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Waveform of a simulated point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Sine between `min` and `max`
    Sine,
    /// `max` for the first half period, `min` for the second
    Square,
    /// Linear ramp from `min` towards `max`, restarting every period
    Sawtooth,
    /// Bounded random walk with steps of 10% of the range
    RandomWalk,
    /// Always `min`
    #[default]
    Constant,
}

/// Shape parameters of a pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    /// Pattern kind
    pub pattern: Pattern,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Period in seconds
    pub period: f64,
    /// Phase shift in seconds
    pub phase: f64,
}

impl Waveform {
    /// Value at `elapsed` seconds after the simulation start.
    ///
    /// `previous` is only consulted by the random walk, which starts from
    /// the midpoint of the range when there is no previous value.
    pub fn value_at<R: Rng + ?Sized>(&self, elapsed: f64, previous: Option<f64>, rng: &mut R) -> f64 {
        match self.pattern {
            Pattern::Sine => self.sine(elapsed),
            Pattern::Square => self.square(elapsed),
            Pattern::Sawtooth => self.sawtooth(elapsed),
            Pattern::RandomWalk => self.random_walk(previous, rng),
            Pattern::Constant => self.min,
        }
    }

    fn has_period(&self) -> bool {
        self.period.is_finite() && self.period > 0.0
    }

    fn sine(&self, elapsed: f64) -> f64 {
        if !self.has_period() {
            return self.min;
        }
        let half_range = (self.max - self.min) / 2.0;
        self.min + half_range + half_range * (TAU * (elapsed + self.phase) / self.period).sin()
    }

    fn square(&self, elapsed: f64) -> f64 {
        if !self.has_period() {
            return self.min;
        }
        if elapsed.rem_euclid(self.period) < self.period / 2.0 {
            self.max
        } else {
            self.min
        }
    }

    fn sawtooth(&self, elapsed: f64) -> f64 {
        if !self.has_period() {
            return self.min;
        }
        self.min + (self.max - self.min) * (elapsed.rem_euclid(self.period) / self.period)
    }

    fn random_walk<R: Rng + ?Sized>(&self, previous: Option<f64>, rng: &mut R) -> f64 {
        let midpoint = self.min + (self.max - self.min) / 2.0;
        let current = previous.unwrap_or(midpoint);
        let step = (self.max - self.min) * 0.1;
        if !(step.is_finite() && step > 0.0) {
            return bound(current, self.min, self.max);
        }
        bound(current + rng.gen_range(-step..=step), self.min, self.max)
    }
}

/// Clamp without the panics of `f64::clamp` on inverted bounds.
fn bound(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn waveform(pattern: Pattern) -> Waveform {
        Waveform {
            pattern,
            min: 10.0,
            max: 20.0,
            period: 8.0,
            phase: 0.0,
        }
    }

    fn value(w: &Waveform, elapsed: f64) -> f64 {
        w.value_at(elapsed, None, &mut StdRng::seed_from_u64(1))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sine() {
        let w = waveform(Pattern::Sine);
        assert!(close(value(&w, 0.0), 15.0));
        assert!(close(value(&w, 2.0), 20.0));
        assert!(close(value(&w, 6.0), 10.0));
        assert!(close(value(&w, 10.0), 20.0));

        let shifted = Waveform { phase: 2.0, ..w };
        assert!(close(value(&shifted, 0.0), 20.0));
    }

    #[test]
    fn test_square() {
        let w = waveform(Pattern::Square);
        assert_eq!(value(&w, 0.0), 20.0);
        assert_eq!(value(&w, 3.9), 20.0);
        assert_eq!(value(&w, 4.0), 10.0);
        assert_eq!(value(&w, 7.9), 10.0);
        assert_eq!(value(&w, 8.0), 20.0);
    }

    #[test]
    fn test_sawtooth() {
        let w = waveform(Pattern::Sawtooth);
        assert!(close(value(&w, 0.0), 10.0));
        assert!(close(value(&w, 2.0), 12.5));
        assert!(close(value(&w, 6.0), 17.5));
        assert!(close(value(&w, 8.0), 10.0));
    }

    #[test]
    fn test_constant() {
        let w = waveform(Pattern::Constant);
        for elapsed in [0.0, 1.5, 1e6] {
            assert_eq!(value(&w, elapsed), 10.0);
        }
    }

    #[test]
    fn test_periodic_patterns_are_pure() {
        let mut rng = StdRng::seed_from_u64(7);
        for pattern in [Pattern::Sine, Pattern::Square, Pattern::Sawtooth, Pattern::Constant] {
            let w = waveform(pattern);
            for elapsed in [0.0, 0.3, 5.5, 123.25] {
                let first = w.value_at(elapsed, Some(99.0), &mut rng);
                let second = w.value_at(elapsed, None, &mut rng);
                assert_eq!(first, second, "{:?} at {}", pattern, elapsed);
            }
        }
    }

    #[test]
    fn test_degenerate_period_yields_min() {
        for period in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            for pattern in [Pattern::Sine, Pattern::Square, Pattern::Sawtooth] {
                let w = Waveform {
                    period,
                    ..waveform(pattern)
                };
                assert_eq!(value(&w, 3.0), 10.0, "{:?} with period {}", pattern, period);
            }
        }
    }

    #[test]
    fn test_random_walk_stays_in_range() {
        let w = waveform(Pattern::RandomWalk);
        let mut rng = StdRng::seed_from_u64(42);
        let mut previous = None;

        for _ in 0..10_000 {
            let v = w.value_at(0.0, previous, &mut rng);
            assert!((10.0..=20.0).contains(&v), "{} out of range", v);
            if let Some(p) = previous {
                assert!((v - p).abs() <= 1.0 + 1e-9);
            }
            previous = Some(v);
        }
    }

    #[test]
    fn test_random_walk_starts_at_midpoint() {
        let w = waveform(Pattern::RandomWalk);
        let v = value(&w, 0.0);
        assert!((14.0..=16.0).contains(&v));
    }

    #[test]
    fn test_random_walk_empty_range() {
        let w = Waveform {
            min: 5.0,
            max: 5.0,
            ..waveform(Pattern::RandomWalk)
        };
        assert_eq!(value(&w, 0.0), 5.0);
        assert_eq!(w.value_at(0.0, Some(9.0), &mut StdRng::seed_from_u64(3)), 5.0);
    }
}
