//! Exponential inter-arrival sampling

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Longest interval a sampler will hand out.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Source of timer intervals for the miner race.
pub trait IntervalSampler: Send {
    /// Draw the next interval.
    fn next_interval(&mut self) -> Duration;
}

/// Draws `-ln(U) * τ` with `U` uniform on (0, 1).
pub struct ExponentialSampler<R = StdRng> {
    mean: Duration,
    rng: R,
}

impl ExponentialSampler<StdRng> {
    /// Sampler seeded from OS entropy.
    pub fn from_entropy(mean: Duration) -> Self {
        Self::with_rng(mean, StdRng::from_entropy())
    }

    /// Deterministic sampler.
    pub fn seeded(mean: Duration, seed: u64) -> Self {
        Self::with_rng(mean, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ExponentialSampler<R> {
    pub fn with_rng(mean: Duration, rng: R) -> Self {
        Self { mean, rng }
    }

    pub fn mean(&self) -> Duration {
        self.mean
    }

    /// Draw one interval.
    pub fn sample(&mut self) -> Duration {
        // gen_range excludes 1.0; MIN_POSITIVE excludes 0 so ln stays finite
        let u: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let secs = -u.ln() * self.mean.as_secs_f64();
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_INTERVAL)
            .min(MAX_INTERVAL)
    }
}

impl<R: Rng + Send> IntervalSampler for ExponentialSampler<R> {
    fn next_interval(&mut self) -> Duration {
        self.sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAU: Duration = Duration::from_secs(10);
    const N: usize = 5_000;

    /// Two-sample Kolmogorov–Smirnov statistic.
    fn ks_statistic(mut a: Vec<f64>, mut b: Vec<f64>) -> f64 {
        a.sort_by(f64::total_cmp);
        b.sort_by(f64::total_cmp);
        let (n, m) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j, mut d) = (0usize, 0usize, 0f64);
        while i < a.len() && j < b.len() {
            if a[i] <= b[j] {
                i += 1;
            } else {
                j += 1;
            }
            d = d.max((i as f64 / n - j as f64 / m).abs());
        }
        d
    }

    /// Critical value at α = 0.001.
    fn ks_critical(n: usize, m: usize) -> f64 {
        let (n, m) = (n as f64, m as f64);
        1.95 * ((n + m) / (n * m)).sqrt()
    }

    fn draws(seed: u64, count: usize) -> Vec<f64> {
        let mut sampler = ExponentialSampler::seeded(TAU, seed);
        (0..count).map(|_| sampler.sample().as_secs_f64()).collect()
    }

    #[test]
    fn test_sample_mean_close_to_tau() {
        let samples = draws(7, N);
        let mean = samples.iter().sum::<f64>() / N as f64;
        assert!((mean - 10.0).abs() < 0.5, "mean {mean}");
        assert!(samples.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_residual_after_reset_matches_fresh_start() {
        // Waiting t without a fire, the remaining time must look like a
        // fresh draw.
        let elapsed = 4.0;
        let residual: Vec<f64> = draws(11, N * 3)
            .into_iter()
            .filter(|x| *x > elapsed)
            .map(|x| x - elapsed)
            .collect();
        let fresh = draws(13, N);

        let d = ks_statistic(residual.clone(), fresh.clone());
        assert!(
            d < ks_critical(residual.len(), fresh.len()),
            "KS statistic {d}"
        );
    }

    #[test]
    fn test_redraw_after_reset_matches_fresh_start() {
        let mut racing = ExponentialSampler::seeded(TAU, 21);
        let redrawn: Vec<f64> = (0..N)
            .map(|_| {
                let _abandoned = racing.sample();
                racing.sample().as_secs_f64()
            })
            .collect();
        let fresh = draws(23, N);

        let d = ks_statistic(redrawn, fresh);
        assert!(d < ks_critical(N, N), "KS statistic {d}");
    }

    #[test]
    fn test_different_distributions_are_detected() {
        let slow: Vec<f64> = draws(31, N).into_iter().map(|x| x * 2.0).collect();
        let d = ks_statistic(slow, draws(37, N));
        assert!(d > ks_critical(N, N));
    }
}
