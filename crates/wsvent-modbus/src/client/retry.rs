// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Exponential backoff used for request retries and reconnect cycles.

use std::time::Duration;

use rand::Rng;

use crate::types::{ReconnectPolicy, RetryPolicy};

// =============================================================================
// ExponentialBackoff
// =============================================================================

/// Exponential backoff with optional jitter.
///
/// Delay for attempt `n` (0-based) is `initial_delay * multiplier^n`, capped
/// at `max_delay`, then spread by `±jitter_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter factor in `[0, 1]`.
    pub jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Creates a backoff without jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before attempt `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        let capped = if base.is_finite() { base.min(max) } else { max };

        let final_delay = if self.jitter_factor > 0.0 && capped > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter_range = capped * self.jitter_factor;
            let jitter = rng.gen_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

impl From<&RetryPolicy> for ExponentialBackoff {
    fn from(policy: &RetryPolicy) -> Self {
        Self::new(policy.initial_delay, policy.max_delay)
            .with_multiplier(policy.multiplier)
            .with_jitter(policy.jitter)
    }
}

impl From<&ReconnectPolicy> for ExponentialBackoff {
    fn from(policy: &ReconnectPolicy) -> Self {
        Self::new(policy.initial_delay, policy.max_delay).with_multiplier(policy.multiplier)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&RetryPolicy::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
