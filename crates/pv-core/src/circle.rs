//! Standard circle sampling table
//!
//! Every sampled curve (limbs, terminators, grid circles, rings) walks the
//! same table of cosines and sines. The table is built so that it is exactly
//! symmetric: the first octant is evaluated directly and every other entry
//! is copied from it with a sign change, so the quarter points are exact.

use std::f64::consts::PI;

use crate::constants::STANDARD_STEPS;

/// Cosines and sines of `i · 2π / STANDARD_STEPS` for `i` in `1..=STANDARD_STEPS`.
///
/// Index 0 is unused and stays zero; the walk always starts at the first skip
/// and finishes by closing back to angle zero explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardCircle {
    cos: [f64; STANDARD_STEPS + 1],
    sin: [f64; STANDARD_STEPS + 1],
}

impl StandardCircle {
    /// Build the table.
    pub fn new() -> Self {
        let mut cos = [0.0; STANDARD_STEPS + 1];
        let mut sin = [0.0; STANDARD_STEPS + 1];
        let angle = 2.0 * PI / STANDARD_STEPS as f64;
        let quarter = STANDARD_STEPS / 4;
        let eighth = STANDARD_STEPS / 8;

        cos[quarter] = 0.0;
        sin[quarter] = 1.0;

        for i in 1..=eighth {
            cos[i] = (i as f64 * angle).cos();
            sin[i] = (i as f64 * angle).sin();
        }
        for i in eighth + 1..quarter {
            sin[i] = cos[quarter - i];
            cos[i] = sin[quarter - i];
        }
        for i in quarter + 1..=STANDARD_STEPS {
            let j = i - quarter;
            cos[i] = -sin[j];
            sin[i] = cos[j];
        }

        Self { cos, sin }
    }

    /// Cosine of step `i`.
    #[inline]
    pub fn cos(&self, i: usize) -> f64 {
        self.cos[i]
    }

    /// Sine of step `i`.
    #[inline]
    pub fn sin(&self, i: usize) -> f64 {
        self.sin[i]
    }
}

impl Default for StandardCircle {
    fn default() -> Self {
        Self::new()
    }
}
