//! Cooperative progress reporting.
//!
//! Encoders invoke the callback between blocks (at least every 4096 bytes of
//! input progress), on the caller's thread. When the total input size is
//! unknown the fraction is reported as `0.0` and callers should fall back to
//! byte counts.

/// Receiver for progress updates.
///
/// Any `FnMut(f32, &str)` closure is a `Progress` sink:
///
/// ```
/// use packarc_core::progress::Progress;
///
/// let mut last = 0.0;
/// let mut sink = |fraction: f32, _label: &str| last = fraction;
/// (&mut sink as &mut dyn Progress).report(0.5, "encode");
/// assert_eq!(last, 0.5);
/// ```
pub trait Progress {
    /// Called with the completed fraction (`0.0..=1.0`, or `0.0` when the
    /// total is unknown) and a short label describing the phase.
    fn report(&mut self, fraction: f32, label: &str);
}

impl<F: FnMut(f32, &str)> Progress for F {
    fn report(&mut self, fraction: f32, label: &str) {
        self(fraction, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_progress() {
        let mut seen = Vec::new();
        {
            let mut cb = |fraction: f32, label: &str| seen.push((fraction, label.to_string()));
            let progress: &mut dyn Progress = &mut cb;
            progress.report(0.5, "encode");
            progress.report(1.0, "encode");
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, 1.0);
    }
}
