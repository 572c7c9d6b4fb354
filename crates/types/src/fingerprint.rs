//! Deterministic digests of data windows used as cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::sample::Sample;
use crate::window::DataWindow;

/// An order-sensitive digest of an input window.
///
/// Every sample's timestamp and value bits contribute to the digest, so equal
/// fingerprints imply equal input data. This is the correctness contract the
/// memoization layer depends on.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of a window.
    #[must_use]
    pub fn of_window(window: &DataWindow) -> Self {
        Self::of_samples(window.samples())
    }

    /// Computes the fingerprint of a raw sample slice.
    #[must_use]
    pub fn of_samples(samples: &[Sample]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((samples.len() as u64).to_le_bytes());
        for sample in samples {
            hasher.update(sample.timestamp_ns.to_le_bytes());
            hasher.update(sample.value.to_bits().to_le_bytes());
        }
        Self(hasher.finalize().into())
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns a short hex prefix for diagnostics.
    #[must_use]
    pub fn short_hex(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(values: &[f64]) -> DataWindow {
        DataWindow::from_values(0, 10, values).unwrap()
    }

    #[test]
    fn test_equal_windows_equal_fingerprints() {
        let a = Fingerprint::of_window(&window(&[1.0, 2.0, 3.0]));
        let b = Fingerprint::of_window(&window(&[1.0, 2.0, 3.0]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_value_change_changes_fingerprint() {
        let a = Fingerprint::of_window(&window(&[1.0, 2.0, 3.0]));
        let b = Fingerprint::of_window(&window(&[1.0, 2.0, 3.1]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_interior_change_changes_fingerprint() {
        // The weak first/middle/last scheme would miss this.
        let a = Fingerprint::of_window(&window(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        let b = Fingerprint::of_window(&window(&[1.0, 9.0, 3.0, 4.0, 5.0]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_change_changes_fingerprint() {
        let a = Fingerprint::of_window(&DataWindow::from_values(0, 10, &[1.0, 2.0]).unwrap());
        let b = Fingerprint::of_window(&DataWindow::from_values(5, 10, &[1.0, 2.0]).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_length_is_part_of_digest() {
        let a = Fingerprint::of_samples(&[]);
        let b = Fingerprint::of_samples(&[Sample::new(0, 0.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_hex() {
        let fp = Fingerprint::of_samples(&[]);
        assert_eq!(fp.to_string().len(), 64);
        assert_eq!(fp.short_hex().len(), 16);
    }
}
