use crate::{Result, error::check_unit_interval};

/// A deterministic source of draws keyed by a seed pair and a nonce.
///
/// This abstraction allows unit processing to run against the real
/// [`ProvablyFairNumbers`] source or a scripted source in tests.
///
/// Implementations must be pure in `(seeds, nonce)`: rewinding the nonce and
/// drawing again yields the same value.
///
/// # Example
/// ```
/// use pfn_core::DrawSource;
///
/// struct FixedDraw(u64);
/// impl DrawSource for FixedDraw {
///     fn random(&self) -> f64 {
///         0.5
///     }
///     fn client_seed(&self) -> &str {
///         "client"
///     }
///     fn server_seed(&self) -> &str {
///         "server"
///     }
///     fn nonce(&self) -> u64 {
///         self.0
///     }
///     fn set_nonce(&mut self, nonce: u64) {
///         self.0 = nonce;
///     }
/// }
///
/// let draw = FixedDraw(0);
/// assert_eq!(draw.random_int(1, 10).unwrap(), 6);
/// ```
///
/// [`ProvablyFairNumbers`]: crate::ProvablyFairNumbers
pub trait DrawSource {
    /// Returns the draw for the current nonce, in `[0, 1)`.
    fn random(&self) -> f64;

    /// Returns the current draw scaled into `[min, max]` inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRange`] if `min > max`, or a draw error
    /// if the underlying draw is not in `[0, 1)`.
    fn random_int(&self, min: i64, max: i64) -> Result<i64> {
        scale(self.random(), min, max)
    }

    /// The client half of the seed pair.
    fn client_seed(&self) -> &str;

    /// The server half of the seed pair.
    fn server_seed(&self) -> &str;

    /// The current nonce.
    fn nonce(&self) -> u64;

    /// Moves the source to an arbitrary nonce.
    fn set_nonce(&mut self, nonce: u64);

    /// Advances to the next nonce.
    fn advance(&mut self) {
        self.set_nonce(self.nonce().wrapping_add(1));
    }
}

/// Scales a unit-interval draw into the inclusive integer range `[min, max]`.
///
/// Computes `min + floor(raw * (max - min + 1))` in 128-bit space so the full
/// `i64` range is representable.
///
/// # Errors
///
/// - [`crate::Error::InvalidRange`] if `min > max`.
/// - [`crate::Error::NonFiniteDraw`] or [`crate::Error::DrawOutOfRange`] if
///   `raw` is not in `[0, 1)`.
pub fn scale(raw: f64, min: i64, max: i64) -> Result<i64> {
    if min > max {
        return Err(crate::Error::InvalidRange { min, max });
    }
    let raw = check_unit_interval(raw)?;
    let width = i128::from(max) - i128::from(min);
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let offset = (raw * (width + 1) as f64).floor() as i128;
    // Rounding of very wide spans can land exactly on `width + 1`.
    let value = i128::from(min) + offset.min(width);
    #[allow(clippy::cast_possible_truncation)]
    Ok(value as i64)
}
