/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All possible errors that draw derivation can produce.
///
/// Draws themselves never fail; errors only come from scaling a draw into an
/// integer range or converting it into a high-precision integer.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested integer bounds are inverted.
    #[error("invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: i64, max: i64 },

    /// A draw was NaN or infinite.
    #[error("draw {0} is not finite")]
    NonFiniteDraw(f64),

    /// A draw fell outside the half-open unit interval.
    #[error("draw {0} is outside [0, 1)")]
    DrawOutOfRange(f64),
}

/// Validates that `raw` is a usable draw in `[0, 1)`.
pub(crate) fn check_unit_interval(raw: f64) -> Result<f64> {
    if !raw.is_finite() {
        return Err(Error::NonFiniteDraw(raw));
    }
    if !(0.0..1.0).contains(&raw) {
        return Err(Error::DrawOutOfRange(raw));
    }
    Ok(raw)
}
