//! Window width/level contrast mapping.
//!
//! Maps raw scalar values to 8-bit display intensities. `Auto` stretches the
//! observed value range of whatever is being rendered (slice or whole
//! volume); `Fixed` clamps to `[level - width/2, level + width/2]` before the
//! same linear mapping.

/// Photometric windowing configuration for a render request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Windowing {
    /// Stretch the min/max of the rendered data to the full display range.
    Auto,
    /// Clamp to a fixed window before mapping.
    Fixed { width: f32, level: f32 },
}

impl Windowing {
    /// Resolve the clamp bounds for this configuration. `data_min`/`data_max`
    /// are only consulted in `Auto` mode.
    pub fn bounds(&self, data_min: f32, data_max: f32) -> (f32, f32) {
        match *self {
            Windowing::Auto => (data_min, data_max),
            Windowing::Fixed { width, level } => {
                // Window width below 1 is a caller bug; fall back to 1
                // instead of dividing by a degenerate range.
                let width = if width > 0.0 { width } else { 1.0 };
                (level - width / 2.0, level + width / 2.0)
            }
        }
    }
}

/// Map one scalar value into `[low, high]` and onto a display byte.
/// A degenerate range (`high <= low`) maps everything to 0.
#[inline]
pub fn apply(value: f32, low: f32, high: f32) -> u8 {
    let range = (high - low).max(1.0);
    let value = value.clamp(low, high.max(low));
    (((value - low) / range) * 255.0).floor() as u8
}
