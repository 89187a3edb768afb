//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the character simulation.
//! All tick-loop arithmetic is integer-only - no floats in gameplay logic.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Q16.16?
//!
//! - World units are pixels; ±32k px covers maps up to 1024 tiles wide
//! - Sub-pixel precision for smooth low-speed movement
//! - Identical results on every platform (x86, ARM, WASM)
//! - Byte-exact state comparison for the dead-reckoning tracker

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

/// Maximum positive value
pub const FIXED_MAX: Fixed = i32::MAX;

/// Minimum negative value
pub const FIXED_MIN: Fixed = i32::MIN;

// =============================================================================
// WORLD GEOMETRY CONSTANTS
// =============================================================================

/// Side length of one map tile in pixels: 32.0
pub const TILE_SIZE: Fixed = 32 << FIXED_SCALE;

/// Physical (collision box) size of a character in pixels: 28.0
pub const CHARACTER_SIZE: Fixed = 28 << FIXED_SCALE;

/// Half the character collision box, used for corner probes.
pub const CHARACTER_HALF: Fixed = CHARACTER_SIZE / 2;

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use charcore::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert an integer pixel count to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Convert fixed-point to float for display/diagnostics.
///
/// # Warning
/// Only use for logs and rendering. NEVER use result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Round a fixed-point value to the nearest integer pixel.
///
/// Rounds half away from zero, matching the quantization used by the
/// snapshot projection.
#[inline]
pub fn fixed_round_to_int(x: Fixed) -> i32 {
    if x >= 0 {
        (x.wrapping_add(FIXED_HALF)) >> FIXED_SCALE
    } else {
        -((x.wrapping_neg().wrapping_add(FIXED_HALF)) >> FIXED_SCALE)
    }
}

/// Truncate a fixed-point value to its integer part (toward negative infinity).
#[inline]
pub const fn fixed_floor_to_int(x: Fixed) -> i32 {
    x >> FIXED_SCALE
}

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
///
/// # Determinism
/// - Uses wrapping arithmetic
/// - Truncates toward zero (Rust default for integer division)
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    // Widen to i64, multiply, shift back
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
///
/// # Determinism
/// - Uses wrapping arithmetic
/// - Truncates toward zero
/// - Divide-by-zero returns 0 (not panic)
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0; // Deterministic: don't panic
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Square root using Newton-Raphson iteration.
///
/// Safe from divide-by-zero: returns 0 for non-positive inputs.
/// Uses exactly 6 iterations for determinism.
///
/// # Prefer Squared Distances
/// When possible, use `distance_squared` instead of `distance`
/// to avoid sqrt entirely. It's faster and equally deterministic.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }

    // Initial guess: x/2, but never zero
    let mut guess = (x >> 1).max(1);

    // Newton-Raphson: guess = (guess + x/guess) / 2
    // Fixed 6 iterations for determinism
    for _ in 0..6 {
        let div = fixed_div(x, guess);
        guess = (guess.wrapping_add(div)) >> 1;

        // Safety: never let guess become zero
        if guess == 0 {
            guess = 1;
        }
    }

    guess
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 { x.wrapping_neg() } else { x }
}

/// Sign of a fixed-point number: -1, 0, or +1.
#[inline]
pub fn fixed_sign(x: Fixed) -> i32 {
    match x {
        0 => 0,
        n if n > 0 => 1,
        _ => -1,
    }
}

/// Minimum of two fixed-point numbers.
#[inline]
pub fn fixed_min(a: Fixed, b: Fixed) -> Fixed {
    if a < b { a } else { b }
}

/// Maximum of two fixed-point numbers.
#[inline]
pub fn fixed_max(a: Fixed, b: Fixed) -> Fixed {
    if a > b { a } else { b }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    fixed_max(min, fixed_min(max, value))
}

/// Linear interpolation: a + (b - a) * t
/// where t is in fixed-point (0.0 = 0, 1.0 = FIXED_ONE)
#[inline]
pub fn fixed_lerp(a: Fixed, b: Fixed, t: Fixed) -> Fixed {
    let diff = b.wrapping_sub(a);
    a.wrapping_add(fixed_mul(diff, t))
}

/// Add `amount` to `value` without exceeding `[min, max]` in the
/// direction of the addition.
///
/// The velocity-control primitive: acceleration may never push a
/// component past the control speed, but a component that is already
/// faster (from an external force) is left untouched.
#[inline]
pub fn saturated_add(min: Fixed, max: Fixed, value: Fixed, amount: Fixed) -> Fixed {
    if amount < 0 {
        if value < min {
            return value;
        }
        fixed_max(value.wrapping_add(amount), min)
    } else {
        if value > max {
            return value;
        }
        fixed_min(value.wrapping_add(amount), max)
    }
}

// =============================================================================
// ANGLES
// =============================================================================

/// Angle quantization factor for the snapshot projection: wire angles
/// are transported as `round(radians * 256)`.
pub const ANGLE_SCALE: i32 = 256;

/// Pi in fixed-point.
pub const FIXED_PI: Fixed = 205887; // round(3.14159265 * 65536)

/// Deterministic atan2 approximation, returning a fixed-point angle in
/// radians in (-pi, pi].
///
/// Octant polynomial fit; the max error is far below the 1/256-radian
/// quantization step of the wire angle, so every host agrees on the
/// quantized value.
pub fn fixed_atan2(y: Fixed, x: Fixed) -> Fixed {
    if x == 0 && y == 0 {
        return 0;
    }

    let abs_y = fixed_abs(y).max(1);
    let (r, base) = if x >= 0 {
        let r = fixed_div(x.wrapping_sub(abs_y), x.wrapping_add(abs_y));
        (r, FIXED_PI / 4)
    } else {
        let r = fixed_div(x.wrapping_add(abs_y), abs_y.wrapping_sub(x));
        (r, 3 * (FIXED_PI / 4))
    };

    // angle = base - r * (pi/4 + 0.273 * (1 - |r|))
    let coeff = (FIXED_PI / 4)
        .wrapping_add(fixed_mul(to_fixed(0.273), FIXED_ONE - fixed_abs(r)));
    let angle = base.wrapping_sub(fixed_mul(r, coeff));

    if y < 0 { -angle } else { angle }
}

// =============================================================================
// TESTS
// =============================================================================
