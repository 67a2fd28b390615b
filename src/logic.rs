//! 4-valued logic: `0`, `1`, `X` (unknown) and `Z` (high impedance).
//!
//! Values cross the read-side API in a compact float encoding so waveform
//! consumers can store them alongside analog traces: `NaN` marks `X`,
//! `+Infinity` marks `Z`, and driven values are `0.0` / `1.0`.

use serde::{Deserialize, Serialize};

/// A single 4-valued signal level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicValue {
    /// Driven low.
    Zero,
    /// Driven high.
    One,
    /// Unknown or contaminated.
    #[default]
    X,
    /// Undriven / high impedance.
    Z,
}

impl LogicValue {
    /// All four values, in table index order.
    pub const ALL: [LogicValue; 4] = [
        LogicValue::Zero,
        LogicValue::One,
        LogicValue::X,
        LogicValue::Z,
    ];

    /// Index used by [`crate::table::LookupTable`] branches.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            LogicValue::Zero => 0,
            LogicValue::One => 1,
            LogicValue::X => 2,
            LogicValue::Z => 3,
        }
    }

    /// True when the value is actively driven (`0` or `1`).
    #[inline]
    pub fn is_driven(self) -> bool {
        matches!(self, LogicValue::Zero | LogicValue::One)
    }

    pub fn from_bool(b: bool) -> Self {
        if b {
            LogicValue::One
        } else {
            LogicValue::Zero
        }
    }

    /// Interprets a bit of an initialization word.
    pub fn from_bit(word: u64, bit: u32) -> Self {
        Self::from_bool((word >> bit) & 1 == 1)
    }

    /// The float encoding used by history records: `NaN` = X, `+Inf` = Z.
    pub fn to_float(self) -> f32 {
        match self {
            LogicValue::Zero => 0.0,
            LogicValue::One => 1.0,
            LogicValue::X => f32::NAN,
            LogicValue::Z => f32::INFINITY,
        }
    }

    /// Decodes the float encoding; anything not 0.0/1.0/+Inf reads as X.
    pub fn from_float(v: f32) -> Self {
        if v.is_nan() {
            LogicValue::X
        } else if v == f32::INFINITY {
            LogicValue::Z
        } else if v == 0.0 {
            LogicValue::Zero
        } else if v == 1.0 {
            LogicValue::One
        } else {
            LogicValue::X
        }
    }
}

impl std::fmt::Display for LogicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            LogicValue::Zero => '0',
            LogicValue::One => '1',
            LogicValue::X => 'x',
            LogicValue::Z => 'z',
        };
        write!(f, "{}", c)
    }
}

/// A multi-bit 4-valued word, MSB first.
///
/// Produced by bus-expression sampling, where several named 1-bit nodes are
/// concatenated into one value per sample time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicWord(pub Vec<LogicValue>);

impl LogicWord {
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// The numeric value, if every bit is driven.
    pub fn to_u64(&self) -> Option<u64> {
        let mut acc = 0u64;
        for &bit in &self.0 {
            acc = (acc << 1)
                | match bit {
                    LogicValue::Zero => 0,
                    LogicValue::One => 1,
                    _ => return None,
                };
        }
        Some(acc)
    }

    /// Builds a word of `width` bits from `value`, MSB first.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width)
            .rev()
            .map(|i| LogicValue::from_bit(value, i as u32))
            .collect();
        LogicWord(bits)
    }

    /// True if any bit is X or Z.
    pub fn has_unknown(&self) -> bool {
        self.0.iter().any(|b| !b.is_driven())
    }
}

impl std::fmt::Display for LogicWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.to_u64() {
            write!(f, "0x{:X}", v)
        } else {
            write!(f, "0b")?;
            for bit in &self.0 {
                write!(f, "{}", bit)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_encoding_roundtrip() {
        for v in LogicValue::ALL {
            assert_eq!(LogicValue::from_float(v.to_float()), v);
        }
    }

    #[test]
    fn test_float_encoding_markers() {
        assert!(LogicValue::X.to_float().is_nan());
        assert_eq!(LogicValue::Z.to_float(), f32::INFINITY);
        assert_eq!(LogicValue::Zero.to_float(), 0.0);
        assert_eq!(LogicValue::One.to_float(), 1.0);
    }

    #[test]
    fn test_word_to_u64() {
        let w = LogicWord(vec![LogicValue::One, LogicValue::Zero, LogicValue::One]);
        assert_eq!(w.to_u64(), Some(0b101));
        assert_eq!(w.to_string(), "0x5");

        let unknown = LogicWord(vec![LogicValue::One, LogicValue::X]);
        assert_eq!(unknown.to_u64(), None);
        assert_eq!(unknown.to_string(), "0b1x");
    }

    #[test]
    fn test_word_from_u64() {
        let w = LogicWord::from_u64(0xAB, 8);
        assert_eq!(w.width(), 8);
        assert_eq!(w.to_u64(), Some(0xAB));
    }

    #[test]
    fn test_display() {
        assert_eq!(LogicValue::Zero.to_string(), "0");
        assert_eq!(LogicValue::Z.to_string(), "z");
    }
}
