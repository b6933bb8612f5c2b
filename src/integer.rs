use std::cmp;
use std::cmp::Ordering;
use std::fmt::{self, Display};

use num_traits::NumCast;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IntPriv {
    /// Always non-less than zero.
    PosInt(u64),
    /// Always less than zero.
    NegInt(i64),
}

/// A decoded integer value, whether signed or unsigned.
///
/// Signed values in range are stored in their narrowest tagged form; only
/// values above `i64::MAX` need the unsigned representation, so an `Integer`
/// carries whichever side the encoding used and converts on demand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Integer {
    n: IntPriv,
}

impl Integer {
    /// Returns `true` if the integer can be represented as `i64`.
    #[inline]
    pub fn is_i64(&self) -> bool {
        match self.n {
            IntPriv::PosInt(n) => n <= i64::MAX as u64,
            IntPriv::NegInt(..) => true,
        }
    }

    /// Returns `true` if the integer can be represented as `u64`.
    #[inline]
    pub fn is_u64(&self) -> bool {
        match self.n {
            IntPriv::PosInt(..) => true,
            IntPriv::NegInt(..) => false,
        }
    }

    /// Returns the integer represented as `i64` if possible, or else `None`.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self.n {
            IntPriv::PosInt(n) => NumCast::from(n),
            IntPriv::NegInt(n) => Some(n),
        }
    }

    /// Returns the integer represented as `u64` if possible, or else `None`.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self.n {
            IntPriv::PosInt(n) => Some(n),
            IntPriv::NegInt(n) => NumCast::from(n),
        }
    }

    /// Returns the integer represented as `f64` if possible, or else `None`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self.n {
            IntPriv::PosInt(n) => NumCast::from(n),
            IntPriv::NegInt(n) => NumCast::from(n),
        }
    }
}

impl std::default::Default for Integer {
    fn default() -> Self {
        Self {
            n: IntPriv::PosInt(0),
        }
    }
}

impl cmp::Ord for Integer {
    fn cmp(&self, other: &Integer) -> Ordering {
        match (self.n, other.n) {
            (IntPriv::NegInt(lhs), IntPriv::NegInt(ref rhs)) => lhs.cmp(rhs),
            (IntPriv::NegInt(_), IntPriv::PosInt(_)) => Ordering::Less,
            (IntPriv::PosInt(_), IntPriv::NegInt(_)) => Ordering::Greater,
            (IntPriv::PosInt(lhs), IntPriv::PosInt(ref rhs)) => lhs.cmp(rhs),
        }
    }
}

impl cmp::PartialOrd for Integer {
    fn partial_cmp(&self, other: &Integer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.n {
            IntPriv::PosInt(n) => Display::fmt(&n, f),
            IntPriv::NegInt(n) => Display::fmt(&n, f),
        }
    }
}

impl From<u8> for Integer {
    fn from(n: u8) -> Self {
        Integer {
            n: IntPriv::PosInt(n as u64),
        }
    }
}

impl From<u16> for Integer {
    fn from(n: u16) -> Self {
        Integer {
            n: IntPriv::PosInt(n as u64),
        }
    }
}

impl From<u32> for Integer {
    fn from(n: u32) -> Self {
        Integer {
            n: IntPriv::PosInt(n as u64),
        }
    }
}

impl From<u64> for Integer {
    fn from(n: u64) -> Self {
        Integer {
            n: IntPriv::PosInt(n),
        }
    }
}

impl From<i8> for Integer {
    fn from(n: i8) -> Self {
        Integer::from(n as i64)
    }
}

impl From<i16> for Integer {
    fn from(n: i16) -> Self {
        Integer::from(n as i64)
    }
}

impl From<i32> for Integer {
    fn from(n: i32) -> Self {
        Integer::from(n as i64)
    }
}

impl From<i64> for Integer {
    fn from(n: i64) -> Self {
        if n < 0 {
            Integer {
                n: IntPriv::NegInt(n),
            }
        } else {
            Integer {
                n: IntPriv::PosInt(n as u64),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_unsigned_agreement() {
        assert_eq!(Integer::from(5i64), Integer::from(5u64));
        assert_eq!(Integer::from(0i64), Integer::default());
        assert_ne!(Integer::from(-5i64), Integer::from(5u64));
    }

    #[test]
    fn conversions() {
        let i = Integer::from(-1i32);
        assert!(i.is_i64());
        assert!(!i.is_u64());
        assert_eq!(i.as_i64(), Some(-1));
        assert_eq!(i.as_u64(), None);

        let i = Integer::from(u64::MAX);
        assert!(!i.is_i64());
        assert_eq!(i.as_i64(), None);
        assert_eq!(i.as_u64(), Some(u64::MAX));

        let i = Integer::from(300u16);
        assert_eq!(i.as_i64(), Some(300));
        assert_eq!(i.as_f64(), Some(300.0));
    }

    #[test]
    fn ordering() {
        let mut values = vec![
            Integer::from(u64::MAX),
            Integer::from(-1i64),
            Integer::from(0u8),
            Integer::from(i64::MIN),
            Integer::from(1u8),
        ];
        values.sort();
        assert_eq!(values[0], Integer::from(i64::MIN));
        assert_eq!(values[1], Integer::from(-1i64));
        assert_eq!(values[2], Integer::from(0u8));
        assert_eq!(values[3], Integer::from(1u8));
        assert_eq!(values[4], Integer::from(u64::MAX));
    }
}
