//! Arbitrary-precision token amounts
//!
//! Balances, transfer amounts, fees and rewards are carried as
//! `malachite::Natural` and never wrap. Subtraction is only available in
//! checked form.

use crate::{CoreError, CoreResult};
use malachite::Natural;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Non-negative token amount of unbounded size
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    inner: Natural,
}

impl Amount {
    pub fn zero() -> Self {
        Self {
            inner: Natural::from(0u32),
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Self {
            inner: Natural::from(value),
        }
    }

    pub fn from_u128(value: u128) -> Self {
        Self {
            inner: Natural::from(value),
        }
    }

    pub fn from_natural(inner: Natural) -> Self {
        Self { inner }
    }

    pub fn as_natural(&self) -> &Natural {
        &self.inner
    }

    pub fn is_zero(&self) -> bool {
        self.inner == Natural::from(0u32)
    }

    /// `self - other`, or `None` when `other` is larger
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.inner >= other.inner {
            Some(Self {
                inner: &self.inner - &other.inner,
            })
        } else {
            None
        }
    }

    /// `self * numerator / denominator`, rounded down
    pub fn mul_div(&self, numerator: u64, denominator: u64) -> CoreResult<Amount> {
        if denominator == 0 {
            return Err(CoreError::InvalidAmount(
                "division by zero denominator".to_string(),
            ));
        }
        let scaled = &self.inner * Natural::from(numerator);
        Ok(Self {
            inner: scaled / Natural::from(denominator),
        })
    }

    /// Canonical byte encoding used inside hashed structures: the decimal
    /// representation, which has no leading zeros and is therefore unique.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        self.inner.to_string().into_bytes()
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount {
            inner: self.inner + rhs.inner,
        }
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, rhs: &'a Amount) -> Amount {
        Amount {
            inner: &self.inner + &rhs.inner,
        }
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.inner += &rhs.inner;
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Natural::from_str(s.trim())
            .map(Amount::from_natural)
            .map_err(|_| CoreError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.inner)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Amount::from_str(&value).map_err(|_| serde::de::Error::custom("invalid amount value"))
    }
}

impl bincode::Encode for Amount {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.to_canonical_bytes(), encoder)
    }
}
