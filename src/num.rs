use alloy::primitives::U256;
use fastnum::{
    bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

use crate::error::KuruError;

/// Rounding applied when a decimal value does not land on the on-chain grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rounding {
    /// Value must already be on the grid.
    #[default]
    Exact,
    Down,
    Up,
}

/// Fixed-point to decimal converter.
///
/// On-chain integers are decimal values multiplied by `10^decimals`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Converter for a precision expressed as a multiplier, e.g. `10^8`.
    ///
    /// Returns `None` if the multiplier is not a power of ten.
    pub fn from_precision(precision: U256) -> Option<Self> {
        if precision.is_zero() {
            return None;
        }
        let ten = U256::from(10);
        let mut rest = precision;
        let mut decimals = 0u8;
        while rest > U256::from(1) {
            if rest % ten != U256::ZERO {
                return None;
            }
            rest /= ten;
            decimals = decimals.checked_add(1)?;
        }
        Some(Self::new(decimals))
    }

    pub fn decimals(&self) -> u8 {
        self.decimals as u8
    }

    /// Multiplier this converter scales by.
    pub fn precision(&self) -> U256 {
        U256::from(10).pow(U256::from(self.decimals))
    }

    /// Returns `None` if `value` does not fit in `N` 64-bit words.
    pub fn try_from_unsigned<const N: usize>(&self, value: U256) -> Option<UnsignedDecimal<N>> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())?;
        Some(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// Converts an on-chain value, failing with [`KuruError::Decode`] on overflow.
    pub fn from_unsigned<const N: usize>(
        &self,
        value: U256,
    ) -> Result<UnsignedDecimal<N>, KuruError> {
        self.try_from_unsigned(value).ok_or_else(|| {
            KuruError::Decode(format!(
                "{value} overflows a {}-bit decimal",
                N * 64
            ))
        })
    }

    pub fn to_unsigned<const N: usize>(&self, value: UnsignedDecimal<N>) -> U256 {
        let rescaled = value.rescale(self.decimals as i16);
        U256::from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
    }

    /// Scales `value` to on-chain units and snaps it to a multiple of `step`
    /// units according to `rounding`.
    ///
    /// Returns `None` if `step` is zero or if [`Rounding::Exact`] is requested
    /// and the value is off the grid.
    pub fn normalize<const N: usize>(
        &self,
        value: UnsignedDecimal<N>,
        step: U256,
        rounding: Rounding,
    ) -> Option<U256> {
        if step.is_zero() {
            return None;
        }
        let integral = Converter::default();
        let step_units = integral.try_from_unsigned::<N>(step)?;
        let scaled = value * integral.try_from_unsigned::<N>(self.precision())?;
        let steps = scaled / step_units;
        let snapped = match rounding {
            Rounding::Exact => {
                let floor = steps.floor();
                if floor != steps {
                    return None;
                }
                floor
            }
            Rounding::Down => steps.floor(),
            Rounding::Up => steps.ceil(),
        };
        Some(integral.to_unsigned(snapped * step_units))
    }

    /// Scales `value` to on-chain units dropping digits beyond the precision.
    pub fn truncate<const N: usize>(&self, value: UnsignedDecimal<N>) -> U256 {
        self.normalize(value, U256::from(1), Rounding::Down)
            .unwrap_or_default()
    }
}
