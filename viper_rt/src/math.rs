// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checked math helpers backing numeric built-ins.

use crate::trap::{RtTrap, TrapKind};

/// Outcome of [`pow_f64_chkdom`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowStatus {
    /// Result is in domain.
    Ok,
    /// Negative finite base raised to a non-integer exponent.
    NegativeBaseFractional,
    /// Finite inputs produced an infinite result.
    Overflow,
}

/// IEEE-754 `pow` with a domain report; the value is returned even when out of domain.
#[must_use]
pub fn pow_f64_chkdom(base: f64, exp: f64) -> (f64, PowStatus) {
    let value = base.powf(exp);
    if base.is_finite() && base < 0.0 && exp.is_finite() && exp.fract() != 0.0 {
        return (value, PowStatus::NegativeBaseFractional);
    }
    if value.is_infinite() && base.is_finite() && exp.is_finite() && base != 0.0 {
        return (value, PowStatus::Overflow);
    }
    (value, PowStatus::Ok)
}

/// `pow` trapping with `DomainError` when out of domain.
pub fn rt_pow_f64(base: f64, exp: f64) -> Result<f64, RtTrap> {
    match pow_f64_chkdom(base, exp) {
        (v, PowStatus::Ok) => Ok(v),
        (_, PowStatus::NegativeBaseFractional) => Err(RtTrap::with_message(
            TrapKind::DomainError,
            "negative base with fractional exponent",
        )),
        (_, PowStatus::Overflow) => Err(RtTrap::with_message(
            TrapKind::DomainError,
            "overflow in exponentiation",
        )),
    }
}

/// Absolute value; `i64::MIN` traps `Overflow`.
pub fn abs_i64(v: i64) -> Result<i64, RtTrap> {
    v.checked_abs().ok_or(RtTrap::new(TrapKind::Overflow))
}

/// Square root; negative inputs trap `DomainError`.
pub fn sqrt_chk(v: f64) -> Result<f64, RtTrap> {
    if v < 0.0 {
        return Err(RtTrap::with_message(
            TrapKind::DomainError,
            "square root of negative number",
        ));
    }
    Ok(v.sqrt())
}

/// Round toward negative infinity.
#[must_use]
pub fn floor(v: f64) -> f64 {
    v.floor()
}

/// Round toward positive infinity.
#[must_use]
pub fn ceil(v: f64) -> f64 {
    v.ceil()
}

/// Round half to even.
#[must_use]
pub fn round_even(v: f64) -> f64 {
    v.round_ties_even()
}

/// Floating remainder with the sign of the dividend.
#[must_use]
pub fn fmod(a: f64, b: f64) -> f64 {
    a % b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_reports_domain() {
        assert_eq!(pow_f64_chkdom(2.0, 10.0), (1024.0, PowStatus::Ok));
        assert_eq!(pow_f64_chkdom(-2.0, 3.0), (-8.0, PowStatus::Ok));
        let (v, s) = pow_f64_chkdom(-2.0, 0.5);
        assert!(v.is_nan());
        assert_eq!(s, PowStatus::NegativeBaseFractional);
        assert_eq!(pow_f64_chkdom(10.0, 400.0).1, PowStatus::Overflow);
        assert_eq!(pow_f64_chkdom(0.0, -1.0).1, PowStatus::Ok, "pole, not overflow");
    }

    #[test]
    fn rt_pow_traps_with_reason() {
        let t = rt_pow_f64(-2.0, 0.5).unwrap_err();
        assert_eq!(t.kind, TrapKind::DomainError);
        assert_eq!(t.message.as_deref(), Some("negative base with fractional exponent"));
        let t = rt_pow_f64(1e300, 2.0).unwrap_err();
        assert_eq!(t.message.as_deref(), Some("overflow in exponentiation"));
    }

    #[test]
    fn checked_helpers() {
        assert_eq!(abs_i64(-5), Ok(5));
        assert_eq!(abs_i64(i64::MIN).unwrap_err().kind, TrapKind::Overflow);
        assert_eq!(sqrt_chk(9.0), Ok(3.0));
        assert_eq!(sqrt_chk(-1.0).unwrap_err().kind, TrapKind::DomainError);
        assert_eq!(round_even(2.5), 2.0);
        assert_eq!(round_even(3.5), 4.0);
        assert_eq!(floor(-1.5), -2.0);
        assert_eq!(ceil(-1.5), -1.0);
        assert_eq!(fmod(-7.0, 3.0), -1.0);
    }
}
