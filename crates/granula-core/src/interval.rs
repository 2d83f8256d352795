//! Interval arithmetic over doubles with outward rounding.
//!
//! Every operation widens its result by one ulp in each direction, so the true
//! real-valued result of the operation on any points inside the operands is
//! contained in the returned interval. Callers that must never overstate a
//! quantity (the per-step privacy budget) use the lower bound.

use crate::error::{AnonError, AnonResult};

/// A closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Interval {
    /// Whether the interval contains `value`.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Next representable double above `x` (toward positive infinity).
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Next representable double below `x` (toward negative infinity).
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

/// Distance from `|x|` to the next larger double in magnitude.
pub fn ulp(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    if x.is_infinite() {
        return f64::INFINITY;
    }
    let exponent = (x.abs().to_bits() >> 52) & 0x7ff;
    if exponent > 52 {
        f64::from_bits((exponent - 52) << 52)
    } else if exponent == 0 {
        f64::from_bits(1)
    } else {
        f64::from_bits(1u64 << (exponent - 1))
    }
}

/// Factory and operations for [`Interval`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalArithmeticDouble;

impl IntervalArithmeticDouble {
    /// Creates the arithmetic.
    pub fn new() -> Self {
        Self
    }

    /// A degenerate interval around a finite double.
    pub fn create_interval(&self, value: f64) -> AnonResult<Interval> {
        self.check(value)?;
        Ok(Interval {
            lower: value,
            upper: value,
        })
    }

    /// Exact interval for an integer; integers beyond 2^53 are widened.
    pub fn create_interval_from_int(&self, value: u64) -> AnonResult<Interval> {
        let d = value as f64;
        if (d as u64) == value && d < 9_007_199_254_740_992.0 {
            self.create_interval(d)
        } else {
            self.create_interval_around(d)
        }
    }

    /// Interval widened by one ulp on each side of `value`.
    pub fn create_interval_around(&self, value: f64) -> AnonResult<Interval> {
        self.check(value)?;
        self.bounded(next_down(value), next_up(value))
    }

    /// Sum of two intervals.
    pub fn add(&self, a: Interval, b: Interval) -> AnonResult<Interval> {
        self.bounded(next_down(a.lower + b.lower), next_up(a.upper + b.upper))
    }

    /// Difference of two intervals.
    pub fn sub(&self, a: Interval, b: Interval) -> AnonResult<Interval> {
        self.bounded(next_down(a.lower - b.upper), next_up(a.upper - b.lower))
    }

    /// Product of two intervals.
    pub fn mult(&self, a: Interval, b: Interval) -> AnonResult<Interval> {
        let candidates = [
            a.lower * b.lower,
            a.lower * b.upper,
            a.upper * b.lower,
            a.upper * b.upper,
        ];
        self.from_candidates(&candidates)
    }

    /// Quotient of two intervals. The divisor must not contain zero.
    pub fn div(&self, a: Interval, b: Interval) -> AnonResult<Interval> {
        if b.contains(0.0) {
            return Err(AnonError::IntervalArithmetic(format!(
                "division by an interval containing zero [{}, {}]",
                b.lower, b.upper
            )));
        }
        let candidates = [
            a.lower / b.lower,
            a.lower / b.upper,
            a.upper / b.lower,
            a.upper / b.upper,
        ];
        self.from_candidates(&candidates)
    }

    fn from_candidates(&self, candidates: &[f64]) -> AnonResult<Interval> {
        let mut lower = f64::INFINITY;
        let mut upper = f64::NEG_INFINITY;
        for &c in candidates {
            self.check(c)?;
            lower = lower.min(c);
            upper = upper.max(c);
        }
        self.bounded(next_down(lower), next_up(upper))
    }

    fn bounded(&self, lower: f64, upper: f64) -> AnonResult<Interval> {
        self.check(lower)?;
        self.check(upper)?;
        Ok(Interval { lower, upper })
    }

    fn check(&self, value: f64) -> AnonResult<()> {
        if value.is_nan() {
            return Err(AnonError::IntervalArithmetic("NaN encountered".to_string()));
        }
        if value.is_infinite() {
            return Err(AnonError::IntervalArithmetic(
                "infinite value encountered".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::BigRational;

    #[test]
    fn test_next_up_down() {
        assert!(next_up(1.0) > 1.0);
        assert!(next_down(1.0) < 1.0);
        assert_eq!(next_down(next_up(1.0)), 1.0);
        assert!(next_up(0.0) > 0.0);
        assert!(next_down(0.0) < 0.0);
        assert!(next_up(-1.0) > -1.0);
    }

    #[test]
    fn test_ulp_matches_neighbour_distance() {
        for x in [1.0, 0.2, 3.5e10, 1e-300, 123456.789] {
            assert_eq!(ulp(x), next_up(x) - x, "ulp of {x}");
        }
        assert_eq!(ulp(0.0), f64::from_bits(1));
    }

    #[test]
    fn test_budget_division_lower_bound() {
        let arith = IntervalArithmeticDouble::new();
        let eps = arith.create_interval(1.0).unwrap();
        let steps = arith.create_interval_from_int(5).unwrap();
        let per_step = arith.div(eps, steps).unwrap();
        assert!(per_step.lower <= 0.2);
        assert!(per_step.upper >= 0.2);
        assert!((per_step.lower - 0.2).abs() < 1e-15);
        // exact check: lower * 5 <= 1
        let exact = BigRational::from_float(per_step.lower).unwrap()
            * BigRational::from_integer(5.into());
        assert!(exact <= BigRational::from_integer(1.into()));
    }

    #[test]
    fn test_division_by_zero_interval() {
        let arith = IntervalArithmeticDouble::new();
        let a = arith.create_interval(1.0).unwrap();
        let z = arith.create_interval(0.0).unwrap();
        assert!(matches!(arith.div(a, z), Err(AnonError::IntervalArithmetic(_))));
    }

    #[test]
    fn test_nan_rejected() {
        let arith = IntervalArithmeticDouble::new();
        assert!(arith.create_interval(f64::NAN).is_err());
        assert!(arith.create_interval(f64::INFINITY).is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        let arith = IntervalArithmeticDouble::new();
        let big = arith.create_interval(f64::MAX).unwrap();
        assert!(arith.mult(big, big).is_err());
    }

    #[test]
    fn test_add_sub_contain_result() {
        let arith = IntervalArithmeticDouble::new();
        let a = arith.create_interval(0.1).unwrap();
        let b = arith.create_interval(0.2).unwrap();
        let sum = arith.add(a, b).unwrap();
        assert!(sum.contains(0.1 + 0.2));
        let diff = arith.sub(b, a).unwrap();
        assert!(diff.contains(0.2 - 0.1));
    }
}
