use crate::traits::{Acceleration, ForcingTerm};
use serde::{Deserialize, Serialize};

/// Coefficients of `a * acc + v * vel + x * pos = forcing(t)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub x: f64,
    pub v: f64,
    pub a: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            x: 1.0,
            v: 1.0,
            a: 1.0,
        }
    }
}

/// A linear second-order equation of motion driven by a time-dependent forcing term,
/// solved for the acceleration:
///
/// ```text
/// acc = (forcing(t) - v * vel - x * pos) / a
/// ```
///
/// Undefined forcing gives undefined acceleration. A zero `a` coefficient is not
/// rejected; the division yields infinities or NaN like any other numeric failure.
#[derive(Debug, Clone)]
pub struct LinearEom<F: ForcingTerm> {
    pub coefficients: Coefficients,
    pub forcing: F,
}

impl<F: ForcingTerm> LinearEom<F> {
    pub fn new(coefficients: Coefficients, forcing: F) -> Self {
        Self {
            coefficients,
            forcing,
        }
    }
}

impl<F: ForcingTerm> Acceleration for LinearEom<F> {
    fn acceleration(&self, t: f64, x: f64, v: f64) -> Option<f64> {
        let rhs = self.forcing.evaluate(t)?;
        let c = &self.coefficients;
        Some((rhs - c.v * v - c.x * x) / c.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::integrate;
    use crate::types::{InitialCondition, Method, TimeSpan};

    #[test]
    fn solves_linear_relation_for_acceleration() {
        let eom = LinearEom::new(
            Coefficients {
                x: 4.0,
                v: 0.5,
                a: 2.0,
            },
            |t: f64| Some(3.0 * t),
        );
        // (6 - 0.5 * 2 - 4 * 1) / 2
        assert_eq!(eom.acceleration(2.0, 1.0, 2.0), Some(0.5));
    }

    #[test]
    fn undefined_forcing_is_undefined_acceleration() {
        let eom = LinearEom::new(Coefficients::default(), |_t: f64| -> Option<f64> { None });
        assert_eq!(eom.acceleration(0.0, 1.0, 1.0), None);
    }

    #[test]
    fn zero_acceleration_coefficient_divides_through() {
        let eom = LinearEom::new(
            Coefficients {
                a: 0.0,
                ..Coefficients::default()
            },
            |_t: f64| Some(1.0),
        );
        assert_eq!(eom.acceleration(0.0, 0.0, 0.0), Some(f64::INFINITY));
        assert!(eom
            .acceleration(0.0, 0.5, 0.5)
            .is_some_and(|a| a.is_nan()));
    }

    #[test]
    fn unforced_oscillator_matches_explicit_closure() {
        let eom = LinearEom::new(
            Coefficients {
                x: 1.0,
                v: 0.0,
                a: 1.0,
            },
            |_t: f64| Some(0.0),
        );
        let closure = |_t: f64, x: f64, _v: f64| Some(-x);
        let initial = InitialCondition::new(1.0, 0.0);
        let span = TimeSpan::new(0.0, 10.0);

        for method in [Method::Euler, Method::RungeKutta4] {
            let from_eom = integrate(&eom, initial, span, 0.1, method);
            let from_closure = integrate(&closure, initial, span, 0.1, method);
            assert_eq!(from_eom, from_closure);
        }
    }
}
