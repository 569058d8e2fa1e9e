use crate::types::State;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the expression VM.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An equation of motion: returns the acceleration for a given time, position and velocity.
///
/// The function may be partial. `None` means "undefined" at that point (a malformed
/// expression, a domain error in user input, ...). Integrators never abort on `None`;
/// see [`undefined_as_nan`].
pub trait Acceleration {
    fn acceleration(&self, t: f64, x: f64, v: f64) -> Option<f64>;
}

impl<F> Acceleration for F
where
    F: Fn(f64, f64, f64) -> Option<f64>,
{
    fn acceleration(&self, t: f64, x: f64, v: f64) -> Option<f64> {
        self(t, x, v)
    }
}

/// A time-only capability, e.g. the right-hand side the user typed into the front end.
pub trait ForcingTerm {
    fn evaluate(&self, t: f64) -> Option<f64>;
}

impl<F> ForcingTerm for F
where
    F: Fn(f64) -> Option<f64>,
{
    fn evaluate(&self, t: f64) -> Option<f64> {
        self(t)
    }
}

/// A trait for solvers that advance a state by one fixed step.
pub trait Steppable {
    /// Performs one step of size h.
    /// state: current (t, x, v, a), updated in place; t is advanced and rounded
    fn step(&mut self, accel: &impl Acceleration, state: &mut State, h: f64);
}

/// Maps an undefined acceleration onto the NaN sentinel so it poisons the recurrence
/// instead of stopping it.
#[inline]
pub fn undefined_as_nan(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}
