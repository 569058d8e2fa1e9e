use crate::traits::{undefined_as_nan, Acceleration, Steppable};
use crate::types::State;

/// Rounds a time value to 6 decimal places (half away from zero) to strip the residue
/// that repeated `t += h` accumulates.
#[inline]
pub fn round_time(t: f64) -> f64 {
    (t * 1_000_000.0).round() / 1_000_000.0
}

/// Semi-implicit (symplectic) Euler.
///
/// Position moves first; the acceleration is then sampled at the *new* position:
///
/// ```text
/// x' = x + v * h
/// v' = v + a(t, x', v) * h
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SemiImplicitEuler;

impl SemiImplicitEuler {
    pub fn new() -> Self {
        Self
    }
}

impl Steppable for SemiImplicitEuler {
    fn step(&mut self, accel: &impl Acceleration, state: &mut State, h: f64) {
        let x = state.x + state.v * h;
        let a = undefined_as_nan(accel.acceleration(state.t, x, state.v));

        state.x = x;
        state.v += a * h;
        state.a = a;
        state.t = round_time(state.t + h);
    }
}

/// Classic Runge-Kutta 4th Order Solver on the pair dx/dt = v, dv/dt = a(t, x, v).
#[derive(Debug, Default, Clone, Copy)]
pub struct RungeKutta4;

impl RungeKutta4 {
    pub fn new() -> Self {
        Self
    }
}

impl Steppable for RungeKutta4 {
    fn step(&mut self, accel: &impl Acceleration, state: &mut State, h: f64) {
        let State { t, x, v, .. } = *state;
        let half = 0.5 * h;
        let eval = |t: f64, x: f64, v: f64| undefined_as_nan(accel.acceleration(t, x, v));

        // k = increments of x, l = increments of v
        let a1 = eval(t, x, v);
        let k1 = h * v;
        let l1 = h * a1;

        let k2 = h * (v + l1 / 2.0);
        let l2 = h * eval(t + half, x + k1 / 2.0, v + l1 / 2.0);

        let k3 = h * (v + l2 / 2.0);
        let l3 = h * eval(t + half, x + k2 / 2.0, v + l2 / 2.0);

        let k4 = h * (v + l3);
        let l4 = h * eval(t + h, x + k3, v + l3);

        state.x = x + (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0;
        state.v = v + (l1 + 2.0 * l2 + 2.0 * l3 + l4) / 6.0;
        state.a = a1;
        state.t = round_time(t + h);
    }
}
