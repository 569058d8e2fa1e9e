//! Fixed-step integration runs and the post-processing that prepares a trajectory for
//! plotting.
//!
//! A run is a pure function of its inputs: the simulated clock always starts at `t = 0`,
//! steps `span.end / step_size` times, then the history is windowed to `span.start`
//! and thinned to at most `max_points` samples.
//!
//! Numeric trouble is never an error here. Undefined accelerations become NaN and
//! overflow becomes infinity; both flow into the returned samples for the caller to
//! detect. The only hard guard is the minimum Euler step.

use crate::solvers::{RungeKutta4, SemiImplicitEuler};
use crate::traits::{Acceleration, Steppable};
use crate::types::{History, InitialCondition, Method, State, TimeSpan};
use log::debug;
use serde::{Deserialize, Serialize};

// Up-front reservation only; longer runs grow the history as they go.
const PREALLOCATED_SAMPLES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    /// Upper bound on the number of samples returned after downsampling.
    pub max_points: usize,
    /// Euler runs with a smaller step return an empty history.
    pub min_euler_step: f64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            max_points: 200,
            min_euler_step: 1e-4,
        }
    }
}

enum InternalStepper {
    Euler(SemiImplicitEuler),
    Rk4(RungeKutta4),
}

impl InternalStepper {
    fn build(method: Method) -> Self {
        match method {
            Method::Euler => InternalStepper::Euler(SemiImplicitEuler::new()),
            Method::RungeKutta4 => InternalStepper::Rk4(RungeKutta4::new()),
        }
    }

    fn step(&mut self, accel: &impl Acceleration, state: &mut State, h: f64) {
        match self {
            InternalStepper::Euler(s) => s.step(accel, state, h),
            InternalStepper::Rk4(s) => s.step(accel, state, h),
        }
    }
}

/// Integrates `accel` from `initial` over `span` with default settings.
pub fn integrate(
    accel: &impl Acceleration,
    initial: InitialCondition,
    span: TimeSpan,
    step_size: f64,
    method: Method,
) -> History {
    integrate_with(
        accel,
        initial,
        span,
        step_size,
        method,
        &IntegratorSettings::default(),
    )
}

/// Integrates `accel` from `initial` over `span`.
///
/// Euler emits the initial sample at `t = 0` followed by one sample per step; RK4 emits
/// only the per-step samples. Euler returns nothing when `step_size` is below
/// `settings.min_euler_step`; RK4 has no such guard.
pub fn integrate_with(
    accel: &impl Acceleration,
    initial: InitialCondition,
    span: TimeSpan,
    step_size: f64,
    method: Method,
    settings: &IntegratorSettings,
) -> History {
    if method == Method::Euler && step_size < settings.min_euler_step {
        debug!(
            "Euler step size {} is below the minimum {}; returning an empty history.",
            step_size, settings.min_euler_step
        );
        return History::new();
    }

    let steps = step_count(span.end, step_size);
    let mut state = State::from_initial(initial);
    let mut stepper = InternalStepper::build(method);
    let mut history =
        History::with_capacity(steps.min(PREALLOCATED_SAMPLES).saturating_add(1));

    if method == Method::Euler {
        history.push(state.sample());
    }

    for _ in 0..steps {
        stepper.step(accel, &mut state, step_size);
        history.push(state.sample());
    }

    window_and_downsample(history, span, settings.max_points)
}

/// Number of iterations of a loop that runs while `i < end / step_size`.
///
/// Integral ratios step exactly that many times, fractional ones round up. A ratio that
/// is not finite and positive (zero or negative step, empty span, NaN input) runs no steps,
/// and so does one too large to count in a `usize`.
pub fn step_count(end: f64, step_size: f64) -> usize {
    let ratio = end / step_size;
    if !ratio.is_finite() || ratio <= 0.0 || ratio >= usize::MAX as f64 {
        return 0;
    }
    ratio.ceil() as usize
}

/// Trims leading samples before `span.start`, then keeps every `stride`-th sample when
/// more than `max_points` remain.
///
/// A non-zero start that no sample reaches leaves the history unwindowed.
pub fn window_and_downsample(mut history: History, span: TimeSpan, max_points: usize) -> History {
    if span.start != 0.0 {
        match history.iter().position(|sample| sample.t >= span.start) {
            Some(start_index) => {
                history.drain(..start_index);
            }
            None => debug!(
                "No sample reaches window start {}; keeping all {} samples.",
                span.start,
                history.len()
            ),
        }
    }

    let max_points = max_points.max(1);
    if history.len() > max_points {
        let stride = history.len().div_ceil(max_points);
        debug!(
            "Downsampling {} samples with stride {}.",
            history.len(),
            stride
        );
        history = history
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % stride == 0)
            .map(|(_, sample)| sample)
            .collect();
    }

    history
}
