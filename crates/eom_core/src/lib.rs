pub mod expression;
pub mod forcing;
pub mod integrator;
pub mod solvers;
/// The `eom_core` crate integrates one-dimensional equations of motion `a = f(t, x, v)`
/// with fixed-step methods and prepares the resulting trajectory for plotting.
///
/// Key components:
/// - **Traits**: `Acceleration` (possibly undefined law of motion), `ForcingTerm`
///   (time-only capability), `Steppable` (solvers), `Scalar` (numeric abstraction).
/// - **Solvers**: semi-implicit Euler and classic RK4.
/// - **Integrator**: `integrate`, plus the shared `window_and_downsample` helper.
/// - **Forcing / Expression**: the linear EOM the front end exposes and a bytecode VM
///   for the user-typed forcing term.
pub mod traits;
pub mod types;

pub use integrator::{integrate, integrate_with, window_and_downsample, IntegratorSettings};
pub use traits::{Acceleration, ForcingTerm, Steppable};
pub use types::{History, InitialCondition, Method, Sample, State, TimeSpan};
