use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Instantaneous state of the body. `a` is the last acceleration the stepper evaluated;
/// it is informational and never fed back into the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub t: f64,
    pub x: f64,
    pub v: f64,
    pub a: f64,
}

impl State {
    /// State at simulated `t = 0`.
    pub fn from_initial(initial: InitialCondition) -> Self {
        Self {
            t: 0.0,
            x: initial.x,
            v: initial.v,
            a: 0.0,
        }
    }

    pub fn sample(&self) -> Sample {
        Sample {
            t: self.t,
            x: self.x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialCondition {
    pub x: f64,
    pub v: f64,
}

impl InitialCondition {
    pub fn new(x: f64, v: f64) -> Self {
        Self { x, v }
    }
}

/// Display window. The simulation clock always starts at 0; `start` only trims the
/// output after integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// A `(t, x)` point of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Sample {
    pub t: f64,
    pub x: f64,
}

impl From<[f64; 2]> for Sample {
    fn from([t, x]: [f64; 2]) -> Self {
        Self { t, x }
    }
}

impl From<Sample> for [f64; 2] {
    fn from(sample: Sample) -> Self {
        [sample.t, sample.x]
    }
}

/// Ordered samples, strictly increasing in `t`.
pub type History = Vec<Sample>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "rk4")]
    RungeKutta4,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Euler => "euler",
            Method::RungeKutta4 => "rk4",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown solver \"{0}\" (expected \"euler\" or \"rk4\")")]
pub struct MethodParseError(pub String);

impl FromStr for Method {
    type Err = MethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euler" => Ok(Method::Euler),
            "rk4" | "runge-kutta" => Ok(Method::RungeKutta4),
            _ => Err(MethodParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_known_names() {
        assert_eq!("euler".parse::<Method>(), Ok(Method::Euler));
        assert_eq!("RK4".parse::<Method>(), Ok(Method::RungeKutta4));
        assert_eq!(" runge-kutta ".parse::<Method>(), Ok(Method::RungeKutta4));
    }

    #[test]
    fn method_rejects_unknown_names() {
        let err = "tsit5".parse::<Method>().expect_err("expected parse failure");
        assert!(err.to_string().contains("tsit5"));
    }

    #[test]
    fn method_display_round_trips_through_from_str() {
        for method in [Method::Euler, Method::RungeKutta4] {
            assert_eq!(method.to_string().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn state_starts_at_time_zero() {
        let state = State::from_initial(InitialCondition::new(2.0, -1.0));
        assert_eq!(state.t, 0.0);
        assert_eq!(state.sample(), Sample { t: 0.0, x: 2.0 });
    }
}
