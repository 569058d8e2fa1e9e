//! WASM wrapper around the core integrator.

use anyhow::{Context, Result};
use eom_core::expression::ExpressionForcing;
use eom_core::forcing::{Coefficients, LinearEom};
use eom_core::{
    integrate_with, ForcingTerm, History, InitialCondition, IntegratorSettings, Method, Sample,
    TimeSpan,
};
use js_sys::Float64Array;
use log::warn;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmEomSolver {
    forcing: Option<ExpressionForcing>,
    compile_error: Option<String>,
    coefficients: Coefficients,
    method: Method,
    settings: IntegratorSettings,
}

pub(crate) fn parse_method(solver_name: &str) -> Result<Method> {
    solver_name
        .parse::<Method>()
        .context("Failed to select integration method")
}

/// Compiles the forcing text. A text that does not compile is kept as "no forcing",
/// which makes every acceleration undefined and the plotted history NaN.
pub(crate) fn build_forcing(equation: &str) -> (Option<ExpressionForcing>, Option<String>) {
    match ExpressionForcing::compile(equation) {
        Ok(forcing) => (Some(forcing), None),
        Err(err) => {
            warn!("Forcing expression \"{}\" did not compile: {}", equation, err);
            (None, Some(err.to_string()))
        }
    }
}

pub(crate) fn flatten(history: &[Sample]) -> Vec<f64> {
    history.iter().flat_map(|s| [s.t, s.x]).collect()
}

impl WasmEomSolver {
    pub(crate) fn from_parts(
        equation: &str,
        coefficients: Coefficients,
        solver_name: &str,
    ) -> Result<WasmEomSolver> {
        let method = parse_method(solver_name)?;
        let (forcing, compile_error) = build_forcing(equation);
        Ok(WasmEomSolver {
            forcing,
            compile_error,
            coefficients,
            method,
            settings: IntegratorSettings::default(),
        })
    }

    pub(crate) fn run(&self, x0: f64, v0: f64, start: f64, end: f64, step: f64) -> History {
        let forcing = |t: f64| self.forcing.as_ref().and_then(|f| f.evaluate(t));
        let eom = LinearEom::new(self.coefficients, forcing);
        integrate_with(
            &eom,
            InitialCondition::new(x0, v0),
            TimeSpan::new(start, end),
            step,
            self.method,
            &self.settings,
        )
    }
}

#[wasm_bindgen]
impl WasmEomSolver {
    #[wasm_bindgen(constructor)]
    pub fn new(
        equation: &str,
        x_coef: f64,
        v_coef: f64,
        a_coef: f64,
        solver_name: &str,
    ) -> Result<WasmEomSolver, JsValue> {
        console_error_panic_hook::set_once();

        let coefficients = Coefficients {
            x: x_coef,
            v: v_coef,
            a: a_coef,
        };
        Self::from_parts(equation, coefficients, solver_name)
            .map_err(|e| JsValue::from_str(&format!("{e:#}")))
    }

    /// Message of the last compile failure, if the forcing text did not compile.
    pub fn compile_error(&self) -> Option<String> {
        self.compile_error.clone()
    }

    /// Overrides the integrator settings, e.g. `{ max_points: 500 }`.
    /// Missing fields keep their defaults.
    pub fn set_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        self.settings = from_value(settings)
            .map_err(|e| JsValue::from_str(&format!("Invalid settings: {e}")))?;
        Ok(())
    }

    pub fn method(&self) -> String {
        self.method.to_string()
    }

    /// Runs the integrator and returns `[t0, x0, t1, x1, ...]`.
    pub fn solve(&self, x0: f64, v0: f64, start: f64, end: f64, step: f64) -> Float64Array {
        let history = self.run(x0, v0, start, end, step);
        Float64Array::from(flatten(&history).as_slice())
    }

    /// Runs the integrator and returns an array of `[t, x]` pairs.
    pub fn solve_samples(
        &self,
        x0: f64,
        v0: f64,
        start: f64,
        end: f64,
        step: f64,
    ) -> Result<JsValue, JsValue> {
        let history = self.run(x0, v0, start, end, step);
        to_value(&history).map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }
}
