//! Dense Levenberg–Marquardt with Marquardt diagonal scaling.

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Parameters controlling the calibration solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Minimum number of views accepted for a solve.
    pub min_views: usize,
    /// Maximum number of LM iterations.
    pub max_iters: usize,
    /// Stop when the relative decrease of the cost falls below this value.
    pub eps: f64,
    /// Initial damping factor (lambda).
    pub lambda_init: f64,
    /// Multiplicative factor to increase/decrease lambda.
    pub lambda_mul: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            min_views: 3,
            max_iters: 200,
            eps: 1e-14,
            lambda_init: 1e-3,
            lambda_mul: 10.0,
        }
    }
}

/// A nonlinear least-squares problem `min ½‖r(x)‖²`.
pub trait LeastSquaresProblem {
    fn num_residuals(&self) -> usize;

    /// Fill `out` with `r(x)`.
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Fill `out` with the Jacobian `∂r/∂x`.
    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>);
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmTermination {
    /// The gradient vanished at the current parameters.
    Stationary,
    /// The relative cost decrease or the step fell below `eps`.
    SmallDecrease,
    /// A nearly undamped step was negligible against the parameters, so the
    /// cost sits at its floating-point floor.
    SmallStep,
    /// No damping up to the limit produced a descent step.
    DampingExhausted,
    MaxIterations,
    /// The cost at the starting point was not finite.
    NonFiniteStart,
}

impl LmTermination {
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Stationary | Self::SmallDecrease | Self::SmallStep)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmReport {
    /// Final sum of squared residuals.
    pub cost: f64,
    pub iterations: usize,
    pub termination: LmTermination,
    /// Stopped at a minimum rather than on a limit or a stall.
    pub converged: bool,
}

impl LmReport {
    fn new(cost: f64, iterations: usize, termination: LmTermination) -> Self {
        Self {
            cost,
            iterations,
            termination,
            converged: termination.is_converged(),
        }
    }
}

const LAMBDA_MAX: f64 = 1e16;

/// Minimise the problem starting from `params`, updated in place.
///
/// Only steps that strictly decrease the cost are accepted, so a non-finite
/// trial cost simply raises the damping.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    params: &mut DVector<f64>,
    opts: &SolverOptions,
) -> LmReport {
    let n = params.len();
    let m = problem.num_residuals();

    let mut residuals = DVector::<f64>::zeros(m);
    let mut trial_residuals = DVector::<f64>::zeros(m);
    let mut jac = DMatrix::<f64>::zeros(m, n);

    problem.residuals(params, &mut residuals);
    let mut cost = residuals.norm_squared();
    let mut lambda = opts.lambda_init;
    let mut iterations = 0usize;
    let mut termination = LmTermination::MaxIterations;

    if !cost.is_finite() {
        return LmReport::new(cost, iterations, LmTermination::NonFiniteStart);
    }

    'outer: while iterations < opts.max_iters {
        iterations += 1;

        problem.jacobian(params, &mut jac);
        let jtj = jac.tr_mul(&jac);
        let neg_grad = -jac.tr_mul(&residuals);

        if neg_grad.amax() < f64::EPSILON * (1.0 + cost) {
            termination = LmTermination::Stationary;
            break;
        }

        // Retry with growing damping until a step lowers the cost.
        let mut first_trial = true;
        loop {
            let mut a = jtj.clone();
            for d in 0..n {
                a[(d, d)] += lambda * jtj[(d, d)].max(1e-12);
            }

            let Some(delta) = a.cholesky().map(|c| c.solve(&neg_grad)) else {
                lambda *= opts.lambda_mul;
                if lambda > LAMBDA_MAX {
                    termination = LmTermination::DampingExhausted;
                    break 'outer;
                }
                continue;
            };

            let candidate = &*params + &delta;
            problem.residuals(&candidate, &mut trial_residuals);
            let new_cost = trial_residuals.norm_squared();

            if new_cost < cost {
                let decrease = cost - new_cost;
                *params = candidate;
                std::mem::swap(&mut residuals, &mut trial_residuals);
                cost = new_cost;
                lambda = (lambda / opts.lambda_mul).max(1e-15);
                debug!("lm iter {iterations}: cost {cost:.6e}, lambda {lambda:.1e}");

                if decrease <= opts.eps * cost.max(f64::MIN_POSITIVE)
                    || delta.norm() <= opts.eps * (params.norm() + opts.eps)
                {
                    termination = LmTermination::SmallDecrease;
                    break 'outer;
                }
                break;
            }

            let tol = opts.eps.sqrt();
            if first_trial && lambda <= 1.0 && delta.norm() <= tol * (params.norm() + tol) {
                termination = LmTermination::SmallStep;
                break 'outer;
            }
            first_trial = false;

            lambda *= opts.lambda_mul;
            if lambda > LAMBDA_MAX {
                termination = LmTermination::DampingExhausted;
                break 'outer;
            }
        }
    }

    LmReport::new(cost, iterations, termination)
}
