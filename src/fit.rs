//! Least squares fitting
//!
//! [CurveFit] is a Levenberg-Marquardt solver for models with analytical
//! derivatives, with optional box bounds on the parameters.
//! [linregress] is an ordinary least squares straight line fit.

use nalgebra as na;

#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("x ({0}) and y ({1}) do not have the same length")]
    LengthMismatch(usize, usize),
    #[error("{points} data points are not enough to fit {params} parameters")]
    TooFewPoints { points: usize, params: usize },
    #[error("expected {expected} initial parameters, found {found}")]
    Parameters { expected: usize, found: usize },
    #[error("lower bound {lower} is greater than upper bound {upper}")]
    Bounds { lower: f64, upper: f64 },
    #[error("optimal parameters not found: number of calls to function has reached maxfev = {0}")]
    NotConverged(usize),
    #[error("all x values are identical")]
    Degenerate,
}
type Result<T> = std::result::Result<T, FitError>;

/// A scalar model `f(x; p)` with its gradient with respect to `p`
pub trait Model {
    /// Number of parameters
    fn n_params(&self) -> usize;
    fn value(&self, x: f64, params: &[f64]) -> f64;
    /// Partial derivatives of the model at `x` with respect to each parameter
    fn gradient(&self, x: f64, params: &[f64]) -> Vec<f64>;
}

/// Fitted parameters
#[derive(Debug, Clone)]
pub struct FitResult {
    pub params: Vec<f64>,
    /// One standard deviation errors, the square root of the covariance diagonal
    pub errors: Vec<f64>,
    pub covariance: na::DMatrix<f64>,
    /// Sum of the squared residuals
    pub ssr: f64,
    pub evaluations: usize,
}

/// Levenberg-Marquardt curve fitting
pub struct CurveFit<'a, M: Model> {
    model: &'a M,
    p0: Vec<f64>,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
    max_evaluations: usize,
    tolerance: f64,
}
impl<'a, M: Model> CurveFit<'a, M> {
    /// Creates a new fit starting at `p0`
    pub fn new(model: &'a M, p0: &[f64]) -> Self {
        Self {
            model,
            p0: p0.to_vec(),
            bounds: None,
            max_evaluations: 1000,
            tolerance: 1e-8,
        }
    }
    /// Sets the lower and upper bounds of the parameters
    pub fn bounds(self, lower: &[f64], upper: &[f64]) -> Self {
        Self {
            bounds: Some((lower.to_vec(), upper.to_vec())),
            ..self
        }
    }
    /// Sets the maximum number of model evaluations over the data
    pub fn max_evaluations(self, max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ..self
        }
    }
    /// Sets the relative tolerance on the cost and on the parameters
    pub fn tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    fn project(&self, params: &mut na::DVector<f64>) {
        if let Some((lower, upper)) = &self.bounds {
            params
                .iter_mut()
                .zip(lower.iter().zip(upper))
                .for_each(|(p, (l, u))| *p = p.clamp(*l, *u));
        }
    }
    /// Parameters held at a bound by a gradient pointing out of the box
    fn active(&self, params: &na::DVector<f64>, gradient: &na::DVector<f64>) -> Vec<bool> {
        match &self.bounds {
            Some((lower, upper)) => params
                .iter()
                .zip(gradient.iter())
                .zip(lower.iter().zip(upper))
                .map(|((p, g), (l, u))| (p <= l && *g < 0.) || (p >= u && *g > 0.))
                .collect(),
            None => vec![false; params.len()],
        }
    }
    fn residuals(&self, x: &[f64], y: &[f64], params: &na::DVector<f64>) -> na::DVector<f64> {
        let p = params.as_slice();
        na::DVector::from_iterator(
            x.len(),
            x.iter().zip(y).map(|(&x, &y)| y - self.model.value(x, p)),
        )
    }
    fn jacobian(&self, x: &[f64], params: &na::DVector<f64>) -> na::DMatrix<f64> {
        let p = params.as_slice();
        let n_params = self.model.n_params();
        let mut jacobian = na::DMatrix::<f64>::zeros(x.len(), n_params);
        for (i, &x) in x.iter().enumerate() {
            for (j, g) in self.model.gradient(x, p).into_iter().enumerate().take(n_params) {
                jacobian[(i, j)] = g;
            }
        }
        jacobian
    }

    /// Fits the model to the data `(x, y)`
    pub fn fit(&self, x: &[f64], y: &[f64]) -> Result<FitResult> {
        let n_params = self.model.n_params();
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch(x.len(), y.len()));
        }
        if self.p0.len() != n_params {
            return Err(FitError::Parameters {
                expected: n_params,
                found: self.p0.len(),
            });
        }
        if x.len() < n_params {
            return Err(FitError::TooFewPoints {
                points: x.len(),
                params: n_params,
            });
        }
        if let Some((lower, upper)) = &self.bounds {
            if let Some((&lower, &upper)) = lower.iter().zip(upper).find(|(l, u)| l > u) {
                return Err(FitError::Bounds { lower, upper });
            }
        }

        let mut params = na::DVector::from_column_slice(&self.p0);
        self.project(&mut params);
        let mut residuals = self.residuals(x, y, &params);
        let mut cost = residuals.norm_squared();
        let mut evaluations = 1;
        let mut jacobian = self.jacobian(x, &params);
        let mut damping: Option<f64> = None;

        let converged = loop {
            if evaluations >= self.max_evaluations {
                break false;
            }
            let jtj = jacobian.transpose() * &jacobian;
            let mut gradient = jacobian.transpose() * &residuals;
            // active parameters are frozen, the step only moves the free ones
            let active = self.active(&params, &gradient);
            for (k, _) in active.iter().enumerate().filter(|(_, a)| **a) {
                gradient[k] = 0.;
            }
            if gradient.amax() <= f64::EPSILON * (1. + cost) {
                break true;
            }
            let mu = *damping.get_or_insert_with(|| 1e-3 * jtj.diagonal().max().max(f64::EPSILON));
            let mut damped = jtj.clone();
            for (k, &is_active) in active.iter().enumerate() {
                if is_active {
                    damped.row_mut(k).fill(0.);
                    damped.column_mut(k).fill(0.);
                    damped[(k, k)] = 1.;
                } else {
                    damped[(k, k)] += mu * jtj[(k, k)].max(1e-12);
                }
            }
            let step = match damped.lu().solve(&gradient) {
                Some(step) => step,
                None => {
                    damping = Some(mu * 10.);
                    continue;
                }
            };
            let mut trial = &params + &step;
            self.project(&mut trial);
            let trial_residuals = self.residuals(x, y, &trial);
            let trial_cost = trial_residuals.norm_squared();
            evaluations += 1;

            let step_norm = (&trial - &params).norm();
            let small_step = step_norm <= self.tolerance * (self.tolerance + params.norm());
            if trial_cost < cost {
                let small_decrease = cost - trial_cost <= self.tolerance * cost;
                params = trial;
                residuals = trial_residuals;
                cost = trial_cost;
                jacobian = self.jacobian(x, &params);
                damping = Some(mu / 3.);
                if small_decrease || small_step {
                    break true;
                }
            } else {
                if small_step {
                    break true;
                }
                damping = Some(mu * 2.);
            }
        };
        if !converged {
            return Err(FitError::NotConverged(self.max_evaluations));
        }

        let dof = x.len().saturating_sub(n_params);
        let covariance = match (jacobian.transpose() * &jacobian).try_inverse() {
            Some(inverse) if dof > 0 => inverse * (cost / dof as f64),
            _ => na::DMatrix::from_element(n_params, n_params, f64::INFINITY),
        };
        let errors = covariance.diagonal().iter().map(|v| v.sqrt()).collect();
        Ok(FitResult {
            params: params.as_slice().to_vec(),
            errors,
            covariance,
            ssr: cost,
            evaluations,
        })
    }
}

/// Straight line fit `y = intercept + slope*x`
#[derive(Debug, Clone, Copy)]
pub struct LinearRegression {
    pub slope: f64,
    pub intercept: f64,
    /// Correlation coefficient
    pub r_value: f64,
}

/// Ordinary least squares fit of a straight line
pub fn linregress(x: &[f64], y: &[f64]) -> Result<LinearRegression> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch(x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(FitError::TooFewPoints {
            points: x.len(),
            params: 2,
        });
    }
    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let (sxx, syy, sxy) = x.iter().zip(y).fold((0., 0., 0.), |(sxx, syy, sxy), (x, y)| {
        let (dx, dy) = (x - x_mean, y - y_mean);
        (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
    });
    if sxx == 0. {
        return Err(FitError::Degenerate);
    }
    let slope = sxy / sxx;
    let r_value = if syy == 0. {
        0.
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1., 1.)
    };
    Ok(LinearRegression {
        slope,
        intercept: y_mean - slope * x_mean,
        r_value,
    })
}
