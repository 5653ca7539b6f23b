use std::time::Instant;

use nalgebra_sparse::CscMatrix;
use tracing::trace;

use crate::config::{DEFAULT_TOL, LM_MAX_IT, PowerFlowConfig, Q_CONTROL_THRESHOLD};
use crate::dsbus_dv::ds_bus_dv;
use crate::error::PowerFlowError;
use crate::indices::SimulationIndices;
use crate::jacobian::build_jacobian;
use crate::mismatch::{IterState, compute_scalc};
use crate::model::{PermutedSystem, PowerFlowModel};
use crate::qlim::enforce_q_limits;
use crate::result::PowerFlowResult;
use crate::solver::{Solve, SolverError};

/// Levenberg-Marquardt power flow.
///
/// Minimizes `f(x) = ½‖F(x)‖²` with damped normal-equations steps
/// `(JᵗJ + λI)·dx = Jᵗ·F`. The damping parameter follows the classic
/// gain-ratio rule: accepted steps shrink `λ` and mark the Jacobian stale,
/// rejected steps leave the iterate untouched, grow `λ` and reuse the stale
/// Jacobian, since a rejection signals a damping problem rather than a
/// linearization problem. Usually more robust than plain Newton-Raphson on
/// stressed or ill-conditioned networks, at roughly an order of magnitude
/// more work per run.
pub fn levenberg_marquardt_pf<S: Solve>(
    model: &PowerFlowModel,
    config: &PowerFlowConfig,
    solver: &mut S,
) -> Result<PowerFlowResult, PowerFlowError> {
    model.validate()?;
    let tol = config.tol.unwrap_or(DEFAULT_TOL);
    let max_it = config.max_it.unwrap_or(LM_MAX_IT);
    let start = Instant::now();
    solver.reset();

    let mut bus_types = model.bus_types.clone();
    let mut s0 = model.s0.clone();
    let mut indices = SimulationIndices::from_bus_types(&bus_types)?;

    if indices.n_free() == 0 {
        return Ok(PowerFlowResult {
            s_calc: compute_scalc(&model.ybus, &model.v0),
            v: model.v0.clone(),
            converged: true,
            norm_f: 0.0,
            iterations: 0,
            elapsed: start.elapsed().as_secs_f64(),
            bus_types,
        });
    }

    let mut sys = PermutedSystem::build(model, &s0, &model.v0, &indices);
    let mut state = IterState::new(&sys);
    let mut idn = CscMatrix::<f64>::identity(sys.n_free() + sys.npq);

    let mut jac: Option<CscMatrix<f64>> = None;
    let mut update_jacobian = true;
    let mut seed_lambda = true;
    let mut lambda = 0.0;
    let mut nu = 2.0;
    let mut f_prev = f64::MAX;

    let mut iterations = 0;
    let mut converged = state.norm_f < tol;

    while !converged && iterations < max_it {
        if update_jacobian {
            let (ds_dvm, ds_dva) = ds_bus_dv(&sys.ybus, &state.v, &state.v_norm);
            jac = Some(build_jacobian(&ds_dvm, &ds_dva, sys.npv, sys.n_ext()));
        }
        let j = jac.as_ref().expect("jacobian is built on the first iteration");
        let jt = j.transpose();
        let h = &jt * j;
        if seed_lambda {
            lambda = 1e-3 * diag_max(&h);
            seed_lambda = false;
        }

        // A = JᵗJ + λI
        let mut damping = idn.clone();
        for val in damping.values_mut() {
            *val = lambda;
        }
        let a = &h + &damping;
        let rhs = &jt * &state.f;

        let n = a.nrows();
        let (mut col_offsets, mut row_indices, mut values) = a.disassemble();
        let mut dx = rhs.clone();
        solver
            .solve(
                &mut col_offsets,
                &mut row_indices,
                &mut values,
                dx.as_mut_slice(),
                n,
            )
            .map_err(|source| PowerFlowError::SingularSystem {
                iteration: iterations,
                source,
            })?;
        if dx.iter().any(|x| !x.is_finite()) {
            return Err(PowerFlowError::SingularSystem {
                iteration: iterations,
                source: SolverError::NonFinite,
            });
        }

        let objective = 0.5 * state.f.dot(&state.f);
        let gain_den = dx.dot(&(&dx * lambda + &rhs));
        let rho = if gain_den > 0.0 {
            (f_prev - objective) / (0.5 * gain_den)
        } else {
            -1.0
        };

        let accepted;
        (lambda, nu, accepted) = damping_update(rho, lambda, nu);
        update_jacobian = accepted;
        if accepted {
            state.step(&dx, &sys);
        }
        trace!(
            iterations,
            lambda,
            nu,
            rho,
            accepted,
            norm_f = state.norm_f,
            "levenberg-marquardt iteration"
        );

        converged = state.norm_f < tol;
        f_prev = objective;
        iterations += 1;

        // Reactive limits only make sense with PV buses left, and only once
        // the solution is roughly settled.
        if config.control_q.is_enabled() && sys.npv > 0 && state.norm_f < Q_CONTROL_THRESHOLD {
            let changes = enforce_q_limits(&state.scalc, &sys, &indices, &mut bus_types, &mut s0);
            if changes > 0 {
                let v_now = indices.unpermute_vector(&state.v);
                indices = SimulationIndices::from_bus_types(&bus_types)?;
                sys = PermutedSystem::build(model, &s0, &v_now, &indices);
                solver.reset();
                state = IterState::new(&sys);
                idn = CscMatrix::identity(sys.n_free() + sys.npq);
                jac = None;
                update_jacobian = true;
                seed_lambda = true;
                nu = 2.0;
                f_prev = f64::MAX;
                converged = state.norm_f < tol;
            }
        }
    }

    Ok(PowerFlowResult {
        v: indices.unpermute_vector(&state.v),
        converged,
        norm_f: state.norm_f,
        s_calc: indices.unpermute_vector(&state.scalc),
        iterations,
        elapsed: start.elapsed().as_secs_f64(),
        bus_types,
    })
}

fn diag_max(h: &CscMatrix<f64>) -> f64 {
    let mut dmax = 0.0;
    for (r, c, v) in h.triplet_iter() {
        if r == c && *v > dmax {
            dmax = *v;
        }
    }
    dmax
}

/// Gain-ratio damping update. A step is accepted exactly when `rho >= 0`,
/// which given a positive predicted reduction means the objective did not
/// increase; acceptance rescales the damping by the cubic rule (down to a
/// floor of 1/3 for a perfect gain ratio) and resets the growth factor,
/// rejection multiplies the damping up geometrically.
fn damping_update(rho: f64, lambda: f64, nu: f64) -> (f64, f64, bool) {
    if rho >= 0.0 {
        let shrink = (1.0f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
        (lambda * shrink, 2.0, true)
    } else {
        (lambda * nu, nu * 2.0, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_step_shrinks_damping() {
        let (lambda, nu, accepted) = damping_update(1.0, 3.0, 8.0);
        assert!(accepted);
        assert_eq!(nu, 2.0);
        // rho = 1 gives the maximum shrink factor of 1/3
        assert!((lambda - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_step_grows_damping_geometrically() {
        let (lambda, nu, accepted) = damping_update(-0.5, 3.0, 2.0);
        assert!(!accepted);
        assert_eq!(lambda, 6.0);
        assert_eq!(nu, 4.0);
    }

    #[test]
    fn neutral_step_is_accepted_but_damps_harder() {
        // rho = 0 means the objective stayed put: the step is still taken,
        // and the cubic rule doubles the damping for the next attempt.
        let (lambda, nu, accepted) = damping_update(0.0, 3.0, 8.0);
        assert!(accepted);
        assert_eq!(lambda, 6.0);
        assert_eq!(nu, 2.0);
    }
}
