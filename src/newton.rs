use std::time::Instant;

use tracing::debug;

use crate::config::{DEFAULT_TOL, NEWTON_MAX_IT, PowerFlowConfig, Q_CONTROL_THRESHOLD};
use crate::dsbus_dv::ds_bus_dv;
use crate::error::PowerFlowError;
use crate::indices::SimulationIndices;
use crate::jacobian::build_jacobian;
use crate::mismatch::{IterState, compute_scalc};
use crate::model::{PermutedSystem, PowerFlowModel};
use crate::qlim::enforce_q_limits;
use crate::result::PowerFlowResult;
use crate::solver::{Solve, SolverError};

/// Full Newton-Raphson power flow in polar form.
///
/// Linearizes the power-balance residual around the present iterate, solves
/// the sparse correction system and repeats until the mismatch infinity norm
/// drops below `tol` or the iteration cap is reached. Hitting the cap is a
/// normal outcome reported through the result; only malformed input and
/// singular linear systems are errors.
pub fn newton_pf<S: Solve>(
    model: &PowerFlowModel,
    config: &PowerFlowConfig,
    solver: &mut S,
) -> Result<PowerFlowResult, PowerFlowError> {
    model.validate()?;
    let tol = config.tol.unwrap_or(DEFAULT_TOL);
    let max_it = config.max_it.unwrap_or(NEWTON_MAX_IT);
    let start = Instant::now();
    solver.reset();

    let mut bus_types = model.bus_types.clone();
    let mut s0 = model.s0.clone();
    let mut indices = SimulationIndices::from_bus_types(&bus_types)?;

    // Slack-only island: the voltage is fully specified, nothing to solve.
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
    let mut iterations = 0;
    let mut converged = state.norm_f < tol;

    while !converged && iterations < max_it {
        let (ds_dvm, ds_dva) = ds_bus_dv(&sys.ybus, &state.v, &state.v_norm);
        let jac = build_jacobian(&ds_dvm, &ds_dva, sys.npv, sys.n_ext());
        let n = jac.nrows();
        let (mut col_offsets, mut row_indices, mut values) = jac.disassemble();

        let mut dx = state.f.clone();
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

        state.step(&dx, &sys);
        iterations += 1;
        converged = state.norm_f < tol;
        debug!(iterations, norm_f = state.norm_f, "newton-raphson iteration");

        if config.control_q.is_enabled() && sys.npv > 0 && state.norm_f < Q_CONTROL_THRESHOLD {
            let changes = enforce_q_limits(&state.scalc, &sys, &indices, &mut bus_types, &mut s0);
            if changes > 0 {
                // Partition changed: warm-start from the present voltage and
                // rebuild the reordered system and the solver's symbolic
                // factorization around the new structure.
                let v_now = indices.unpermute_vector(&state.v);
                indices = SimulationIndices::from_bus_types(&bus_types)?;
                sys = PermutedSystem::build(model, &s0, &v_now, &indices);
                solver.reset();
                state = IterState::new(&sys);
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
