use nalgebra::DVector;
use num_complex::Complex64;
use tracing::debug;

use crate::indices::SimulationIndices;
use crate::model::{BusType, PermutedSystem};

/// Converts PV buses whose calculated reactive power violates their limits
/// into PQ buses with the reactive injection pinned at the violated limit.
///
/// `scalc` is in permuted order (PV buses occupy positions `0..npv`);
/// `bus_types` and `s0` are in original order and are the values the caller
/// rebuilds the permuted system from. Returns the number of retyped buses.
///
/// The conversion is deliberately one-way: a retyped bus stays PQ for the
/// rest of the solve. Releasing it back to PV when the violation clears
/// makes the iteration oscillate.
pub(crate) fn enforce_q_limits(
    scalc: &DVector<Complex64>,
    sys: &PermutedSystem,
    indices: &SimulationIndices,
    bus_types: &mut [BusType],
    s0: &mut DVector<Complex64>,
) -> usize {
    let mut changes = 0;
    for k in 0..sys.npv {
        let q = scalc[k].im;
        let pinned = if q > sys.qmax[k] {
            sys.qmax[k]
        } else if q < sys.qmin[k] {
            sys.qmin[k]
        } else {
            continue;
        };
        let bus = indices.original_index(k);
        s0[bus] = Complex64::new(s0[bus].re, pinned);
        bus_types[bus] = BusType::Pq;
        changes += 1;
        debug!(bus, q, pinned, "reactive limit violated, pv bus retyped to pq");
    }
    changes
}
