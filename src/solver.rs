//! Newton-Raphson AC power-flow solver.
//!
//! Solves the polar power-balance equations
//! `P_i = V_i * sum_k V_k * (G_ik cos(t_ik) + B_ik sin(t_ik))` and
//! `Q_i = V_i * sum_k V_k * (G_ik sin(t_ik) - B_ik cos(t_ik))`
//! for every non-slack bus, with the slack bus held at its voltage setpoint
//! and angle 0. All non-slack buses are PQ in this scope.

use std::fmt;

use log::debug;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;

use crate::network::{Network, NetworkError};
use crate::ybus::build_ybus;

/// Tunable solver parameters.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Convergence tolerance on the worst power mismatch (per-unit).
    pub tolerance: f64,
    /// Maximum Newton-Raphson iterations before giving up.
    pub max_iterations: usize,
    /// Base power for the per-unit system (MVA).
    pub base_power_mva: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 10,
            base_power_mva: 100.0,
        }
    }
}

/// Solved bus voltages for one power-flow run.
#[derive(Debug, Clone)]
pub struct SolvedState {
    /// Voltage magnitude per bus (per-unit of nominal).
    pub vm_pu: Vec<f64>,
    /// Voltage angle per bus (degrees).
    pub va_degree: Vec<f64>,
    /// Iterations taken to converge.
    pub iterations: usize,
}

impl SolvedState {
    /// Complex voltage of a bus (per-unit).
    pub fn voltage(&self, bus: usize) -> Complex<f64> {
        Complex::from_polar(self.vm_pu[bus], self.va_degree[bus].to_radians())
    }
}

/// Failure modes of a power-flow solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The network description is structurally invalid.
    Network(NetworkError),
    /// Newton-Raphson did not converge within the iteration cap.
    Diverged {
        /// Iterations performed.
        iterations: usize,
        /// Worst remaining power mismatch (per-unit).
        max_mismatch: f64,
    },
    /// The Jacobian is singular, typically an isolated bus with no path to
    /// the slack.
    SingularJacobian {
        /// The offending bus.
        bus: usize,
    },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Network(e) => write!(f, "{e}"),
            SolveError::Diverged {
                iterations,
                max_mismatch,
            } => write!(
                f,
                "solver error: no convergence after {iterations} iterations \
                 (worst mismatch {max_mismatch:.3e} pu)"
            ),
            SolveError::SingularJacobian { bus } => {
                write!(f, "solver error: singular Jacobian at bus {bus}")
            }
        }
    }
}

impl std::error::Error for SolveError {}

impl From<NetworkError> for SolveError {
    fn from(e: NetworkError) -> Self {
        SolveError::Network(e)
    }
}

/// Runs a Newton-Raphson power flow.
///
/// `injections_mw` is the net complex injection (generation minus load) per
/// bus in MW/MVAR, converted internally to per-unit on the configured base.
/// The slack bus entry is ignored; the slack absorbs the imbalance. Pure
/// function of its inputs: the network is never mutated.
///
/// # Errors
///
/// [`SolveError::Network`] for structural problems, [`SolveError::Diverged`]
/// after `max_iterations` without meeting the tolerance, and
/// [`SolveError::SingularJacobian`] when the linear step has no solution.
///
/// # Panics
///
/// Panics if `injections_mw.len()` differs from the bus count.
pub fn solve(
    net: &Network,
    injections_mw: &[Complex<f64>],
    opts: &SolverOptions,
) -> Result<SolvedState, SolveError> {
    net.validate()?;
    let n = net.buses.len();
    assert_eq!(
        injections_mw.len(),
        n,
        "one injection entry per bus required"
    );

    let y = build_ybus(net, opts.base_power_mva)?;
    let slack = net.ext_grids[0].bus;
    let pq: Vec<usize> = (0..n).filter(|&i| i != slack).collect();
    let m = pq.len();

    // Scheduled injections in per-unit.
    let s_sched: Vec<Complex<f64>> = injections_mw
        .iter()
        .map(|s| s / opts.base_power_mva)
        .collect();

    // Flat start: 1.0 pu, 0 rad everywhere except the slack setpoint.
    let mut vm = vec![1.0; n];
    let mut va = vec![0.0; n];
    vm[slack] = net.ext_grids[0].vm_pu;

    if m == 0 {
        return Ok(SolvedState {
            vm_pu: vm,
            va_degree: va,
            iterations: 0,
        });
    }

    let mut p_calc = vec![0.0; n];
    let mut q_calc = vec![0.0; n];
    let mut max_mismatch = f64::INFINITY;

    for iteration in 0..=opts.max_iterations {
        // Calculated injections at the current state.
        for i in 0..n {
            let mut sum_p = 0.0;
            let mut sum_q = 0.0;
            for k in 0..n {
                let y_ik = y[(i, k)];
                let t_ik = va[i] - va[k];
                sum_p += vm[k] * (y_ik.re * t_ik.cos() + y_ik.im * t_ik.sin());
                sum_q += vm[k] * (y_ik.re * t_ik.sin() - y_ik.im * t_ik.cos());
            }
            p_calc[i] = vm[i] * sum_p;
            q_calc[i] = vm[i] * sum_q;
        }

        // Mismatch: scheduled minus calculated, P block then Q block.
        let mut rhs = DVector::zeros(2 * m);
        for (a, &i) in pq.iter().enumerate() {
            rhs[a] = s_sched[i].re - p_calc[i];
            rhs[m + a] = s_sched[i].im - q_calc[i];
        }
        max_mismatch = rhs.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        debug!("iteration {iteration}: worst mismatch {max_mismatch:.3e} pu");

        if max_mismatch < opts.tolerance {
            return Ok(SolvedState {
                vm_pu: vm,
                va_degree: va.iter().map(|a| a.to_degrees()).collect(),
                iterations: iteration,
            });
        }
        if iteration == opts.max_iterations {
            break;
        }

        // Jacobian [[dP/dt, V*dP/dV], [dQ/dt, V*dQ/dV]] in the dV/V state.
        let mut jac = DMatrix::zeros(2 * m, 2 * m);
        for (a, &i) in pq.iter().enumerate() {
            for (b, &k) in pq.iter().enumerate() {
                let y_ik = y[(i, k)];
                let (g, bb) = (y_ik.re, y_ik.im);
                if i == k {
                    jac[(a, b)] = -q_calc[i] - bb * vm[i] * vm[i];
                    jac[(a, m + b)] = p_calc[i] + g * vm[i] * vm[i];
                    jac[(m + a, b)] = p_calc[i] - g * vm[i] * vm[i];
                    jac[(m + a, m + b)] = q_calc[i] - bb * vm[i] * vm[i];
                } else {
                    let t_ik = va[i] - va[k];
                    let vv = vm[i] * vm[k];
                    let h = vv * (g * t_ik.sin() - bb * t_ik.cos());
                    let nn = vv * (g * t_ik.cos() + bb * t_ik.sin());
                    jac[(a, b)] = h;
                    jac[(a, m + b)] = nn;
                    jac[(m + a, b)] = -nn;
                    jac[(m + a, m + b)] = h;
                }
            }
        }

        let delta = jac.lu().solve(&rhs).ok_or_else(|| {
            SolveError::SingularJacobian {
                bus: isolated_bus(&y, &pq),
            }
        })?;

        for (a, &i) in pq.iter().enumerate() {
            va[i] += delta[a];
            vm[i] *= 1.0 + delta[m + a];
        }
    }

    Err(SolveError::Diverged {
        iterations: opts.max_iterations,
        max_mismatch,
    })
}

/// Best guess at the bus responsible for a singular Jacobian: a non-slack
/// bus with zero self-admittance has no path to the slack.
fn isolated_bus(y: &DMatrix<Complex<f64>>, pq: &[usize]) -> usize {
    pq.iter()
        .copied()
        .find(|&i| y[(i, i)].norm() == 0.0)
        .unwrap_or(pq[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_bus_matches_linear_drop_approximation() {
        // For a short line and small load, V_to ~ 1 - (R*P + X*Q)/V_from
        // in per-unit. The exact AC solution sits within a few mV of it.
        let net = Network::two_bus();
        let opts = SolverOptions::default();
        let state = solve(&net, &net.net_injections_mw(), &opts).unwrap();

        let z_base = 0.4 * 0.4 / opts.base_power_mva;
        let (r_pu, x_pu) = (0.064 / z_base, 0.008 / z_base);
        let (p_pu, q_pu) = (0.1 / opts.base_power_mva, 0.05 / opts.base_power_mva);
        let v_linear = 1.0 - (r_pu * p_pu + x_pu * q_pu);

        assert!((state.vm_pu[0] - 1.0).abs() < 1e-12, "slack held at setpoint");
        assert!(
            (state.vm_pu[1] - v_linear).abs() < 5e-3,
            "got {} expected about {}",
            state.vm_pu[1],
            v_linear
        );
    }

    #[test]
    fn solving_twice_is_idempotent() {
        let net = Network::five_bus_ring();
        let opts = SolverOptions::default();
        let inj = net.net_injections_mw();
        let a = solve(&net, &inj, &opts).unwrap();
        let b = solve(&net, &inj, &opts).unwrap();
        assert_eq!(a.vm_pu, b.vm_pu);
        assert_eq!(a.va_degree, b.va_degree);
    }

    #[test]
    fn more_load_means_lower_voltage() {
        let mut net = Network::two_bus();
        let opts = SolverOptions::default();
        let base = solve(&net, &net.net_injections_mw(), &opts).unwrap();

        net.loads[0].p_mw *= 1.5;
        let heavier = solve(&net, &net.net_injections_mw(), &opts).unwrap();
        assert!(
            heavier.vm_pu[1] < base.vm_pu[1],
            "raising active load must strictly lower the bus voltage"
        );
    }

    #[test]
    fn five_bus_ring_converges_within_default_cap() {
        let net = Network::five_bus_ring();
        let opts = SolverOptions::default();
        let state = solve(&net, &net.net_injections_mw(), &opts).unwrap();
        assert!(state.iterations <= opts.max_iterations);
        for (bus, vm) in state.vm_pu.iter().enumerate() {
            assert!(
                (0.9..=1.0).contains(vm),
                "bus {bus} voltage {vm} outside LV band"
            );
        }
    }

    #[test]
    fn unreachable_tolerance_reports_divergence() {
        let net = Network::two_bus();
        let opts = SolverOptions {
            tolerance: 0.0,
            ..SolverOptions::default()
        };
        let err = solve(&net, &net.net_injections_mw(), &opts).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Diverged { iterations: 10, .. }
        ));
    }

    #[test]
    fn isolated_bus_reports_singular_jacobian() {
        let mut net = Network::two_bus();
        let b3 = net.create_bus(0.4, "Bus 3"); // no line to anywhere
        net.create_load(b3, 0.01, 0.0, "Stranded load");
        let err = solve(&net, &net.net_injections_mw(), &SolverOptions::default()).unwrap_err();
        assert_eq!(err, SolveError::SingularJacobian { bus: b3 });
    }

    #[test]
    fn invalid_network_rejected_before_solving() {
        let mut net = Network::two_bus();
        net.create_ext_grid(1, 1.0, "Second slack");
        let inj = net.net_injections_mw();
        let err = solve(&net, &inj, &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, SolveError::Network(_)));
    }

    #[test]
    fn slack_setpoint_respected() {
        let mut net = Network::two_bus();
        net.ext_grids[0].vm_pu = 1.02;
        let state = solve(&net, &net.net_injections_mw(), &SolverOptions::default()).unwrap();
        assert!((state.vm_pu[0] - 1.02).abs() < 1e-12);
        assert_eq!(state.va_degree[0], 0.0);
    }
}
