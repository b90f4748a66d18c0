//! Monte-Carlo driver: randomized load perturbation and batch solving.

use std::fmt;

use log::warn;
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StudyConfig;
use crate::flow::line_flow;
use crate::network::{Network, NetworkError};
use crate::solver::{SolveError, solve};

/// One result row: the flow metrics of one line in one run.
#[derive(Debug, Clone)]
pub struct LineMeasurement {
    /// Run index, ascending from 0.
    pub run: usize,
    /// Line name.
    pub line: String,
    /// Sending-end bus index.
    pub from_bus: usize,
    /// Receiving-end bus index.
    pub to_bus: usize,
    /// Active power at the sending end (MW).
    pub p_mw: f64,
    /// Reactive power at the sending end (MVAR).
    pub q_mvar: f64,
    /// Voltage magnitude difference (per-unit).
    pub delta_v_pu: f64,
    /// Voltage magnitude difference (volts).
    pub delta_v_volt: f64,
    /// Linear voltage-drop estimate (volts); diagnostic only.
    pub v_drop_expected: f64,
}

impl fmt::Display for LineMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run={:>3} {:<10} {}->{} | P={:>8.4} MW  Q={:>8.4} MVAR | \
             dV={:>7.4} V (est {:>7.4} V)",
            self.run,
            self.line,
            self.from_bus,
            self.to_bus,
            self.p_mw,
            self.q_mvar,
            self.delta_v_volt,
            self.v_drop_expected,
        )
    }
}

/// Outcome of a whole study: accumulated rows plus the runs that failed.
#[derive(Debug, Clone, Default)]
pub struct StudyOutcome {
    /// All measurements, run-ascending, line order per insertion order.
    pub measurements: Vec<LineMeasurement>,
    /// Runs skipped because the solver failed, with the reason.
    pub skipped_runs: Vec<(usize, SolveError)>,
}

/// Runs the Monte-Carlo study: `n_runs` solves of `net` with independently
/// perturbed loads, collecting per-line measurements.
///
/// The baseline load figures are snapshotted once up front and never written
/// back; every run builds a fresh injection vector from the snapshot and a
/// uniform multiplier per load drawn from the configured range. A run whose
/// solve fails is reported and skipped — it contributes zero rows and the
/// batch continues.
///
/// # Errors
///
/// Returns a [`NetworkError`] for a structurally invalid network, before any
/// run is attempted.
pub fn run_study(net: &Network, cfg: &StudyConfig) -> Result<StudyOutcome, NetworkError> {
    net.validate()?;

    let mut rng = match cfg.study.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let [low, high] = cfg.study.load_perturbation_range;
    let opts = cfg.solver_options();

    // Immutable baseline snapshot: (bus, p_mw, q_mvar) per load.
    let baseline: Vec<(usize, f64, f64)> = net
        .loads
        .iter()
        .map(|l| (l.bus, l.p_mw, l.q_mvar))
        .collect();

    let mut outcome = StudyOutcome::default();
    for run in 0..cfg.study.n_runs {
        let mut injections = vec![Complex::new(0.0, 0.0); net.buses.len()];
        for &(bus, p_mw, q_mvar) in &baseline {
            let mp: f64 = rng.random_range(low..high);
            let mq: f64 = rng.random_range(low..high);
            injections[bus] -= Complex::new(p_mw * mp, q_mvar * mq);
        }

        let state = match solve(net, &injections, &opts) {
            Ok(state) => state,
            Err(e) => {
                warn!("run {run} skipped: {e}");
                outcome.skipped_runs.push((run, e));
                continue;
            }
        };

        for (index, line) in net.lines.iter().enumerate() {
            let flow = line_flow(net, index, &state, opts.base_power_mva);
            outcome.measurements.push(LineMeasurement {
                run,
                line: line.name.clone(),
                from_bus: line.from_bus,
                to_bus: line.to_bus,
                p_mw: flow.p_from_mw,
                q_mvar: flow.q_from_mvar,
                delta_v_pu: flow.delta_v_pu,
                delta_v_volt: flow.delta_v_volt,
                v_drop_expected: flow.v_drop_expected,
            });
        }
    }

    Ok(outcome)
}
