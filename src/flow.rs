//! Per-line flow and voltage-drop metrics derived from a solved state.

use crate::network::Network;
use crate::solver::SolvedState;
use crate::ybus::series_admittance_pu;

/// Flow metrics for one line, sending-end convention.
#[derive(Debug, Clone)]
pub struct LineFlow {
    /// Active power entering the line at its "from" bus (MW).
    pub p_from_mw: f64,
    /// Reactive power entering the line at its "from" bus (MVAR).
    pub q_from_mvar: f64,
    /// Voltage magnitude difference from-minus-to (per-unit).
    pub delta_v_pu: f64,
    /// Voltage magnitude difference scaled to nominal volts.
    pub delta_v_volt: f64,
    /// Linear I*R + I*X voltage-drop estimate (volts).
    ///
    /// Diagnostic approximation only: it ignores the nonlinear trigonometric
    /// terms of the AC solution and systematically differs from
    /// `delta_v_volt`. Reported as-is, never reconciled.
    pub v_drop_expected: f64,
}

/// Computes the sending-end flow of one line from solved bus voltages.
///
/// The complex power into the line is `S_from = V_from * conj(I)` with
/// `I = (V_from - V_to) * Y_series`, converted back to MW/MVAR on
/// `base_mva`. Line charging is not part of the series current.
pub fn line_flow(net: &Network, line_index: usize, state: &SolvedState, base_mva: f64) -> LineFlow {
    let line = &net.lines[line_index];
    let vn_kv = net.buses[line.from_bus].vn_kv;

    let v_from = state.voltage(line.from_bus);
    let v_to = state.voltage(line.to_bus);
    let y_series = series_admittance_pu(line, vn_kv, base_mva);

    let i_pu = (v_from - v_to) * y_series;
    let s_pu = v_from * i_pu.conj();
    let p_from_mw = s_pu.re * base_mva;
    let q_from_mvar = s_pu.im * base_mva;

    let vn_volt = vn_kv * 1e3;
    let delta_v_pu = state.vm_pu[line.from_bus] - state.vm_pu[line.to_bus];

    LineFlow {
        p_from_mw,
        q_from_mvar,
        delta_v_pu,
        delta_v_volt: delta_v_pu * vn_volt,
        v_drop_expected: (line.r_ohm() * p_from_mw * 1e6 + line.x_ohm() * q_from_mvar * 1e6)
            / vn_volt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{SolverOptions, solve};

    #[test]
    fn two_bus_flow_covers_load_plus_losses() {
        let net = Network::two_bus();
        let opts = SolverOptions::default();
        let state = solve(&net, &net.net_injections_mw(), &opts).unwrap();
        let flow = line_flow(&net, 0, &state, opts.base_power_mva);

        // Sending end must supply at least the 0.1 MW load, plus I^2 R.
        assert!(flow.p_from_mw > 0.1);
        assert!(flow.p_from_mw < 0.12, "losses implausibly large");
        assert!(flow.q_from_mvar > 0.05);
    }

    #[test]
    fn voltage_difference_consistent_with_state() {
        let net = Network::two_bus();
        let opts = SolverOptions::default();
        let state = solve(&net, &net.net_injections_mw(), &opts).unwrap();
        let flow = line_flow(&net, 0, &state, opts.base_power_mva);

        assert!((flow.delta_v_pu - (state.vm_pu[0] - state.vm_pu[1])).abs() < 1e-15);
        assert!((flow.delta_v_volt - flow.delta_v_pu * 400.0).abs() < 1e-9);
        assert!(flow.delta_v_pu > 0.0, "load bus sits below the slack");
    }

    #[test]
    fn drop_estimate_tracks_exact_difference_loosely() {
        let net = Network::two_bus();
        let opts = SolverOptions::default();
        let state = solve(&net, &net.net_injections_mw(), &opts).unwrap();
        let flow = line_flow(&net, 0, &state, opts.base_power_mva);

        // Same order of magnitude as the exact AC difference; exact
        // agreement is not expected from the linear estimate.
        assert!(flow.v_drop_expected > 0.0);
        assert!(flow.v_drop_expected < 3.0 * flow.delta_v_volt.abs() + 1.0);
    }
}
