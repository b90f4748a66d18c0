//! Bus admittance matrix construction.

use nalgebra::DMatrix;
use num_complex::Complex;

use crate::network::{Line, Network, NetworkError};

/// System frequency for shunt susceptance (Hz).
pub const FREQUENCY_HZ: f64 = 50.0;

/// Series admittance of a line in per-unit on the given base power and the
/// line's nominal voltage. Zero-impedance lines contribute nothing.
pub(crate) fn series_admittance_pu(line: &Line, vn_kv: f64, base_mva: f64) -> Complex<f64> {
    let z_base_ohm = vn_kv * vn_kv / base_mva;
    let z_pu = Complex::new(line.r_ohm(), line.x_ohm()) / z_base_ohm;
    if z_pu.norm_sqr() == 0.0 {
        Complex::new(0.0, 0.0)
    } else {
        z_pu.inv()
    }
}

/// Builds the bus admittance matrix in per-unit on `base_mva`.
///
/// `Y[i][i]` sums the series admittances of all lines touching bus `i` plus
/// half of each such line's shunt susceptance; `Y[i][j]` is the negated sum
/// of series admittances of lines between `i` and `j` (parallel lines sum
/// before negation, which the `+=` accumulation takes care of).
///
/// # Errors
///
/// Returns [`NetworkError::NoBuses`] for an empty network and
/// [`NetworkError::UnknownBus`] if a line references a nonexistent bus.
pub fn build_ybus(net: &Network, base_mva: f64) -> Result<DMatrix<Complex<f64>>, NetworkError> {
    let n = net.buses.len();
    if n == 0 {
        return Err(NetworkError::NoBuses);
    }

    let mut y = DMatrix::from_element(n, n, Complex::new(0.0, 0.0));
    for line in &net.lines {
        for bus in [line.from_bus, line.to_bus] {
            if bus >= n {
                return Err(NetworkError::UnknownBus {
                    element: format!("line \"{}\"", line.name),
                    bus,
                });
            }
        }

        let vn_kv = net.buses[line.from_bus].vn_kv;
        let y_series = series_admittance_pu(line, vn_kv, base_mva);

        // Half the total line charging at each end, converted to per-unit
        // susceptance (b_pu = omega * C * Z_base).
        let c_farad = line.c_nf_per_km * line.length_km * 1e-9;
        let z_base_ohm = vn_kv * vn_kv / base_mva;
        let b_shunt_pu = 2.0 * std::f64::consts::PI * FREQUENCY_HZ * c_farad * z_base_ohm;
        let y_shunt_half = Complex::new(0.0, b_shunt_pu / 2.0);

        let (f, t) = (line.from_bus, line.to_bus);
        y[(f, f)] += y_series + y_shunt_half;
        y[(t, t)] += y_series + y_shunt_half;
        y[(f, t)] -= y_series;
        y[(t, f)] -= y_series;
    }
    Ok(y)
}
