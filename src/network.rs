//! Network data model: buses, lines, loads, and the slack source.

use std::fmt;

use num_complex::Complex;

/// Role of a bus in the power-flow problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// Reference bus with fixed voltage magnitude and angle.
    Slack,
    /// Bus with fixed net active/reactive power injection.
    Pq,
}

/// A network node at a fixed nominal voltage level.
#[derive(Debug, Clone)]
pub struct Bus {
    /// Nominal voltage (kV).
    pub vn_kv: f64,
    /// Display name.
    pub name: String,
}

/// A branch between two buses with distributed line parameters.
#[derive(Debug, Clone)]
pub struct Line {
    /// Index of the sending-end bus.
    pub from_bus: usize,
    /// Index of the receiving-end bus.
    pub to_bus: usize,
    /// Line length (km).
    pub length_km: f64,
    /// Series resistance per unit length (ohm/km).
    pub r_ohm_per_km: f64,
    /// Series reactance per unit length (ohm/km).
    pub x_ohm_per_km: f64,
    /// Shunt capacitance per unit length (nF/km); zero for short LV cables.
    pub c_nf_per_km: f64,
    /// Thermal current limit (kA).
    pub max_i_ka: f64,
    /// Display name.
    pub name: String,
}

impl Line {
    /// Total series resistance (ohm).
    pub fn r_ohm(&self) -> f64 {
        self.r_ohm_per_km * self.length_km
    }

    /// Total series reactance (ohm).
    pub fn x_ohm(&self) -> f64 {
        self.x_ohm_per_km * self.length_km
    }
}

/// A constant-power (PQ) load attached to a bus. Draws are positive.
#[derive(Debug, Clone)]
pub struct Load {
    /// Index of the bus the load is attached to.
    pub bus: usize,
    /// Active power draw (MW).
    pub p_mw: f64,
    /// Reactive power draw (MVAR).
    pub q_mvar: f64,
    /// Display name.
    pub name: String,
}

/// External grid connection: the single slack source.
#[derive(Debug, Clone)]
pub struct ExtGrid {
    /// Index of the slack bus.
    pub bus: usize,
    /// Voltage magnitude setpoint (per-unit). Reference angle is 0.
    pub vm_pu: f64,
    /// Display name.
    pub name: String,
}

/// Structural problem in a network description.
///
/// All variants are fatal and reported before any solve attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// The network has no buses at all.
    NoBuses,
    /// No external grid (slack source) was defined.
    MissingSlack,
    /// More than one external grid was defined.
    MultipleSlack {
        /// Number of external grids found.
        count: usize,
    },
    /// An element references a bus index that does not exist.
    UnknownBus {
        /// Description of the offending element, e.g. `line "Line 1-2"`.
        element: String,
        /// The dangling bus index.
        bus: usize,
    },
    /// A line connects a bus to itself.
    SelfLoop {
        /// Name of the offending line.
        line: String,
    },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::NoBuses => write!(f, "network error: network has no buses"),
            NetworkError::MissingSlack => {
                write!(f, "network error: no external grid (slack source) defined")
            }
            NetworkError::MultipleSlack { count } => write!(
                f,
                "network error: {count} external grids defined, exactly one slack is required"
            ),
            NetworkError::UnknownBus { element, bus } => {
                write!(f, "network error: {element} references unknown bus {bus}")
            }
            NetworkError::SelfLoop { line } => {
                write!(f, "network error: line \"{line}\" connects a bus to itself")
            }
        }
    }
}

impl std::error::Error for NetworkError {}

/// An in-memory low-voltage network.
///
/// The network exclusively owns its buses, lines, loads, and the external
/// grid specification. Elements are created through the `create_*` methods,
/// which hand back the element index; structural invariants are checked by
/// [`Network::validate`] rather than at insertion time, so a network can be
/// assembled in any order.
#[derive(Debug, Clone, Default)]
pub struct Network {
    /// All buses, indexed by creation order.
    pub buses: Vec<Bus>,
    /// All lines, indexed by creation order.
    pub lines: Vec<Line>,
    /// All loads. Multiple loads on the same bus sum their injections.
    pub loads: Vec<Load>,
    /// External grid connections. A valid network has exactly one.
    pub ext_grids: Vec<ExtGrid>,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bus and returns its index.
    pub fn create_bus(&mut self, vn_kv: f64, name: &str) -> usize {
        self.buses.push(Bus {
            vn_kv,
            name: name.to_string(),
        });
        self.buses.len() - 1
    }

    /// Adds a line from distributed parameters and returns its index.
    #[allow(clippy::too_many_arguments)]
    pub fn create_line_from_parameters(
        &mut self,
        from_bus: usize,
        to_bus: usize,
        length_km: f64,
        r_ohm_per_km: f64,
        x_ohm_per_km: f64,
        c_nf_per_km: f64,
        max_i_ka: f64,
        name: &str,
    ) -> usize {
        self.lines.push(Line {
            from_bus,
            to_bus,
            length_km,
            r_ohm_per_km,
            x_ohm_per_km,
            c_nf_per_km,
            max_i_ka,
            name: name.to_string(),
        });
        self.lines.len() - 1
    }

    /// Adds a constant-power load and returns its index.
    pub fn create_load(&mut self, bus: usize, p_mw: f64, q_mvar: f64, name: &str) -> usize {
        self.loads.push(Load {
            bus,
            p_mw,
            q_mvar,
            name: name.to_string(),
        });
        self.loads.len() - 1
    }

    /// Adds an external grid (slack source) at the given bus.
    pub fn create_ext_grid(&mut self, bus: usize, vm_pu: f64, name: &str) {
        self.ext_grids.push(ExtGrid {
            bus,
            vm_pu,
            name: name.to_string(),
        });
    }

    /// The single slack specification, if exactly one external grid exists.
    pub fn slack(&self) -> Option<&ExtGrid> {
        if self.ext_grids.len() == 1 {
            self.ext_grids.first()
        } else {
            None
        }
    }

    /// Role of a bus, derived from the external grid attachment.
    pub fn bus_type(&self, bus: usize) -> BusType {
        match self.slack() {
            Some(eg) if eg.bus == bus => BusType::Slack,
            _ => BusType::Pq,
        }
    }

    /// Checks all structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`NetworkError`] found: empty bus set, missing or
    /// duplicate slack, dangling bus references, or self-loop lines.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.buses.is_empty() {
            return Err(NetworkError::NoBuses);
        }
        match self.ext_grids.len() {
            0 => return Err(NetworkError::MissingSlack),
            1 => {}
            count => return Err(NetworkError::MultipleSlack { count }),
        }
        let n = self.buses.len();
        let eg = &self.ext_grids[0];
        if eg.bus >= n {
            return Err(NetworkError::UnknownBus {
                element: format!("ext_grid \"{}\"", eg.name),
                bus: eg.bus,
            });
        }
        for line in &self.lines {
            for bus in [line.from_bus, line.to_bus] {
                if bus >= n {
                    return Err(NetworkError::UnknownBus {
                        element: format!("line \"{}\"", line.name),
                        bus,
                    });
                }
            }
            if line.from_bus == line.to_bus {
                return Err(NetworkError::SelfLoop {
                    line: line.name.clone(),
                });
            }
        }
        for load in &self.loads {
            if load.bus >= n {
                return Err(NetworkError::UnknownBus {
                    element: format!("load \"{}\"", load.name),
                    bus: load.bus,
                });
            }
        }
        Ok(())
    }

    /// Net complex power injection per bus (MW + j·MVAR), generation minus
    /// load. With no generators in scope, this is the negated load sum.
    pub fn net_injections_mw(&self) -> Vec<Complex<f64>> {
        let mut injections = vec![Complex::new(0.0, 0.0); self.buses.len()];
        for load in &self.loads {
            if load.bus < injections.len() {
                injections[load.bus] -= Complex::new(load.p_mw, load.q_mvar);
            }
        }
        injections
    }

    /// Available built-in network names for [`Network::from_preset`].
    pub const PRESETS: &[&str] = &["five_bus_ring", "two_bus"];

    /// Looks up a built-in study network by name.
    pub fn from_preset(name: &str) -> Option<Network> {
        match name {
            "five_bus_ring" => Some(Self::five_bus_ring()),
            "two_bus" => Some(Self::two_bus()),
            _ => None,
        }
    }

    /// The 0.4 kV five-bus ring study network: slack at bus 0, loads at
    /// buses 1-4, five lines closing the ring.
    pub fn five_bus_ring() -> Network {
        let mut net = Network::new();
        let b1 = net.create_bus(0.4, "Bus 1");
        let b2 = net.create_bus(0.4, "Bus 2");
        let b3 = net.create_bus(0.4, "Bus 3");
        let b4 = net.create_bus(0.4, "Bus 4");
        let b5 = net.create_bus(0.4, "Bus 5");

        net.create_ext_grid(b1, 1.0, "Slack");

        net.create_load(b2, 0.020, 0.005, "Load 2");
        net.create_load(b3, 0.030, 0.010, "Load 3");
        net.create_load(b4, 0.010, 0.003, "Load 4");
        net.create_load(b5, 0.015, 0.004, "Load 5");

        net.create_line_from_parameters(b1, b2, 0.1, 0.4, 0.1, 0.0, 0.2, "Line 1-2");
        net.create_line_from_parameters(b2, b3, 0.15, 0.35, 0.09, 0.0, 0.2, "Line 2-3");
        net.create_line_from_parameters(b3, b4, 0.1, 0.38, 0.1, 0.0, 0.2, "Line 3-4");
        net.create_line_from_parameters(b4, b5, 0.08, 0.42, 0.11, 0.0, 0.2, "Line 4-5");
        net.create_line_from_parameters(b5, b1, 0.12, 0.36, 0.095, 0.0, 0.2, "Line 5-1");
        net
    }

    /// Minimal 0.4 kV single-feeder network: slack plus one loaded bus.
    pub fn two_bus() -> Network {
        let mut net = Network::new();
        let b1 = net.create_bus(0.4, "Bus 1");
        let b2 = net.create_bus(0.4, "Bus 2");
        net.create_ext_grid(b1, 1.0, "Slack");
        net.create_load(b2, 0.1, 0.05, "Load 2");
        net.create_line_from_parameters(b1, b2, 0.1, 0.64, 0.08, 0.0, 0.1, "Line 1-2");
        net
    }
}
