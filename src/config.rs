//! TOML-based study configuration.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::network::Network;
use crate::solver::SolverOptions;

/// Top-level study configuration parsed from TOML.
///
/// All fields default to the baseline study. Load from TOML with
/// [`StudyConfig::from_toml_file`]; when no `[network]` section is present
/// the built-in five-bus ring is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    /// Monte-Carlo batch parameters.
    #[serde(default)]
    pub study: StudySection,
    /// Power-flow solver parameters.
    #[serde(default)]
    pub solver: SolverSection,
    /// Optional inline network description.
    #[serde(default)]
    pub network: Option<NetworkSection>,
}

/// Monte-Carlo batch parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudySection {
    /// Number of randomized runs.
    pub n_runs: usize,
    /// Uniform multiplier range `[low, high)` applied to every load's P and Q.
    pub load_perturbation_range: [f64; 2],
    /// Random seed; drawn from OS entropy when absent.
    pub random_seed: Option<u64>,
}

impl Default for StudySection {
    fn default() -> Self {
        Self {
            n_runs: 10,
            load_perturbation_range: [0.875, 1.125],
            random_seed: None,
        }
    }
}

/// Power-flow solver parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSection {
    /// Convergence tolerance on the worst power mismatch (per-unit).
    pub tolerance: f64,
    /// Iteration cap before a run is declared diverged.
    pub max_iterations: usize,
    /// Per-unit base power (MVA).
    pub base_power_mva: f64,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 10,
            base_power_mva: 100.0,
        }
    }
}

/// Inline network description: the bus/line/load tuples of the data model.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    /// Buses in index order.
    pub buses: Vec<BusSpec>,
    /// Lines between bus indices.
    #[serde(default)]
    pub lines: Vec<LineSpec>,
    /// Loads attached to bus indices.
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
    /// The single slack source.
    pub ext_grid: ExtGridSpec,
}

/// One bus row.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusSpec {
    /// Nominal voltage (kV).
    pub vn_kv: f64,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// One line row.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineSpec {
    pub from_bus: usize,
    pub to_bus: usize,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    #[serde(default)]
    pub c_nf_per_km: f64,
    pub max_i_ka: f64,
    #[serde(default)]
    pub name: String,
}

/// One load row.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSpec {
    pub bus: usize,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default)]
    pub name: String,
}

/// The slack source row.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtGridSpec {
    pub bus: usize,
    #[serde(default = "default_vm_pu")]
    pub vm_pu: f64,
    #[serde(default)]
    pub name: String,
}

fn default_vm_pu() -> f64 {
    1.0
}

impl NetworkSection {
    /// Materializes the description into a [`Network`].
    ///
    /// Structural validity is checked later by [`Network::validate`], not
    /// here, so the section round-trips even when inconsistent.
    pub fn build(&self) -> Network {
        let mut net = Network::new();
        for (i, bus) in self.buses.iter().enumerate() {
            let name = if bus.name.is_empty() {
                format!("Bus {}", i + 1)
            } else {
                bus.name.clone()
            };
            net.create_bus(bus.vn_kv, &name);
        }
        for line in &self.lines {
            net.create_line_from_parameters(
                line.from_bus,
                line.to_bus,
                line.length_km,
                line.r_ohm_per_km,
                line.x_ohm_per_km,
                line.c_nf_per_km,
                line.max_i_ka,
                &line.name,
            );
        }
        for load in &self.loads {
            net.create_load(load.bus, load.p_mw, load.q_mvar, &load.name);
        }
        net.create_ext_grid(self.ext_grid.bus, self.ext_grid.vm_pu, &self.ext_grid.name);
        net
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g. `"solver.tolerance"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl StudyConfig {
    /// Parses a study from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a study from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all scalar options and returns a list of errors.
    ///
    /// Network structure is validated separately by [`Network::validate`].
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.solver;
        if !(s.tolerance > 0.0) {
            errors.push(ConfigError {
                field: "solver.tolerance".into(),
                message: "must be > 0".into(),
            });
        }
        if s.max_iterations == 0 {
            errors.push(ConfigError {
                field: "solver.max_iterations".into(),
                message: "must be > 0".into(),
            });
        }
        if !(s.base_power_mva > 0.0) {
            errors.push(ConfigError {
                field: "solver.base_power_mva".into(),
                message: "must be > 0".into(),
            });
        }

        let [low, high] = self.study.load_perturbation_range;
        if !(low < high) || low < 0.0 {
            errors.push(ConfigError {
                field: "study.load_perturbation_range".into(),
                message: "must satisfy 0 <= low < high".into(),
            });
        }

        errors
    }

    /// Solver options derived from the `[solver]` section.
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            tolerance: self.solver.tolerance,
            max_iterations: self.solver.max_iterations,
            base_power_mva: self.solver.base_power_mva,
        }
    }

    /// The study network: the inline `[network]` section when present,
    /// otherwise the built-in five-bus ring.
    pub fn build_network(&self) -> Network {
        match &self.network {
            Some(section) => section.build(),
            None => Network::five_bus_ring(),
        }
    }
}
