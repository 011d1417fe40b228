// src/config.rs

//! Run configuration, loadable from TOML.
//!
//! Every field has a default, so a partial file (or an empty one) is a valid
//! configuration. Call [`RunConfig::validate`] before building an experiment;
//! [`RunConfig::from_toml_str`] does it for you.

use crate::core::{MeasurementConfig, NodeId, SimError, SimTime};
use crate::network::channel::QuantumChannel;
use crate::network::memory::MemoryParams;
use crate::protocols::herald_success_probability;
use crate::validation::{check_non_negative, check_probability};
use serde::{Deserialize, Serialize};

/// RNG seeds, one per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Seeds {
    pub initiator: u64,
    pub responder: u64,
    pub bsm: u64,
}

impl Default for Seeds {
    fn default() -> Self {
        Self { initiator: 0, responder: 1, bsm: 2 }
    }
}

/// Parameters of one experiment: two end nodes, each `distance_m` away from
/// a BSM node in the middle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Fibre length from each end node to the BSM node.
    #[serde(default = "default_distance_m")]
    pub distance_m: f64,
    #[serde(default = "default_attenuation_db_per_m")]
    pub attenuation_db_per_m: f64,
    #[serde(default = "default_efficiency")]
    pub detector_efficiency: f64,
    /// Probability that the BSM optics perform the joint measurement.
    #[serde(default = "default_bsm_efficiency")]
    pub bsm_efficiency: f64,
    /// Probability of a false click in a window missing a photon.
    #[serde(default)]
    pub dark_count_rate: f64,
    /// Probability that the recorded Bell outcome is the wrong one.
    #[serde(default)]
    pub readout_error_rate: f64,
    #[serde(default = "default_memory_fidelity")]
    pub memory_fidelity: f64,
    #[serde(default = "default_memory_frequency_hz")]
    pub memory_frequency_hz: f64,
    #[serde(default = "default_efficiency")]
    pub memory_efficiency: f64,
    #[serde(default = "default_coherence_time_ps")]
    pub coherence_time_ps: SimTime,
    /// One-way delay of the herald links.
    #[serde(default = "default_classical_delay_ps")]
    pub classical_delay_ps: SimTime,
    /// How long the BSM keeps listening after the last expected photon.
    #[serde(default = "default_detection_window_ps")]
    pub detection_window_ps: SimTime,
    /// Spacing between the starts of consecutive attempts.
    #[serde(default = "default_attempt_interval_ps")]
    pub attempt_interval_ps: SimTime,
    #[serde(default = "default_num_attempts")]
    pub num_attempts: u64,
    /// Expire stored entanglement after `coherence_time_ps`.
    #[serde(default)]
    pub decoherence_expiry: bool,
    /// Memories fail to emit with probability `1 - memory_efficiency`.
    #[serde(default)]
    pub emission_gated_by_memory_efficiency: bool,
    #[serde(default)]
    pub seeds: Seeds,
}

const fn default_distance_m() -> f64 {
    1_000.0
}

const fn default_attenuation_db_per_m() -> f64 {
    0.0002
}

const fn default_efficiency() -> f64 {
    0.9
}

const fn default_bsm_efficiency() -> f64 {
    1.0
}

const fn default_memory_fidelity() -> f64 {
    0.95
}

const fn default_memory_frequency_hz() -> f64 {
    2_000.0
}

const fn default_coherence_time_ps() -> SimTime {
    100_000_000_000
}

const fn default_classical_delay_ps() -> SimTime {
    100_000_000
}

const fn default_detection_window_ps() -> SimTime {
    1_000_000
}

const fn default_attempt_interval_ps() -> SimTime {
    100_000_000_000
}

const fn default_num_attempts() -> u64 {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            distance_m: default_distance_m(),
            attenuation_db_per_m: default_attenuation_db_per_m(),
            detector_efficiency: default_efficiency(),
            bsm_efficiency: default_bsm_efficiency(),
            dark_count_rate: 0.0,
            readout_error_rate: 0.0,
            memory_fidelity: default_memory_fidelity(),
            memory_frequency_hz: default_memory_frequency_hz(),
            memory_efficiency: default_efficiency(),
            coherence_time_ps: default_coherence_time_ps(),
            classical_delay_ps: default_classical_delay_ps(),
            detection_window_ps: default_detection_window_ps(),
            attempt_interval_ps: default_attempt_interval_ps(),
            num_attempts: default_num_attempts(),
            decoherence_expiry: false,
            emission_gated_by_memory_efficiency: false,
            seeds: Seeds::default(),
        }
    }
}

impl RunConfig {
    /// SeQUeNCe's Barrett-Kok setup: a single-atom BSM that succeeds half the
    /// time and memories that emit with their efficiency.
    pub fn sequence() -> Self {
        Self {
            bsm_efficiency: 0.5,
            emission_gated_by_memory_efficiency: true,
            ..Self::default()
        }
    }

    /// [`RunConfig::sequence`] with 1% dark counts.
    pub fn realistic() -> Self {
        Self { dark_count_rate: 0.01, ..Self::sequence() }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, SimError> {
        let config: RunConfig =
            toml::from_str(contents).map_err(|err| SimError::InvalidConfig { message: err.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes back to TOML.
    pub fn to_toml_string(&self) -> Result<String, SimError> {
        toml::to_string(self).map_err(|err| SimError::InvalidConfig { message: err.to_string() })
    }

    /// Same configuration at another distance.
    pub fn at_distance(&self, distance_m: f64) -> Self {
        Self { distance_m, ..self.clone() }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        check_non_negative("distance-m", self.distance_m)?;
        check_non_negative("attenuation-db-per-m", self.attenuation_db_per_m)?;
        self.detector().validate()?;
        check_probability("bsm-efficiency", self.bsm_efficiency)?;
        check_probability("memory-fidelity", self.memory_fidelity)?;
        check_probability("memory-efficiency", self.memory_efficiency)?;
        check_non_negative("memory-frequency-hz", self.memory_frequency_hz)?;
        if self.coherence_time_ps == 0 {
            return Err(SimError::InvalidConfig { message: "coherence-time-ps must be greater than zero".into() });
        }
        if self.detection_window_ps == 0 {
            return Err(SimError::InvalidConfig { message: "detection-window-ps must be greater than zero".into() });
        }
        if self.num_attempts == 0 {
            return Err(SimError::InvalidConfig { message: "num-attempts must be greater than zero".into() });
        }
        Ok(())
    }

    /// Detector model of the BSM.
    pub fn detector(&self) -> MeasurementConfig {
        MeasurementConfig {
            detector_efficiency: self.detector_efficiency,
            dark_count_rate: self.dark_count_rate,
            readout_error_rate: self.readout_error_rate,
        }
    }

    /// Same configuration with another detector model.
    pub fn with_detector(self, detector: MeasurementConfig) -> Self {
        Self {
            detector_efficiency: detector.detector_efficiency,
            dark_count_rate: detector.dark_count_rate,
            readout_error_rate: detector.readout_error_rate,
            ..self
        }
    }

    pub fn memory_params(&self) -> MemoryParams {
        MemoryParams {
            fidelity: self.memory_fidelity,
            frequency_hz: self.memory_frequency_hz,
            efficiency: self.memory_efficiency,
            coherence_time_ps: self.coherence_time_ps,
        }
    }

    /// Transmission probability of one arm.
    pub fn transmission(&self) -> f64 {
        QuantumChannel::new(NodeId(0), NodeId(1), self.distance_m, self.attenuation_db_per_m).transmission_probability()
    }

    /// Expected success rate of a single attempt. With the neutral defaults
    /// this is `t^2 * detector_efficiency`.
    pub fn theoretical_success_rate(&self) -> f64 {
        let emission = if self.emission_gated_by_memory_efficiency { self.memory_efficiency } else { 1.0 };
        let arm = self.transmission() * emission;
        herald_success_probability(arm * arm, self.bsm_efficiency, &self.detector())
    }
}
