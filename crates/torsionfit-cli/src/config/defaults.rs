use torsionfit::engine::config::PhasePolicy;

pub struct DefaultsConfig {
    pub phase_policy: PhasePolicy,
    pub decouple_n: bool,
    pub sample_n5: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            phase_policy: PhasePolicy::Standard,
            decouple_n: false,
            sample_n5: false,
        }
    }
}
