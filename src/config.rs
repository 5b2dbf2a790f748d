//! Process-wide configuration snapshot.
//!
//! The whole tunable surface lives in one `Settings` tree, loaded once from a
//! JSON file at startup and immutable afterwards. Every field has a default,
//! so a missing file or a partial file still yields a runnable simulation.

use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::SimError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeatSettings {
    pub weight_mutation_rate: f64,
    pub standard_deviation_weight: f64,
    pub max_weight: f64,
    pub min_weight: f64,
    pub add_neuron_mutation_rate: f64,
    pub add_link_mutation_rate: f64,
    pub remove_neuron_mutation_rate: f64,
    pub remove_link_mutation_rate: f64,
    pub change_weight_mutation_rate: f64,
    pub bias_mutation_rate: f64,
    pub max_bias: f64,
    pub min_bias: f64,
    pub change_bias_mutation_rate: f64,
    pub adjustment_probability: f64,
    pub activation_function_mutation_rate: f64,
    pub module_activation_mutation_rate: f64,
    pub module_disable_mutation_rate: f64,
}

impl Default for NeatSettings {
    fn default() -> Self {
        Self {
            weight_mutation_rate: 0.2,
            standard_deviation_weight: 0.1,
            max_weight: 1.0,
            min_weight: 0.0,
            add_neuron_mutation_rate: 0.05,
            add_link_mutation_rate: 0.25,
            remove_neuron_mutation_rate: 0.02,
            remove_link_mutation_rate: 0.15,
            change_weight_mutation_rate: 0.6,
            bias_mutation_rate: 0.2,
            max_bias: 0.1,
            min_bias: 0.0,
            change_bias_mutation_rate: 0.6,
            adjustment_probability: 0.8,
            activation_function_mutation_rate: 0.02,
            module_activation_mutation_rate: 0.01,
            module_disable_mutation_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompatibilitySettings {
    pub weight_shared_neurons: f64,
    pub weight_shared_links: f64,
    pub average_weight_shared_links: f64,
    pub color_compatibility: f64,
    pub mutables_compatibility: f64,
    pub compatibility_threshold: f64,
    pub compatibility_distance: f64,
}

impl Default for CompatibilitySettings {
    fn default() -> Self {
        Self {
            weight_shared_neurons: 0.2,
            weight_shared_links: 0.3,
            average_weight_shared_links: 0.5,
            color_compatibility: 0.1,
            mutables_compatibility: 0.5,
            compatibility_threshold: 2.0,
            compatibility_distance: 100.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub map_width: f64,
    pub map_height: f64,
    pub max_food_size: f64,
    pub max_creature_size: f64,
    pub min_creature_size: f64,
    pub tolerance: f64,
    pub default_food_density: f64,
    pub default_creature_density: f64,
    pub food_spawn_rate: f64,
    pub energy_to_health: f64,
    pub health_to_energy: f64,
    pub plant_nutritional_value: f64,
    pub meat_nutritional_value: f64,
    pub egg_nutritional_value: f64,
    pub egg_incubation_time_multiplier: f64,
    pub plant_proportion: f64,
    pub rot_factor: f64,
    pub photosynthesis_factor: f64,
    pub max_nutritional_value: f64,
    pub default_lifespan: f64,
    pub grid_cell_size: f64,
    pub food_spawn_cell_size: f64,
    pub reproduction_threshold: f64,
    pub reproduction_cooldown: f64,
    pub input_neurons: usize,
    pub output_neurons: usize,
    pub frictional_coefficient: f64,
    pub maturity_age_multiplier: f64,
    pub male_reproduction_cost: f64,
    pub pregnancy_hardship_modifier: f64,
    pub movement_energy: f64,
    pub heat_energy: f64,
    pub initial_plant_spawns: usize,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            map_width: 1900.0,
            map_height: 880.0,
            max_food_size: 15.0,
            max_creature_size: 15.0,
            min_creature_size: 2.0,
            tolerance: 1e-3,
            default_food_density: 5e-4,
            default_creature_density: 5e-4,
            food_spawn_rate: 1e-4,
            energy_to_health: 70.0,
            health_to_energy: 10.0,
            plant_nutritional_value: 1.0,
            meat_nutritional_value: 2.0,
            egg_nutritional_value: 3.0,
            egg_incubation_time_multiplier: 1.0,
            plant_proportion: 0.5,
            rot_factor: 1.0,
            photosynthesis_factor: 0.1,
            max_nutritional_value: 5.0,
            default_lifespan: 30.0,
            grid_cell_size: 50.0,
            food_spawn_cell_size: 50.0,
            reproduction_threshold: 0.8,
            reproduction_cooldown: 10.0,
            input_neurons: 12,
            output_neurons: 6,
            frictional_coefficient: 0.05,
            maturity_age_multiplier: 0.2,
            male_reproduction_cost: 0.75,
            pregnancy_hardship_modifier: 1.0,
            movement_energy: 0.005,
            heat_energy: 0.01,
            initial_plant_spawns: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub fixed_update_interval: f64,
    pub eps: f64,
    pub max_cells_to_find_food: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fixed_update_interval: 0.05,
            eps: 1e-7,
            max_cells_to_find_food: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicalConstraintSettings {
    pub mutation_rate: f64,
    pub max_energy_density: f64,
    pub min_energy_loss: f64,
    pub d_energy_density: f64,
    pub d_energy_loss: f64,
    pub d_integrity: f64,
    pub d_strafing_difficulty: f64,
    pub d_max_size: f64,
    pub d_baby_size: f64,
    pub d_max_force: f64,
    pub d_growth_factor: f64,
    pub d_vision_factor: f64,
    pub d_gestation_ratio_to_incubation: f64,
    pub d_stomach_capacity: f64,
    pub d_diet: f64,
    pub d_genetic_strength: f64,
    pub d_eating_speed: f64,
    pub d_pheromone_emission: f64,
    pub d_digestion_rate: f64,
    pub d_acid_to_energy: f64,
    pub vision_ar_ratio: f64,
    pub color_mutation_factor: f64,
    pub max_reproducing_age: f64,
    pub mating_desire_max_prob: f64,
    pub mating_desire_factor: f64,
    pub pregnancy_energy_factor: f64,
    pub pregnancy_velocity_factor: f64,
    pub after_birth_velocity_factor: f64,
    pub pheromone_detection_sensitivity: f64,
}

impl Default for PhysicalConstraintSettings {
    fn default() -> Self {
        Self {
            mutation_rate: 0.2,
            max_energy_density: 10.0,
            min_energy_loss: 0.1,
            d_energy_density: 5.0,
            d_energy_loss: 0.5,
            d_integrity: 3.0,
            d_strafing_difficulty: 0.5,
            d_max_size: 10.0,
            d_baby_size: 2.0,
            d_max_force: 10.0,
            d_growth_factor: 10.0,
            d_vision_factor: 200.0,
            d_gestation_ratio_to_incubation: 0.5,
            d_stomach_capacity: 2.0,
            d_diet: 0.5,
            d_genetic_strength: 0.6,
            d_eating_speed: 1.0,
            d_pheromone_emission: 0.5,
            d_digestion_rate: 3.0,
            d_acid_to_energy: 5.0,
            vision_ar_ratio: 200.0 * std::f64::consts::FRAC_PI_3,
            color_mutation_factor: 0.05,
            max_reproducing_age: 700.0,
            mating_desire_max_prob: 0.05,
            mating_desire_factor: 0.05,
            pregnancy_energy_factor: 0.7,
            pregnancy_velocity_factor: 0.5,
            after_birth_velocity_factor: 1.5,
            pheromone_detection_sensitivity: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RandomSettings {
    pub seed: u64,
    pub input_seed: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub neat: NeatSettings,
    pub compatibility: CompatibilitySettings,
    pub environment: EnvironmentSettings,
    pub engine: EngineSettings,
    pub physical_constraints: PhysicalConstraintSettings,
    pub random: RandomSettings,
}

impl Settings {
    /// Parse settings from a JSON config file. `ui.*` keys in the file are
    /// ignored by the core; missing keys take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::Config {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        serde_json::from_str(&text).map_err(|e| SimError::Config {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Install the process-wide settings snapshot. The first install wins;
/// returns false if a snapshot was already present.
pub fn install(settings: Settings) -> bool {
    SETTINGS.set(settings).is_ok()
}

/// Install from a config file, falling back to defaults on any failure.
/// The failure is logged with context; the core keeps running.
pub fn install_from_file(path: impl AsRef<Path>) -> bool {
    match Settings::load_from_file(path.as_ref()) {
        Ok(s) => install(s),
        Err(e) => {
            log::warn!("{e}; starting with default settings");
            install(Settings::default())
        }
    }
}

/// The immutable process-wide settings. Initializes to defaults on first
/// access if nothing was installed.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let s = Settings::default();
        assert!(s.environment.frictional_coefficient < 1.0);
        assert!(s.environment.plant_proportion <= 1.0);
        assert!(s.physical_constraints.d_gestation_ratio_to_incubation <= 1.0);
        assert!(s.engine.fixed_update_interval > 0.0);
        assert_eq!(s.environment.input_neurons, 12);
        assert_eq!(s.environment.output_neurons, 6);
    }

    #[test]
    fn partial_json_fills_missing_sections_with_defaults() {
        let parsed: Settings = serde_json::from_str(
            r#"{
                "neat": { "add_link_mutation_rate": 0.9 },
                "environment": { "map_width": 640.0 },
                "ui": { "dragging_sensitivity": 1.0 }
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.neat.add_link_mutation_rate, 0.9);
        assert_eq!(
            parsed.neat.weight_mutation_rate,
            NeatSettings::default().weight_mutation_rate
        );
        assert_eq!(parsed.environment.map_width, 640.0);
        assert_eq!(
            parsed.environment.map_height,
            EnvironmentSettings::default().map_height
        );
    }

    #[test]
    fn load_from_missing_file_reports_context() {
        let err = Settings::load_from_file("/nonexistent/biosphere.json").unwrap_err();
        match err {
            SimError::Config { path, .. } => assert!(path.contains("biosphere.json")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
