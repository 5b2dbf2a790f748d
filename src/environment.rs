//! The world the simulation runs in: map dimensions, friction, and the food
//! density field (a toroidal Gaussian, single or double peaked, scaled by a
//! user-supplied density).

use serde::{Deserialize, Serialize};

use crate::config::settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodDensityProfile {
    SingleGaussian,
    DoubleGaussian,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Environment {
    width: f64,
    height: f64,
    friction_coefficient: f64,
    creature_density: f64,
    food_density_scale: f64,
    profile: FoodDensityProfile,
}

impl Environment {
    pub fn new(width: f64, height: f64) -> Self {
        let env = &settings().environment;
        Self {
            width,
            height,
            friction_coefficient: env.frictional_coefficient,
            creature_density: env.default_creature_density,
            food_density_scale: env.default_food_density,
            profile: FoodDensityProfile::SingleGaussian,
        }
    }

    pub fn with_densities(
        width: f64,
        height: f64,
        food_density: f64,
        creature_density: f64,
    ) -> Self {
        let mut environment = Self::new(width, height);
        environment.food_density_scale = food_density;
        environment.creature_density = creature_density;
        environment
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn friction_coefficient(&self) -> f64 {
        self.friction_coefficient
    }

    pub fn creature_density(&self) -> f64 {
        self.creature_density
    }

    pub fn set_creature_density(&mut self, density: f64) {
        self.creature_density = density;
    }

    pub fn food_density_scale(&self) -> f64 {
        self.food_density_scale
    }

    pub fn set_food_density(&mut self, density: f64) {
        self.food_density_scale = density;
    }

    pub fn set_profile(&mut self, profile: FoodDensityProfile) {
        self.profile = profile;
    }

    /// Food spawn density at a map point; never negative.
    pub fn food_density(&self, x: f64, y: f64) -> f64 {
        match self.profile {
            FoodDensityProfile::SingleGaussian => {
                let sigma_x = self.width / 3.0;
                let sigma_y = self.height / 3.0;
                self.food_density_scale
                    * self.gaussian(x, y, self.width / 2.0, self.height / 2.0, sigma_x, sigma_y)
            }
            FoodDensityProfile::DoubleGaussian => {
                let sigma_x = self.width / 10.0;
                let sigma_y = self.height / 10.0;
                let mean_x1 = self.width / 2.0;
                let mean_y1 = self.height / 2.0;
                // the second peak sits half a map away, wrapped
                let mean_x2 = (mean_x1 + self.width / 2.0) % self.width;
                let mean_y2 = (mean_y1 + self.height / 2.0) % self.height;
                self.food_density_scale
                    * (self.gaussian(x, y, mean_x1, mean_y1, sigma_x, sigma_y)
                        + self.gaussian(x, y, mean_x2, mean_y2, sigma_x, sigma_y))
            }
        }
    }

    /// Gaussian over the torus: both axis distances take the shorter wrap.
    fn gaussian(&self, x: f64, y: f64, mean_x: f64, mean_y: f64, sigma_x: f64, sigma_y: f64) -> f64 {
        let dx = (x - mean_x).abs().min(self.width - (x - mean_x).abs());
        let dy = (y - mean_y).abs().min(self.height - (y - mean_y).abs());
        let exponent =
            -((dx * dx) / (2.0 * sigma_x * sigma_x) + (dy * dy) / (2.0 * sigma_y * sigma_y));
        exponent.exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_is_nonnegative_everywhere() {
        let environment = Environment::with_densities(1000.0, 800.0, 5e-4, 5e-4);
        for ix in 0..20 {
            for iy in 0..16 {
                let d = environment.food_density(ix as f64 * 50.0, iy as f64 * 50.0);
                assert!(d >= 0.0);
            }
        }
    }

    #[test]
    fn density_peaks_at_the_map_center() {
        let environment = Environment::with_densities(1000.0, 800.0, 1.0, 0.0);
        let center = environment.food_density(500.0, 400.0);
        let corner = environment.food_density(0.0, 0.0);
        assert!(center > corner);
        assert!((center - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_wraps_around_the_seam() {
        let environment = Environment::with_densities(1000.0, 800.0, 1.0, 0.0);
        // the corner is half a map from the center along both axes either
        // way around, so all four corners agree
        let a = environment.food_density(0.0, 0.0);
        let b = environment.food_density(999.9, 799.9);
        assert!((a - b).abs() < 1e-3);
    }

    #[test]
    fn double_peak_profile_raises_the_corner() {
        let mut environment = Environment::with_densities(1000.0, 800.0, 1.0, 0.0);
        environment.set_profile(FoodDensityProfile::DoubleGaussian);
        let corner = environment.food_density(0.0, 0.0);
        // the second peak sits exactly on the wrapped corner
        assert!((corner - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_scale_means_no_food_anywhere() {
        let environment = Environment::with_densities(500.0, 500.0, 0.0, 0.0);
        assert_eq!(environment.food_density(250.0, 250.0), 0.0);
    }
}
