//! Reproduction state machines. Every creature carries both a male and a
//! female system; the pairing pass in the creature manager decides which
//! role each queued creature plays.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::egg::{Egg, GestatingEgg};
use crate::error::SimError;
use crate::mutable::{self, Mutable};
use crate::neat::{self, Genome};

/// Shared reproductive bookkeeping, derived from the trait vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReproductiveState {
    pub maturity_age: f64,
    pub reproduction_cooldown: f64,
    /// Age at which the next mating becomes possible.
    pub ready_to_reproduce_at: f64,
    pub waiting_to_reproduce: bool,
    pub offspring_number: u32,
}

impl ReproductiveState {
    pub fn new(mutable: &Mutable) -> Self {
        let maturity_age = mutable.maturity_age();
        Self {
            maturity_age,
            reproduction_cooldown: mutable.reproduction_cooldown(),
            ready_to_reproduce_at: maturity_age,
            waiting_to_reproduce: false,
            offspring_number: 0,
        }
    }

    fn clock_allows(&self, age: f64) -> bool {
        age >= self.ready_to_reproduce_at && age < settings().physical_constraints.max_reproducing_age
    }

    fn energy_allows(&self, energy: f64, max_energy: f64) -> bool {
        energy > settings().environment.reproduction_threshold * max_energy
    }

    fn restart_cooldown(&mut self, age: f64) {
        self.ready_to_reproduce_at = age + self.reproduction_cooldown;
    }
}

/// One parent's contribution to conception.
#[derive(Clone, Debug)]
pub struct ParentSeed {
    pub genome: Genome,
    pub mutable: Mutable,
    pub energy: f64,
    pub generation: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaleSystem {
    pub state: ReproductiveState,
}

impl MaleSystem {
    pub fn new(mutable: &Mutable) -> Self {
        Self {
            state: ReproductiveState::new(mutable),
        }
    }

    pub fn ready_to_procreate(&self, age: f64, energy: f64, max_energy: f64) -> bool {
        self.state.clock_allows(age) && self.state.energy_allows(energy, max_energy)
    }

    /// Called after a successful mating; the energy cost is paid by the
    /// owning creature.
    pub fn after_mate(&mut self, age: f64) {
        self.state.restart_cooldown(age);
        self.state.offspring_number += 1;
        self.state.waiting_to_reproduce = false;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FemaleSystem {
    pub state: ReproductiveState,
    pub egg: Option<GestatingEgg>,
    pub gestation_ratio_to_incubation: f64,
    pub pregnancy_hardship: f64,
}

impl FemaleSystem {
    pub fn new(mutable: &Mutable) -> Self {
        Self {
            state: ReproductiveState::new(mutable),
            egg: None,
            gestation_ratio_to_incubation: mutable.gestation_ratio_to_incubation,
            pregnancy_hardship: settings().environment.pregnancy_hardship_modifier,
        }
    }

    pub fn is_pregnant(&self) -> bool {
        self.egg.is_some()
    }

    pub fn ready_to_procreate(&self, age: f64, energy: f64, max_energy: f64) -> bool {
        !self.is_pregnant()
            && self.state.clock_allows(age)
            && self.state.energy_allows(energy, max_energy)
    }

    /// Conceive: the higher-energy parent dominates both crossovers, the
    /// offspring is mutated twice on each axis, and gestation starts.
    pub fn conceive(&mut self, father: &ParentSeed, mother: &ParentSeed) -> Result<(), SimError> {
        let (dominant, recessive) = if father.energy > mother.energy {
            (father, mother)
        } else {
            (mother, father)
        };

        let mut genome = neat::crossover(&dominant.genome, &recessive.genome)?;
        genome.mutate();
        genome.mutate();

        let mut offspring_mutable = mutable::crossover(&dominant.mutable, &recessive.mutable);
        offspring_mutable.mutate();
        offspring_mutable.mutate();

        let incubation_time = offspring_mutable.incubation_time();
        self.egg = Some(GestatingEgg {
            genome,
            mutable: offspring_mutable,
            generation: father.generation.max(mother.generation) + 1,
            age: 0.0,
            incubation_time,
        });
        self.state.waiting_to_reproduce = false;
        Ok(())
    }

    /// Advance gestation; the egg matures at the gestation-to-incubation
    /// ratio while carried.
    pub fn gestate(&mut self, dt: f64) {
        let ratio = self.gestation_ratio_to_incubation;
        if let Some(egg) = self.egg.as_mut() {
            egg.age += dt * ratio;
        }
    }

    pub fn can_birth(&self) -> bool {
        self.egg.as_ref().is_some_and(|egg| {
            egg.age >= egg.incubation_time * self.gestation_ratio_to_incubation
        })
    }

    /// Lay the external egg. The remaining incubation is the part gestation
    /// did not cover.
    pub fn give_birth(&mut self, position: DVec2, age: f64) -> Option<Egg> {
        let mut gestating = self.egg.take()?;
        gestating.incubation_time *= 1.0 - self.gestation_ratio_to_incubation;
        gestating.age = 0.0;

        self.state.restart_cooldown(age);
        self.state.offspring_number += 1;
        Some(Egg::new(gestating, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(energy: f64, generation: u32) -> ParentSeed {
        ParentSeed {
            genome: Genome::new(12, 6),
            mutable: Mutable::default(),
            energy,
            generation,
        }
    }

    #[test]
    fn maturity_gates_readiness() {
        let mutable = Mutable::default();
        let male = MaleSystem::new(&mutable);
        let maturity = male.state.maturity_age;
        assert!(!male.ready_to_procreate(maturity * 0.5, 100.0, 100.0));
        assert!(male.ready_to_procreate(maturity + 1.0, 100.0, 100.0));
    }

    #[test]
    fn energy_threshold_gates_readiness() {
        let mutable = Mutable::default();
        let male = MaleSystem::new(&mutable);
        let age = male.state.maturity_age + 1.0;
        let threshold = settings().environment.reproduction_threshold;
        assert!(!male.ready_to_procreate(age, threshold * 100.0 - 1.0, 100.0));
        assert!(male.ready_to_procreate(age, threshold * 100.0 + 1.0, 100.0));
    }

    #[test]
    fn after_mate_restarts_the_cooldown() {
        let mutable = Mutable::default();
        let mut male = MaleSystem::new(&mutable);
        let age = male.state.maturity_age + 1.0;
        male.after_mate(age);
        assert!(!male.ready_to_procreate(age, 100.0, 100.0));
        assert_eq!(male.state.offspring_number, 1);
        assert!(male.ready_to_procreate(age + male.state.reproduction_cooldown, 100.0, 100.0));
    }

    #[test]
    fn conception_creates_a_next_generation_egg() {
        let mutable = Mutable::default();
        let mut female = FemaleSystem::new(&mutable);
        female.conceive(&seed(80.0, 2), &seed(50.0, 5)).unwrap();

        assert!(female.is_pregnant());
        let egg = female.egg.as_ref().unwrap();
        assert_eq!(egg.generation, 6);
        assert!(egg.incubation_time > 0.0);
        assert_eq!(egg.age, 0.0);
    }

    #[test]
    fn pregnant_females_are_not_ready_again() {
        let mutable = Mutable::default();
        let mut female = FemaleSystem::new(&mutable);
        let age = female.state.maturity_age + 1.0;
        assert!(female.ready_to_procreate(age, 100.0, 100.0));
        female.conceive(&seed(80.0, 0), &seed(50.0, 0)).unwrap();
        assert!(!female.ready_to_procreate(age, 100.0, 100.0));
    }

    #[test]
    fn birth_happens_only_after_the_gestation_share() {
        let mutable = Mutable::default();
        let mut female = FemaleSystem::new(&mutable);
        female.conceive(&seed(80.0, 0), &seed(50.0, 0)).unwrap();
        let incubation = female.egg.as_ref().unwrap().incubation_time;
        let ratio = female.gestation_ratio_to_incubation;

        // gestation advances at `ratio` per unit time, so the gestation
        // share completes after `incubation` time units regardless of ratio
        female.gestate(incubation * 0.5);
        assert!(!female.can_birth());
        female.gestate(incubation * 0.6);
        assert!(female.can_birth());

        let egg = female
            .give_birth(glam::dvec2(10.0, 10.0), 50.0)
            .expect("pregnant female births");
        assert!(!female.is_pregnant());
        assert!((egg.incubation_time() - incubation * (1.0 - ratio)).abs() < 1e-9);
        assert_eq!(egg.age(), 0.0);
    }

    #[test]
    fn giving_birth_without_an_egg_yields_nothing() {
        let mutable = Mutable::default();
        let mut female = FemaleSystem::new(&mutable);
        assert!(female.give_birth(glam::dvec2(0.0, 0.0), 10.0).is_none());
    }
}
