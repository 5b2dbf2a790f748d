use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::settings;
use crate::error::SimError;
use crate::random;

use super::brain_module::{available_modules, BrainModule, MODULE_PHEROMONE, PHEROMONE_CHANNELS};
use super::link::{crossover_links, Link};
use super::neuron::{crossover_neurons, Activation, Neuron, NeuronKind, ALL_ACTIVATIONS};

/// Genetic encoding of a creature brain: an ordered neuron list, an ordered
/// link list and the set of activated brain modules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Genome {
    neurons: Vec<Neuron>,
    links: Vec<Link>,
    modules: Vec<BrainModule>,
}

impl Genome {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        let mut genome = Self::default();
        for _ in 0..input_count {
            genome.add_neuron(Neuron::new(NeuronKind::Input, 0.0));
        }
        for _ in 0..output_count {
            genome.add_neuron(Neuron::new(NeuronKind::Output, 0.0));
        }
        genome
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn modules(&self) -> &[BrainModule] {
        &self.modules
    }

    pub fn input_count(&self) -> usize {
        self.neurons
            .iter()
            .filter(|n| n.kind() == NeuronKind::Input)
            .count()
    }

    pub fn output_count(&self) -> usize {
        self.neurons
            .iter()
            .filter(|n| n.kind() == NeuronKind::Output)
            .count()
    }

    pub fn add_neuron(&mut self, neuron: Neuron) {
        self.neurons.push(neuron);
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn set_modules(&mut self, modules: Vec<BrainModule>) {
        self.modules = modules;
    }

    pub fn find_neuron(&self, id: u64) -> Option<&Neuron> {
        self.neurons.iter().find(|n| n.id() == id)
    }

    pub fn disable_link(&mut self, id: u64) {
        for link in &mut self.links {
            if link.id() == id {
                link.set_active(false);
            }
        }
    }

    pub fn enable_link(&mut self, id: u64) {
        for link in &mut self.links {
            if link.id() == id {
                link.set_active(true);
            }
        }
    }

    /// Remove the neuron and every link that references it.
    pub fn remove_neuron(&mut self, id: u64) {
        self.links
            .retain(|link| link.in_id() != id && link.out_id() != id);
        self.neurons.retain(|neuron| neuron.id() != id);
    }

    pub fn remove_link(&mut self, id: u64) {
        self.links.retain(|link| link.id() != id);
    }

    /// Whether a link connects the two neurons, in either direction.
    pub fn has_link(&self, a: u64, b: u64) -> bool {
        self.links.iter().any(|link| {
            (link.in_id() == a && link.out_id() == b) || (link.in_id() == b && link.out_id() == a)
        })
    }

    /// DFS over non-cyclic active outgoing edges; true when a back-edge to a
    /// node still on the visiting stack is found.
    pub fn detect_loops(&self, start: &Neuron) -> bool {
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        self.dfs(start.id(), &mut visited, &mut visiting)
    }

    fn dfs(&self, current: u64, visited: &mut HashSet<u64>, visiting: &mut HashSet<u64>) -> bool {
        if visiting.contains(&current) {
            return true;
        }
        if visited.contains(&current) {
            return false;
        }
        visiting.insert(current);

        for link in &self.links {
            if link.is_cyclic() || !link.is_active() || link.in_id() != current {
                continue;
            }
            if self.dfs(link.out_id(), visited, visiting) {
                return true;
            }
        }

        visiting.remove(&current);
        visited.insert(current);
        false
    }

    /// Apply every mutation operator independently, each gated by its own
    /// probability from the settings.
    pub fn mutate(&mut self) {
        let neat = &settings().neat;
        if random::bernoulli(neat.add_neuron_mutation_rate) {
            self.mutate_add_neuron();
        }
        if random::bernoulli(neat.add_link_mutation_rate) {
            self.mutate_add_link();
        }
        if random::bernoulli(neat.change_weight_mutation_rate) {
            self.mutate_change_weight();
        }
        if random::bernoulli(neat.change_bias_mutation_rate) {
            self.mutate_change_bias();
        }
        if random::bernoulli(neat.activation_function_mutation_rate) {
            self.mutate_activation_function();
        }
        if random::bernoulli(neat.module_activation_mutation_rate) {
            self.mutate_activate_brain_module();
        }
        if random::bernoulli(neat.module_disable_mutation_rate) {
            self.mutate_disable_brain_module();
        }
    }

    /// Connect a random non-output source to a random non-input sink. Does
    /// nothing when the pair is already connected; when the insertion closes
    /// a cycle the new link is flagged cyclic instead of rejected.
    pub fn mutate_add_link(&mut self) {
        let sources: Vec<usize> = (0..self.neurons.len())
            .filter(|&i| self.neurons[i].kind() != NeuronKind::Output)
            .collect();
        let sinks: Vec<usize> = (0..self.neurons.len())
            .filter(|&i| self.neurons[i].kind() != NeuronKind::Input)
            .collect();
        if sources.is_empty() || sinks.is_empty() {
            return;
        }

        let source = sources[random::uniform_index(sources.len())];
        let sink = sinks[random::uniform_index(sinks.len())];
        let in_id = self.neurons[source].id();
        let out_id = self.neurons[sink].id();

        if self.has_link(in_id, out_id) {
            return;
        }

        let source_neuron = self.neurons[source];
        self.add_link(Link::new(in_id, out_id, 1.0));
        if self.detect_loops(&source_neuron) {
            if let Some(last) = self.links.last_mut() {
                last.set_cyclic(true);
            }
        }
    }

    /// Split a random link: the old link is disabled, a hidden neuron takes
    /// its place with unit weight in and the original weight out. A cyclic
    /// split keeps the cycle on the outgoing half.
    pub fn mutate_add_neuron(&mut self) {
        if self.links.is_empty() {
            return;
        }
        let chosen = self.links[random::uniform_index(self.links.len())];
        self.disable_link(chosen.id());

        let neuron = Neuron::new(NeuronKind::Hidden, 0.0);
        let new_id = neuron.id();
        self.add_neuron(neuron);

        self.add_link(Link::new(chosen.in_id(), new_id, 1.0));
        let mut outgoing = Link::new(new_id, chosen.out_id(), chosen.weight());
        if chosen.is_cyclic() {
            outgoing.set_cyclic(true);
        }
        self.add_link(outgoing);
    }

    pub fn mutate_change_weight(&mut self) {
        let neat = &settings().neat;
        for link in &mut self.links {
            if random::bernoulli(neat.weight_mutation_rate) {
                let delta = random::normal(0.0, neat.standard_deviation_weight);
                link.set_weight((link.weight() + delta).clamp(neat.min_weight, neat.max_weight));
            }
        }
    }

    pub fn mutate_change_bias(&mut self) {
        let neat = &settings().neat;
        for neuron in &mut self.neurons {
            if random::bernoulli(neat.bias_mutation_rate) {
                let delta = random::normal(0.0, neat.standard_deviation_weight);
                neuron.set_bias((neuron.bias() + delta).clamp(neat.min_bias, neat.max_bias));
            }
        }
    }

    /// Reassign a random hidden neuron's activation function.
    pub fn mutate_activation_function(&mut self) {
        let hidden: Vec<usize> = (0..self.neurons.len())
            .filter(|&i| self.neurons[i].kind() == NeuronKind::Hidden)
            .collect();
        if hidden.is_empty() {
            return;
        }
        let index = hidden[random::uniform_index(hidden.len())];
        let activation = ALL_ACTIVATIONS[random::uniform_index(ALL_ACTIVATIONS.len())];
        self.neurons[index].set_activation(activation);
    }

    /// Activate a random module from the registry, appending its interface
    /// neurons to the genome.
    pub fn mutate_activate_brain_module(&mut self) {
        let registry = available_modules();
        let template = &registry[random::uniform_index(registry.len())];
        if !template.multiple && self.modules.iter().any(|m| m.module_id == template.module_id) {
            return;
        }
        self.activate_module(template);
    }

    /// Append a module instance: fresh input/output neurons are added to the
    /// genome, the module records their IDs and its starting indices within
    /// the neural interface.
    pub fn activate_module(&mut self, template: &BrainModule) {
        let mut module = template.clone();
        if module.module_id == MODULE_PHEROMONE {
            module.channel = random::uniform_index(PHEROMONE_CHANNELS) as u32;
        }

        module.first_input_index = self.input_count();
        for slot in module.input_ids.iter_mut() {
            let neuron = Neuron::new(NeuronKind::Input, 0.0);
            *slot = neuron.id();
            self.neurons.push(neuron);
        }

        module.first_output_index = self.output_count();
        for slot in module.output_ids.iter_mut() {
            let neuron = Neuron::new(NeuronKind::Output, 0.0);
            *slot = neuron.id();
            self.neurons.push(neuron);
        }

        self.modules.push(module);
    }

    /// Remove a random module along with its interface neurons.
    pub fn mutate_disable_brain_module(&mut self) {
        if self.modules.is_empty() {
            return;
        }
        let module = self.modules.remove(random::uniform_index(self.modules.len()));
        for id in module.input_ids.iter().chain(module.output_ids.iter()) {
            self.remove_neuron(*id);
        }
    }

    /// Compatibility distance between two genomes: normalized disjoint
    /// neuron and link counts plus the mean relative bias/weight difference
    /// over the shared part, weighted per the settings.
    pub fn compatibility(&self, other: &Genome) -> f64 {
        let mut difference_sum = 0.0;
        let mut shared_neurons = 0usize;
        for neuron in &self.neurons {
            if let Some(other_neuron) = other.find_neuron(neuron.id()) {
                shared_neurons += 1;
                difference_sum += relative_difference(neuron.bias(), other_neuron.bias());
            }
        }

        let mut shared_links = 0usize;
        for link in &self.links {
            if let Some(other_link) = other.links.iter().find(|l| l.id() == link.id()) {
                shared_links += 1;
                difference_sum += relative_difference(link.weight(), other_link.weight());
            }
        }

        let shared_total = shared_neurons + shared_links;
        let average_difference = if shared_total > 0 {
            difference_sum / shared_total as f64
        } else {
            0.0
        };

        let disjoint_neurons =
            (self.neurons.len() + other.neurons.len() - 2 * shared_neurons) as f64;
        let neuron_norm = self.neurons.len().max(other.neurons.len()).max(1) as f64;

        let disjoint_links = (self.links.len() + other.links.len() - 2 * shared_links) as f64;
        let link_norm = self.links.len().max(other.links.len()).max(1) as f64;

        let weights = &settings().compatibility;
        weights.weight_shared_neurons * (disjoint_neurons / neuron_norm)
            + weights.weight_shared_links * (disjoint_links / link_norm)
            + weights.average_weight_shared_links * average_difference
    }
}

/// Relative difference between two scalars, in `[0, 2]`.
fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

/// Offspring genome: every dominant gene is kept; genes matched by ID in the
/// recessive parent are blended per-gene. The offspring inherits the
/// dominant parent's modules.
pub fn crossover(dominant: &Genome, recessive: &Genome) -> Result<Genome, SimError> {
    let mut offspring = Genome::default();

    for neuron in dominant.neurons() {
        match recessive.find_neuron(neuron.id()) {
            Some(other) => offspring.add_neuron(crossover_neurons(neuron, other)?),
            None => offspring.add_neuron(*neuron),
        }
    }

    for link in dominant.links() {
        match recessive.links().iter().find(|l| l.id() == link.id()) {
            Some(other) => offspring.add_link(crossover_links(link, other)?),
            None => offspring.add_link(*link),
        }
    }

    offspring.set_modules(dominant.modules().to_vec());
    Ok(offspring)
}

/// Hand-wired starter genome used when seeding the initial population: a
/// constant forward drive, digestion control tied to stomach emptiness, a
/// turn-towards-plants reflex and a proximity-triggered bite neuron.
pub fn minimally_viable_genome() -> Genome {
    let env = &settings().environment;
    let mut genome = Genome::new(env.input_neurons, env.output_neurons);

    let input_id = |genome: &Genome, index: usize| genome.neurons()[index].id();
    let output_id = |genome: &Genome, index: usize| genome.neurons()[env.input_neurons + index].id();

    // energy input drives forward acceleration and digestion
    genome.add_link(Link::new(input_id(&genome, 0), output_id(&genome, 0), 1.0));
    genome.add_link(Link::new(input_id(&genome, 0), output_id(&genome, 5), 1.0));
    // an empty stomach suppresses further acid production
    genome.add_link(Link::new(input_id(&genome, 4), output_id(&genome, 5), -1.0));
    // orient towards the closest plant, damped by the current spin
    genome.add_link(Link::new(input_id(&genome, 6), output_id(&genome, 2), 1.0));
    genome.add_link(Link::new(input_id(&genome, 3), output_id(&genome, 2), -0.1));

    // bite reflex: fires when the plant distance input drops
    let mut bite_manager = Neuron::new(NeuronKind::Hidden, 1.0);
    bite_manager.set_activation(Activation::Sigmoid);
    let bite_id = bite_manager.id();
    genome.add_neuron(bite_manager);
    genome.add_link(Link::new(input_id(&genome, 7), bite_id, -1.0));
    genome.add_link(Link::new(bite_id, output_id(&genome, 4), 1.0));

    genome
}
