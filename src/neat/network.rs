use std::collections::HashMap;

use super::genome::Genome;
use super::neuron::{apply_activation, Activation, Neuron, NeuronKind};

/// Contributions stored by cyclic links are dropped beyond this magnitude so
/// runaway feedback cannot poison a network with non-finite values.
const CYCLE_VALUE_LIMIT: f64 = 1e10;

#[derive(Clone, Copy, Debug)]
pub struct NeuronInput {
    pub source: u64,
    pub weight: f64,
}

#[derive(Clone, Debug)]
pub struct FeedForwardNeuron {
    pub id: u64,
    pub bias: f64,
    /// Previous-tick feedback carried by cyclic inputs.
    pub stored_value: f64,
    pub inputs: Vec<NeuronInput>,
    pub cyclic_inputs: Vec<NeuronInput>,
    pub activation: Activation,
    is_output: bool,
}

/// A genome compiled into evaluation order. Neurons are laid out layer by
/// layer using only the non-cyclic active links; cyclic links feed each
/// neuron the value its source held on the previous activation.
#[derive(Clone, Debug)]
pub struct FeedForward {
    input_ids: Vec<u64>,
    output_ids: Vec<u64>,
    neurons: Vec<FeedForwardNeuron>,
}

impl FeedForward {
    pub fn new(genome: &Genome) -> Self {
        let layers = layer_neurons(genome);

        let input_ids = layers
            .first()
            .map(|layer| layer.iter().map(|n| n.id()).collect())
            .unwrap_or_default();
        let output_ids: Vec<u64> = layers
            .last()
            .map(|layer| layer.iter().map(|n| n.id()).collect())
            .unwrap_or_default();

        let mut neurons = Vec::new();
        for layer in &layers {
            for neuron in layer {
                let mut inputs = Vec::new();
                let mut cyclic_inputs = Vec::new();
                for link in genome.links() {
                    if !link.is_active() || link.out_id() != neuron.id() {
                        continue;
                    }
                    let input = NeuronInput {
                        source: link.in_id(),
                        weight: link.weight(),
                    };
                    if link.is_cyclic() {
                        cyclic_inputs.push(input);
                    } else {
                        inputs.push(input);
                    }
                }
                neurons.push(FeedForwardNeuron {
                    id: neuron.id(),
                    bias: neuron.bias(),
                    stored_value: 0.0,
                    inputs,
                    cyclic_inputs,
                    activation: neuron.activation(),
                    is_output: output_ids.contains(&neuron.id()),
                });
            }
        }

        Self {
            input_ids,
            output_ids,
            neurons,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn output_len(&self) -> usize {
        self.output_ids.len()
    }

    pub fn neurons(&self) -> &[FeedForwardNeuron] {
        &self.neurons
    }

    /// One forward pass. Inputs map positionally onto the input neurons;
    /// outputs come back in insertion order and pass through linearly.
    pub fn activate(&mut self, input_values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input_values.len(), self.input_ids.len());
        let mut values: HashMap<u64, f64> =
            HashMap::with_capacity(self.neurons.len() + self.input_ids.len());
        for (id, value) in self.input_ids.iter().zip(input_values) {
            values.insert(*id, *value);
        }

        for neuron in &self.neurons {
            if values.contains_key(&neuron.id) {
                continue;
            }
            let mut value = neuron.stored_value;
            for input in &neuron.inputs {
                if let Some(source_value) = values.get(&input.source) {
                    value += source_value * input.weight;
                }
            }
            value += neuron.bias;
            if !neuron.is_output {
                value = apply_activation(neuron.activation, value);
            }
            values.insert(neuron.id, value);
        }

        // refresh the cycle feedback for the next pass, dropping runaway
        // contributions
        for neuron in &mut self.neurons {
            if neuron.cyclic_inputs.is_empty() {
                continue;
            }
            let mut stored = 0.0;
            for input in &neuron.cyclic_inputs {
                if let Some(source_value) = values.get(&input.source) {
                    if source_value.abs() > CYCLE_VALUE_LIMIT || !source_value.is_finite() {
                        continue;
                    }
                    stored += input.weight * source_value;
                }
            }
            neuron.stored_value = stored;
        }

        self.output_ids
            .iter()
            .map(|id| values.get(id).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Topologically layer a genome's neurons using only active non-cyclic
/// links. Inputs form the first layer and outputs are forced last; hidden
/// neurons become active once all their feeding neurons are active. Hidden
/// neurons unreachable from the inputs are flushed into a final hidden
/// layer so compilation always terminates.
pub fn layer_neurons(genome: &Genome) -> Vec<Vec<Neuron>> {
    let mut layers: Vec<Vec<Neuron>> = Vec::new();
    let mut active: Vec<u64> = Vec::new();

    let input_layer: Vec<Neuron> = genome
        .neurons()
        .iter()
        .filter(|n| n.kind() == NeuronKind::Input)
        .copied()
        .collect();
    active.extend(input_layer.iter().map(|n| n.id()));
    layers.push(input_layer);

    let output_layer: Vec<Neuron> = genome
        .neurons()
        .iter()
        .filter(|n| n.kind() == NeuronKind::Output)
        .copied()
        .collect();

    let hidden_total = genome
        .neurons()
        .iter()
        .filter(|n| n.kind() == NeuronKind::Hidden)
        .count();
    let mut hidden_placed = 0usize;

    while hidden_placed < hidden_total {
        let mut layer: Vec<Neuron> = Vec::new();
        for neuron in genome.neurons() {
            if neuron.kind() != NeuronKind::Hidden || active.contains(&neuron.id()) {
                continue;
            }
            let ready = genome.links().iter().all(|link| {
                !(link.is_active()
                    && !link.is_cyclic()
                    && link.out_id() == neuron.id()
                    && !active.contains(&link.in_id()))
            });
            if ready {
                layer.push(*neuron);
            }
        }

        if layer.is_empty() {
            // unreachable hidden neurons: place them all in one final layer
            let leftovers: Vec<Neuron> = genome
                .neurons()
                .iter()
                .filter(|n| n.kind() == NeuronKind::Hidden && !active.contains(&n.id()))
                .copied()
                .collect();
            hidden_placed += leftovers.len();
            active.extend(leftovers.iter().map(|n| n.id()));
            layers.push(leftovers);
            break;
        }

        hidden_placed += layer.len();
        active.extend(layer.iter().map(|n| n.id()));
        layers.push(layer);
    }

    layers.push(output_layer);
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::{Link, Neuron, NeuronKind};

    fn linear(neuron: &mut Neuron) {
        neuron.set_activation(Activation::Linear);
    }

    #[test]
    fn layers_respect_topological_order() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let h1 = Neuron::new(NeuronKind::Hidden, 0.0);
        let h2 = Neuron::new(NeuronKind::Hidden, 0.0);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i, a, b, o) = (input.id(), h1.id(), h2.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(h1);
        genome.add_neuron(h2);
        genome.add_neuron(output);
        genome.add_link(Link::new(i, a, 1.0));
        genome.add_link(Link::new(a, b, 1.0));
        genome.add_link(Link::new(b, o, 1.0));

        let layers = layer_neurons(&genome);
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[0][0].id(), i);
        assert_eq!(layers[1][0].id(), a);
        assert_eq!(layers[2][0].id(), b);
        assert_eq!(layers[3][0].id(), o);
    }

    #[test]
    fn simple_chain_propagates_linearly() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let mut hidden = Neuron::new(NeuronKind::Hidden, 0.5);
        linear(&mut hidden);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i, h, o) = (input.id(), hidden.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(hidden);
        genome.add_neuron(output);
        genome.add_link(Link::new(i, h, 2.0));
        genome.add_link(Link::new(h, o, 3.0));

        let mut network = FeedForward::new(&genome);
        let out = network.activate(&[1.0]);
        // hidden = 1*2 + 0.5 = 2.5 (linear); output passes through: 2.5*3
        assert_eq!(out, vec![7.5]);
    }

    #[test]
    fn outputs_bypass_their_activation_function() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i, o) = (input.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(output);
        genome.add_link(Link::new(i, o, 1.0));

        let mut network = FeedForward::new(&genome);
        // a sigmoid would squash 5.0 to ~0.993; outputs must stay linear
        assert_eq!(network.activate(&[5.0]), vec![5.0]);
    }

    #[test]
    fn inactive_links_are_excluded_from_the_network() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i, o) = (input.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(output);
        let link = Link::new(i, o, 1.0);
        let link_id = link.id();
        genome.add_link(link);
        genome.disable_link(link_id);

        let mut network = FeedForward::new(&genome);
        assert_eq!(network.activate(&[3.0]), vec![0.0]);
    }

    #[test]
    fn cyclic_link_feeds_back_previous_tick_value() {
        // I -> A -> B -> O forward, plus a cyclic B -> A feedback
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let mut a = Neuron::new(NeuronKind::Hidden, 0.0);
        linear(&mut a);
        let mut b = Neuron::new(NeuronKind::Hidden, 0.0);
        linear(&mut b);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i_id, a_id, b_id, o_id) = (input.id(), a.id(), b.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(a);
        genome.add_neuron(b);
        genome.add_neuron(output);
        genome.add_link(Link::new(i_id, a_id, 1.0));
        genome.add_link(Link::new(a_id, b_id, 1.0));
        genome.add_link(Link::new(b_id, o_id, 1.0));
        let mut feedback = Link::new(b_id, a_id, 0.5);
        feedback.set_cyclic(true);
        genome.add_link(feedback);

        let mut network = FeedForward::new(&genome);
        let first = network.activate(&[1.0]);
        assert_eq!(first, vec![1.0]);

        // second pass: A = stored(0.5 * B_prev) + input = 1.5, so O = 1.5
        let second = network.activate(&[1.0]);
        assert_eq!(second, vec![1.5]);
    }

    #[test]
    fn runaway_cycle_contributions_are_dropped() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let mut hidden = Neuron::new(NeuronKind::Hidden, 0.0);
        linear(&mut hidden);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (i, h, o) = (input.id(), hidden.id(), output.id());
        genome.add_neuron(input);
        genome.add_neuron(hidden);
        genome.add_neuron(output);
        genome.add_link(Link::new(i, h, 1.0));
        genome.add_link(Link::new(h, o, 1.0));
        let mut feedback = Link::new(h, h, 10.0);
        feedback.set_cyclic(true);
        genome.add_link(feedback);

        let mut network = FeedForward::new(&genome);
        for _ in 0..64 {
            let out = network.activate(&[1e9]);
            assert!(out[0].is_finite());
        }
        // once the hidden value overflows the guard, the stored feedback
        // resets instead of compounding
        assert!(network
            .neurons()
            .iter()
            .all(|n| n.stored_value.is_finite()));
    }

    #[test]
    fn unreachable_hidden_neurons_still_get_a_layer() {
        let mut genome = Genome::default();
        let input = Neuron::new(NeuronKind::Input, 0.0);
        let orphan_feeder = Neuron::new(NeuronKind::Hidden, 0.0);
        let orphan = Neuron::new(NeuronKind::Hidden, 0.0);
        let output = Neuron::new(NeuronKind::Output, 0.0);
        let (f, h) = (orphan_feeder.id(), orphan.id());
        genome.add_neuron(input);
        genome.add_neuron(orphan_feeder);
        genome.add_neuron(orphan);
        genome.add_neuron(output);
        // two hidden neurons feeding each other through non-cyclic links
        // can't happen via mutation, but persisted genomes must not hang the
        // compiler
        genome.add_link(Link::new(f, h, 1.0));
        genome.add_link(Link::new(h, f, 1.0));

        let layers = layer_neurons(&genome);
        let placed: usize = layers.iter().map(|l| l.len()).sum();
        assert_eq!(placed, 4);
    }
}
