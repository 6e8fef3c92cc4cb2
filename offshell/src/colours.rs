//! Colour samplers.
//!
//! Discrete samplers assign integer colour indices per external leg;
//! continuous samplers fill colour vectors on the complex sphere. The
//! colour-flow sampler only generates colour-conserving configurations, by
//! pairing every colour slot with an anti-colour slot through a random
//! matching, and also provides the Les-Houches colour tags of the event
//! record.

use crate::algorithm::Algorithm;
use crate::colour::ColourRep;
use crate::config::{ColourGenerators, Settings};
use crate::error::{Error, Result};
use crate::event::FIRST_COLOUR_TAG;
use crate::helicity::random_sphere;
use log::warn;
use rand::Rng;

/// Colour sampling strategy.
#[derive(Clone, Debug)]
pub enum ColourSampler {
    /// Uniform discrete assignment over each leg's full colour range.
    Uniform,
    /// Uniform discrete assignment over the fundamental and adjoint index
    /// spaces; identical to `Uniform` on adjoint-basis models.
    Adjoint,
    /// Colour-conserving flow configurations; requires a colour-flow model.
    Flow {
        /// Already warned about a degenerate channel.
        warned: bool,
    },
    /// Continuous colour vectors on the complex sphere, weight one.
    Continuous,
    /// Exact colour summation through the algorithm, weight one.
    Summed,
}

/// Colour tags of the last flow assignment, in Les-Houches convention.
#[derive(Clone, Debug, Default)]
pub struct FlowTags {
    /// Colour tag per leg, zero for uncoloured legs.
    pub colour: Vec<i32>,
    /// Anti-colour tag per leg.
    pub anti_colour: Vec<i32>,
}

impl ColourSampler {
    /// Assembles the sampler matching the configuration and the selected
    /// process's colour content.
    ///
    /// # Errors
    ///
    /// Fails with a degenerate-sampler error when flow sampling is asked of
    /// a model without colour-flow decomposition.
    pub fn from_settings(settings: &Settings, algorithm: &Algorithm<'_>) -> Result<Self> {
        if settings.continuous_colours
            && !matches!(settings.colour_generator, ColourGenerators::Summed)
        {
            return Ok(Self::Continuous);
        }
        match settings.colour_generator {
            ColourGenerators::Uniform => Ok(Self::Uniform),
            ColourGenerators::Adjoint => Ok(Self::Adjoint),
            ColourGenerators::Summed => Ok(Self::Summed),
            ColourGenerators::FlowSampling => {
                if algorithm.model().colour_flow() {
                    Ok(Self::Flow { warned: false })
                } else {
                    Err(Error::Degenerate(
                        "flow sampling needs a colour-flow model".to_string(),
                    ))
                }
            }
        }
    }

    /// Assigns colours to every leg; returns the sampling weight and, for
    /// flow sampling, the colour tags.
    pub fn generate<R: Rng>(
        &mut self,
        algorithm: &mut Algorithm<'_>,
        rng: &mut R,
    ) -> (f64, FlowTags) {
        let n = algorithm.n_external();
        match self {
            Self::Uniform | Self::Adjoint => {
                let mut weight = 1.0;
                let nc = algorithm.model().nc();
                for leg in 0..n {
                    let dof = algorithm.particle(leg).colour_dof(nc);
                    algorithm.set_colour(leg, rng.gen_range(0..dof));
                    weight *= dof as f64;
                }
                (weight, FlowTags::default())
            }
            Self::Continuous => {
                let nc = algorithm.model().nc();
                for leg in 0..n {
                    let dof = algorithm.particle(leg).colour_dof(nc);
                    if dof > 1 {
                        algorithm.set_colour_wave(leg, random_sphere(dof, rng));
                    } else {
                        algorithm.set_colour(leg, 0);
                    }
                }
                (1.0, FlowTags::default())
            }
            Self::Summed => {
                for leg in 0..n {
                    algorithm.sum_colour(leg);
                }
                (1.0, FlowTags::default())
            }
            Self::Flow { warned } => generate_flow(algorithm, rng, warned),
        }
    }
}

/// One end of a colour line on an external leg.
#[derive(Clone, Copy, Debug)]
struct Slot {
    leg: usize,
    /// Index position within the leg's colour indices.
    position: usize,
}

fn generate_flow<R: Rng>(
    algorithm: &mut Algorithm<'_>,
    rng: &mut R,
    warned: &mut bool,
) -> (f64, FlowTags) {
    let n = algorithm.n_external();
    let nc = algorithm.model().nc();
    let mut colour_slots: Vec<Slot> = Vec::new();
    let mut anti_slots: Vec<Slot> = Vec::new();
    for leg in 0..n {
        let particle = algorithm.particle(leg);
        let outgoing = leg >= algorithm.n_in();
        // classify from the equivalent incoming particle
        let rep = if outgoing {
            algorithm
                .model()
                .particle(particle.anti_flavour())
                .colour_rep()
        } else {
            particle.colour_rep()
        };
        let positions = match rep {
            ColourRep::Singlet => 0,
            ColourRep::Fundamental | ColourRep::AntiFundamental => 1,
            ColourRep::Adjoint | ColourRep::FlowAdjoint => 2,
        };
        for position in 0..positions.min(2) {
            match rep.colour_type(position) {
                1 => colour_slots.push(Slot { leg, position }),
                -1 => anti_slots.push(Slot { leg, position }),
                _ => {}
            }
        }
    }
    if colour_slots.len() != anti_slots.len() {
        if !*warned {
            warn!("no colour-conserving flow exists for this process");
            *warned = true;
        }
        return (0.0, FlowTags::default());
    }
    let lines = colour_slots.len();
    if lines == 0 {
        return (1.0, FlowTags::default());
    }

    // uniform random matching of colour to anti-colour slots
    let mut matching: Vec<usize> = (0..lines).collect();
    for i in (1..lines).rev() {
        matching.swap(i, rng.gen_range(0..=i));
    }
    // one colour value per flow line
    let values: Vec<usize> = (0..lines).map(|_| rng.gen_range(0..nc)).collect();

    // assemble per-leg colour indices
    let mut index_parts: Vec<[usize; 2]> = vec![[0, 0]; n];
    let mut tags = FlowTags {
        colour: vec![0; n],
        anti_colour: vec![0; n],
    };
    for (line, slot) in colour_slots.iter().enumerate() {
        index_parts[slot.leg][slot.position] = values[line];
        tags.colour[slot.leg] = FIRST_COLOUR_TAG + line as i32;
    }
    for (line, slot) in anti_slots.iter().enumerate() {
        let line_of = matching.iter().position(|m| *m == line).expect("matched");
        index_parts[slot.leg][slot.position] = values[line_of];
        tags.anti_colour[slot.leg] = FIRST_COLOUR_TAG + line_of as i32;
    }
    for leg in 0..n {
        let particle = algorithm.particle(leg);
        let dof = particle.colour_dof(nc);
        if dof == 1 {
            continue;
        }
        let index = if dof == nc {
            index_parts[leg][0]
        } else {
            index_parts[leg][0] * nc + index_parts[leg][1]
        };
        algorithm.set_colour(leg, index);
    }
    // outgoing legs carry the physical colour, the conjugate of the
    // equivalent incoming assignment
    for leg in algorithm.n_in()..n {
        std::mem::swap(&mut tags.colour[leg], &mut tags.anti_colour[leg]);
    }

    // weight: matchings times colour values, corrected for coinciding line
    // colours
    let mut multiplicity = vec![0_usize; nc];
    for value in &values {
        multiplicity[*value] += 1;
    }
    let mut weight = (nc as f64).powi(lines as i32);
    for k in 2..=lines {
        weight *= k as f64;
    }
    for count in &multiplicity {
        for k in 2..=*count {
            weight /= k as f64;
        }
    }
    (weight, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn factory_rejects_flow_on_adjoint_models() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        algorithm.add_process("g,g > g,g").unwrap();
        let settings = Settings::default();
        assert!(matches!(
            ColourSampler::from_settings(&settings, &algorithm),
            Err(Error::Degenerate(_))
        ));
    }

    #[test]
    fn flow_assignments_conserve_colour() {
        let model = models::qcd(1.0, 3, true);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        algorithm.add_process("u,ubar > g,g").unwrap();
        let mut sampler = ColourSampler::Flow { warned: false };
        let mut rng = Pcg64::seed_from_u64(47);
        for _ in 0..100 {
            let (weight, tags) = sampler.generate(&mut algorithm, &mut rng);
            assert!(weight > 0.0);
            // every colour tag pairs with exactly one anti-colour tag
            let mut colours: Vec<i32> =
                tags.colour.iter().copied().filter(|t| *t != 0).collect();
            let mut antis: Vec<i32> = tags
                .anti_colour
                .iter()
                .copied()
                .filter(|t| *t != 0)
                .collect();
            colours.sort_unstable();
            antis.sort_unstable();
            assert_eq!(colours, antis);
            assert!(colours.iter().all(|t| *t >= FIRST_COLOUR_TAG));
        }
    }

    #[test]
    fn uniform_weight_is_the_range_product() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        algorithm.add_process("u,ubar > g,g").unwrap();
        let mut sampler = ColourSampler::Uniform;
        let mut rng = Pcg64::seed_from_u64(53);
        let (weight, _) = sampler.generate(&mut algorithm, &mut rng);
        // 3 · 3 · 8 · 8
        assert!((weight - 576.0).abs() < 1e-12);
    }
}
