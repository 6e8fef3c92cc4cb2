//! Concrete model builders.
//!
//! Models are ordinary [`Model`] values assembled by plain functions; a
//! driver wanting another theory registers its own particles and vertices
//! through the same calls used here.

use crate::colour::{ColourRep, ColourStructure};
use crate::lorentz::LorentzStructure;
use crate::model::{Model, ParticleSpec};
use crate::tensor::Amplitude;

/// Quark flavour table: name, anti-name and PDG id.
const QUARKS: [(&str, &str, i32); 6] = [
    ("d", "dbar", 1),
    ("u", "ubar", 2),
    ("s", "sbar", 3),
    ("c", "cbar", 4),
    ("b", "bbar", 5),
    ("t", "tbar", 6),
];

/// Builds QCD with `nc` colours and coupling constant `g_s`.
///
/// The model carries the gluon, six quark flavours, the quark-gluon
/// vertices, the triple-gluon vertex and the four-gluon contact vertex,
/// plus the families `q`, `qbar` and `j` (all partons). `colour_flow`
/// selects the colour-flow decomposition.
///
/// # Panics
///
/// Panics if the hard-coded vertex tables fail to register, which would be
/// a defect in this builder.
#[must_use]
pub fn qcd(g_s: f64, nc: usize, colour_flow: bool) -> Model {
    let mut model = Model::new("QCD", nc, colour_flow);
    let adjoint = model.adjoint_rep();
    model.add_particle(&ParticleSpec::new("g", 21).spin2(2).colour(adjoint));
    for (name, anti_name, pdg_id) in QUARKS {
        model.add_particle_pair(
            &ParticleSpec::new(name, pdg_id)
                .fermion(1)
                .colour(ColourRep::Fundamental),
            anti_name,
        );
    }

    // i g_s ψ̄ γ^μ Tᵃ ψ A_μ
    for (name, anti_name, _) in QUARKS {
        model
            .add_vertex(
                &["g", anti_name, name],
                LorentzStructure::VectorFermion,
                ColourStructure::Generator {
                    adjoint: 0,
                    row: 1,
                    col: 2,
                },
                vec![Amplitude::new(0.0, g_s)],
            )
            .expect("quark-gluon vertex");
    }
    // g_s f^{abc} [g^{μν}(p−q)^ρ + cyclic]
    model
        .add_vertex(
            &["g", "g", "g"],
            LorentzStructure::TripleVector,
            ColourStructure::StructureConstants,
            vec![Amplitude::new(g_s, 0.0)],
        )
        .expect("triple-gluon vertex");
    // −i g_s² [f^{abe}f^{cde}(g^{μρ}g^{νσ} − g^{μσ}g^{νρ}) + pairings]
    model
        .add_vertex(
            &["g", "g", "g", "g"],
            LorentzStructure::QuarticVector,
            ColourStructure::DoubleStructureConstants,
            vec![Amplitude::new(0.0, -g_s * g_s)],
        )
        .expect("four-gluon vertex");

    let quark_names: Vec<&str> = QUARKS.iter().map(|(name, _, _)| *name).collect();
    let anti_names: Vec<&str> = QUARKS.iter().map(|(_, anti, _)| *anti).collect();
    let mut parton_names = vec!["g"];
    parton_names.extend(&quark_names);
    parton_names.extend(&anti_names);
    model.construct_family("q", &quark_names).expect("q family");
    model
        .construct_family("qbar", &anti_names)
        .expect("qbar family");
    model
        .construct_family("j", &parton_names)
        .expect("j family");
    model
}

/// Builds a colourless toy model: a real scalar with cubic and quartic
/// self-couplings, a Dirac fermion with a Yukawa coupling, and a Majorana
/// fermion exercising every fermion-flow case of the vertex dispatch.
///
/// # Panics
///
/// Panics if the hard-coded vertex tables fail to register.
#[must_use]
pub fn toy(lambda: f64, yukawa: f64) -> Model {
    let mut model = Model::new("toy", 3, false);
    model.add_particle(&ParticleSpec::new("phi", 25).mass(10.0).width(0.1));
    model.add_particle_pair(&ParticleSpec::new("psi", 11).fermion(1).mass(1.0), "psibar");
    model.add_particle(&ParticleSpec::new("chi", 32).majorana().mass(5.0));

    let coupling = vec![Amplitude::new(0.0, -lambda)];
    model
        .add_vertex(
            &["phi", "phi", "phi"],
            LorentzStructure::ScalarCubic,
            ColourStructure::None,
            coupling.clone(),
        )
        .expect("phi cubic vertex");
    model
        .add_vertex(
            &["phi", "phi", "phi", "phi"],
            LorentzStructure::ScalarQuartic,
            ColourStructure::None,
            coupling,
        )
        .expect("phi quartic vertex");
    let y = vec![Amplitude::new(0.0, -yukawa)];
    model
        .add_vertex(
            &["phi", "psibar", "psi"],
            LorentzStructure::Yukawa,
            ColourStructure::None,
            y.clone(),
        )
        .expect("Dirac Yukawa vertex");
    model
        .add_vertex(
            &["phi", "psibar", "chi"],
            LorentzStructure::Yukawa,
            ColourStructure::None,
            y.clone(),
        )
        .expect("mixed Yukawa vertex");
    // hermitian-conjugate orientation of the mixed coupling
    model
        .add_vertex(
            &["phi", "chi", "psi"],
            LorentzStructure::Yukawa,
            ColourStructure::None,
            y.clone(),
        )
        .expect("conjugate mixed Yukawa vertex");
    model
        .add_vertex(
            &["phi", "chi", "chi"],
            LorentzStructure::Yukawa,
            ColourStructure::None,
            y,
        )
        .expect("Majorana Yukawa vertex");
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qcd_has_the_expected_content() {
        let model = qcd(1.2, 3, false);
        assert_eq!(model.particle_count(), 13);
        assert_eq!(model.vertices().len(), 8);
        assert_eq!(model.nc(), 3);
        assert!(!model.colour_flow());
        let gluon = model.get_particle("g").unwrap();
        assert_eq!(gluon.colour_dof(3), 8);
        assert_eq!(gluon.anti_flavour(), gluon.flavour());
    }

    #[test]
    fn flow_qcd_uses_the_pair_basis() {
        let model = qcd(1.2, 3, true);
        let gluon = model.get_particle("g").unwrap();
        assert_eq!(gluon.colour_dof(3), 9);
        assert_eq!(gluon.colour_type(0), 1);
        assert_eq!(gluon.colour_type(1), -1);
    }

    #[test]
    fn toy_model_covers_all_majorana_types() {
        let model = toy(0.1, 0.2);
        let types: Vec<u8> = model
            .vertices()
            .iter()
            .map(|vertex| vertex.majorana_type)
            .collect();
        assert_eq!(types, vec![0, 0, 0, 1, 2, 3]);
    }
}
