use std::{
    fmt::{self, Display},
    str::FromStr,
};

use jetty::{anti_kt_f, cambridge_aachen_f, kt_f, Cluster, PseudoJet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hit::Jet;

/// Placeholder for an unknown jet algorithm
#[derive(Debug, Clone, Error)]
pub struct UnknownJetAlgorithm(String);

impl Display for UnknownJetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown jet algorithm: {}", self.0)
    }
}

impl FromStr for JetAlgorithm {
    type Err = UnknownJetAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anti_kt" | "antikt" | "anti-kt" => Ok(Self::AntiKt),
            "kt" => Ok(Self::Kt),
            "Cambridge/Aachen" | "Cambridge-Aachen" | "Cambridge_Aachen"
            | "cambridge/aachen" | "cambridge-aachen" | "cambridge_aachen" => {
                Ok(Self::CambridgeAachen)
            }
            _ => Err(UnknownJetAlgorithm(s.to_string())),
        }
    }
}

/// Jet clustering algorithms
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum JetAlgorithm {
    /// The [anti-kt](https://arxiv.org/abs/0802.1189) algorithm
    #[default]
    AntiKt,
    /// The [Cambridge](https://arxiv.org/abs/hep-ph/9707323)/[Aachen](https://arxiv.org/abs/hep-ph/9907280) algorithm
    CambridgeAachen,
    /// The [kt](https://arxiv.org/abs/hep-ph/9305266) algorithm
    Kt,
}

/// Definition of a jet
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub struct JetDefinition {
    /// Jet algorithm
    pub algorithm: JetAlgorithm,
    /// Jet radius parameter
    pub radius: f64,
    /// Minimum jet transverse momentum
    pub min_pt: f64,
}

impl Default for JetDefinition {
    fn default() -> Self {
        Self {
            algorithm: JetAlgorithm::AntiKt,
            radius: 0.5,
            min_pt: 0.,
        }
    }
}

/// Cluster the given `inputs` into jets
///
/// Jets are returned in order of decreasing transverse momentum.
pub fn cluster(
    inputs: Vec<PseudoJet>,
    jet_def: &JetDefinition,
) -> Vec<PseudoJet> {
    let minpt2 = jet_def.min_pt * jet_def.min_pt;
    let cut = |jet: PseudoJet| jet.pt2() > minpt2;
    let r = jet_def.radius;
    let mut jets = match jet_def.algorithm {
        JetAlgorithm::AntiKt => inputs.cluster_if(anti_kt_f(r), cut),
        JetAlgorithm::Kt => inputs.cluster_if(kt_f(r), cut),
        JetAlgorithm::CambridgeAachen => {
            inputs.cluster_if(cambridge_aachen_f(r), cut)
        }
    };
    jets.sort_unstable_by(|a, b| b.pt2().cmp(&a.pt2()));
    jets
}

/// Cluster the given `inputs` and convert the result to output jets
pub fn find_jets(inputs: Vec<PseudoJet>, jet_def: &JetDefinition) -> Vec<Jet> {
    if inputs.is_empty() {
        return Vec::new();
    }
    cluster(inputs, jet_def).iter().map(Jet::from).collect()
}
