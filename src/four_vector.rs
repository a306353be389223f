use jetty::PseudoJet;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

/// A basic four-vector
///
/// The zero component is the energy component. The remainder are the
/// spatial components `px, py, pz`.
#[derive(
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Clone,
    Copy,
    Default,
)]
pub struct FourVector {
    p: [N64; 4],
}

impl FourVector {
    /// Construct a new null vector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn e(&self) -> N64 {
        self.p[0]
    }

    pub fn px(&self) -> N64 {
        self.p[1]
    }

    pub fn py(&self) -> N64 {
        self.p[2]
    }

    pub fn pz(&self) -> N64 {
        self.p[3]
    }

    /// The scalar transverse momentum
    pub fn pt(&self) -> N64 {
        (self.px() * self.px() + self.py() * self.py()).sqrt()
    }

    /// Whether all components vanish
    pub fn is_null(&self) -> bool {
        self.p.iter().all(|p| *p == 0.)
    }
}

impl From<[N64; 4]> for FourVector {
    fn from(p: [N64; 4]) -> FourVector {
        FourVector { p }
    }
}

impl std::ops::Index<usize> for FourVector {
    type Output = N64;

    fn index(&self, i: usize) -> &Self::Output {
        &self.p[i]
    }
}

impl std::ops::AddAssign for FourVector {
    fn add_assign(&mut self, rhs: FourVector) {
        for (p, q) in self.p.iter_mut().zip(rhs.p) {
            *p += q
        }
    }
}

impl std::ops::Add for FourVector {
    type Output = Self;

    fn add(mut self, rhs: FourVector) -> Self::Output {
        self += rhs;
        self
    }
}

impl std::iter::Sum for FourVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), std::ops::Add::add)
    }
}

impl From<PseudoJet> for FourVector {
    fn from(p: PseudoJet) -> Self {
        [p.e(), p.px(), p.py(), p.pz()].into()
    }
}

impl From<FourVector> for PseudoJet {
    fn from(p: FourVector) -> Self {
        (&p).into()
    }
}

impl From<&FourVector> for PseudoJet {
    fn from(p: &FourVector) -> Self {
        [p[0], p[1], p[2], p[3]].into()
    }
}
