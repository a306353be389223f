use serde::{Deserialize, Serialize};

/// Equidistant binning of the interval `[min, max)`
#[derive(Deserialize, Serialize, Copy, Clone, Debug, PartialEq)]
pub struct Axis {
    nbins: usize,
    min: f64,
    max: f64,
}

impl Axis {
    pub fn new(nbins: usize, min: f64, max: f64) -> Self {
        assert!(nbins > 0);
        assert!(min < max);
        Self { nbins, min, max }
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.nbins as f64
    }

    /// Index of the bin containing `x`, or `None` for under- and overflow
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(self.min..self.max).contains(&x) {
            return None;
        }
        let bin = ((x - self.min) / self.bin_width()) as usize;
        // guard against rounding at the upper edge
        Some(bin.min(self.nbins - 1))
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 + 0.5) * self.bin_width()
    }
}

/// One-dimensional histogram with under- and overflow counters
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Hist1D {
    name: String,
    axis: Axis,
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
}

impl Hist1D {
    pub fn new(name: impl Into<String>, nbins: usize, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            axis: Axis::new(nbins, min, max),
            bins: vec![0.; nbins],
            underflow: 0.,
            overflow: 0.,
            entries: 0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.entries += 1;
        match self.axis.find_bin(x) {
            Some(bin) => self.bins[bin] += 1.,
            None if x < self.axis.min => self.underflow += 1.,
            None => self.overflow += 1.,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// Two-dimensional histogram without under- and overflow bins
///
/// Entries outside the axis ranges are dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Hist2D {
    x: Axis,
    y: Axis,
    content: Vec<f64>,
}

impl Hist2D {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            content: vec![0.; x.nbins() * y.nbins()],
        }
    }

    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    /// Bin indices containing the point `(x, y)`
    pub fn find_bin(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((self.x.find_bin(x)?, self.y.find_bin(y)?))
    }

    /// Add `w` to the bin with the given indices
    pub fn add(&mut self, (ix, iy): (usize, usize), w: f64) {
        let idx = self.idx(ix, iy);
        self.content[idx] += w;
    }

    pub fn bin_content(&self, ix: usize, iy: usize) -> f64 {
        self.content[self.idx(ix, iy)]
    }

    pub fn reset(&mut self) {
        self.content.iter_mut().for_each(|c| *c = 0.);
    }

    fn idx(&self, ix: usize, iy: usize) -> usize {
        debug_assert!(ix < self.x.nbins() && iy < self.y.nbins());
        ix * self.y.nbins() + iy
    }
}
