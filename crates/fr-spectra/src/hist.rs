//! N-dimensional weighted histograms with under/overflow bins.
//!
//! Bin numbering follows the ROOT convention: along each axis bin 0 is the
//! underflow, bins `1..=n` are in range and bin `n + 1` is the overflow. The
//! global bin is `bx + (nx + 2) * (by + (ny + 2) * bz)`.

use serde::{Deserialize, Serialize};

/// `n` equal-width bins between `min` and `max`, as `n + 1` edges.
pub fn bins(n: usize, min: f64, max: f64) -> Vec<f64> {
    let width = (max - min) / n as f64;
    (0..=n).map(|i| min + i as f64 * width).collect()
}

/// One histogram axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis label.
    pub label: String,
    /// Bin edges (sorted, length = n_bins + 1).
    pub edges: Vec<f64>,
}

impl Axis {
    /// Create an axis.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two edges are given.
    pub fn new(label: impl Into<String>, edges: Vec<f64>) -> Self {
        assert!(edges.len() >= 2, "an axis needs at least two bin edges");
        Self { label: label.into(), edges }
    }

    /// Number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lower edge of the first bin.
    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin holding `val`: 0 for underflow, `n_bins + 1` for overflow.
    ///
    /// Bins are closed on the low edge and open on the high edge. NaN goes to
    /// the underflow bin.
    pub fn find_bin(&self, val: f64) -> usize {
        if val.is_nan() || val < self.min() {
            return 0;
        }
        if val >= self.max() {
            return self.n_bins() + 1;
        }
        // First edge strictly greater than val; the bin is the one before it.
        self.edges.partition_point(|&e| e <= val)
    }

    /// Center of in-range bin `bin` (1-based).
    pub fn bin_center(&self, bin: usize) -> f64 {
        0.5 * (self.edges[bin - 1] + self.edges[bin])
    }
}

/// A weighted histogram of one to three dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name; this is the key it is written under.
    pub name: String,
    /// Histogram title.
    #[serde(default)]
    pub title: String,
    /// Axes, x first.
    pub axes: Vec<Axis>,
    /// Bin contents including under/overflow, indexed by global bin.
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per global bin.
    pub sumw2: Vec<f64>,
    /// Number of fill calls.
    pub entries: f64,
}

impl Histogram {
    /// Empty histogram over `axes`.
    ///
    /// # Panics
    ///
    /// Panics if `axes` is empty.
    pub fn new(name: impl Into<String>, title: impl Into<String>, axes: Vec<Axis>) -> Self {
        assert!(!axes.is_empty(), "a histogram needs at least one axis");
        let n_cells = axes.iter().map(|a| a.n_bins() + 2).product();
        Self {
            name: name.into(),
            title: title.into(),
            axes,
            bin_content: vec![0.0; n_cells],
            sumw2: vec![0.0; n_cells],
            entries: 0.0,
        }
    }

    /// 1D histogram.
    pub fn new_1d(name: impl Into<String>, title: impl Into<String>, x: Axis) -> Self {
        Self::new(name, title, vec![x])
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Axis `i` (0 = x).
    pub fn axis(&self, i: usize) -> &Axis {
        &self.axes[i]
    }

    /// Global bin from per-axis bins.
    ///
    /// # Panics
    ///
    /// Panics if the number of bins does not match the dimension or a bin is
    /// beyond the overflow bin.
    pub fn global_bin(&self, bins: &[usize]) -> usize {
        assert_eq!(bins.len(), self.dim(), "expected {} bin indices", self.dim());
        let mut global = 0;
        let mut stride = 1;
        for (axis, &b) in self.axes.iter().zip(bins) {
            let n = axis.n_bins() + 2;
            assert!(b < n, "bin {b} out of range for axis '{}'", axis.label);
            global += b * stride;
            stride *= n;
        }
        global
    }

    /// Global bin containing `values` (under/overflow included).
    pub fn find_bin(&self, values: &[f64]) -> usize {
        let bins: Vec<usize> =
            self.axes.iter().zip(values).map(|(axis, &v)| axis.find_bin(v)).collect();
        self.global_bin(&bins)
    }

    /// Global bin containing `values`, or `None` if any coordinate falls in
    /// an under/overflow bin.
    pub fn find_in_range_bin(&self, values: &[f64]) -> Option<usize> {
        let mut bins = Vec::with_capacity(self.dim());
        for (axis, &v) in self.axes.iter().zip(values) {
            let b = axis.find_bin(v);
            if b == 0 || b > axis.n_bins() {
                return None;
            }
            bins.push(b);
        }
        Some(self.global_bin(&bins))
    }

    /// Add `weight` at `values` (one value per axis).
    pub fn fill(&mut self, values: &[f64], weight: f64) {
        let bin = self.find_bin(values);
        self.bin_content[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1.0;
    }

    /// Content of the bin given per axis.
    pub fn bin_content_at(&self, bins: &[usize]) -> f64 {
        self.bin_content[self.global_bin(bins)]
    }

    /// Overwrite the content of the bin given per axis.
    pub fn set_bin_content_at(&mut self, bins: &[usize], value: f64) {
        let global = self.global_bin(bins);
        self.bin_content[global] = value;
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        let mut total = 0.0;
        for (global, &c) in self.bin_content.iter().enumerate() {
            if self.is_in_range(global) {
                total += c;
            }
        }
        total
    }

    fn is_in_range(&self, mut global: usize) -> bool {
        for axis in &self.axes {
            let n = axis.n_bins() + 2;
            let b = global % n;
            if b == 0 || b == n - 1 {
                return false;
            }
            global /= n;
        }
        true
    }

    /// Whether `other` has identical binning.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.axes.len() == other.axes.len()
            && self.axes.iter().zip(&other.axes).all(|(a, b)| a.edges == b.edges)
    }

    /// Bin-wise sum of `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the binning differs.
    pub fn add(&mut self, other: &Histogram) {
        assert!(
            self.same_binning(other),
            "cannot add '{}' to '{}': binning differs",
            other.name,
            self.name
        );
        for (a, b) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *a += b;
        }
        for (a, b) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *a += b;
        }
        self.entries += other.entries;
    }

    /// Copy of `self` with a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equal_width_bins() {
        let e = bins(4, 0.0, 2.0);
        assert_eq!(e.len(), 5);
        assert_relative_eq!(e[1], 0.5);
        assert_relative_eq!(e[4], 2.0);
    }

    #[test]
    fn find_bin_edge_cases() {
        let a = Axis::new("x", vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(a.find_bin(-0.5), 0);
        assert_eq!(a.find_bin(0.0), 1);
        assert_eq!(a.find_bin(1.0), 2);
        assert_eq!(a.find_bin(2.99), 3);
        assert_eq!(a.find_bin(3.0), 4);
        assert_eq!(a.find_bin(f64::NAN), 0);
        assert_relative_eq!(a.bin_center(2), 1.5);
    }

    #[test]
    fn fill_1d() {
        let mut h = Histogram::new_1d("h", "", Axis::new("x", vec![0.0, 1.0, 2.0, 3.0]));
        for (x, w) in [(0.5, 1.0), (1.5, 2.0), (2.5, 1.0), (0.5, 1.0), (-1.0, 1.0), (3.5, 1.0)] {
            h.fill(&[x], w);
        }
        assert_eq!(h.bin_content, vec![1.0, 2.0, 2.0, 1.0, 1.0]);
        assert_eq!(h.sumw2[2], 4.0);
        assert_eq!(h.entries, 6.0);
        assert_relative_eq!(h.integral(), 5.0);
    }

    #[test]
    fn fill_2d_global_bins() {
        let mut h = Histogram::new(
            "h2",
            "",
            vec![Axis::new("x", vec![0.0, 1.0, 2.0]), Axis::new("y", vec![0.0, 1.0])],
        );
        assert_eq!(h.bin_content.len(), 4 * 3);
        h.fill(&[1.5, 0.5], 3.0);
        assert_eq!(h.bin_content_at(&[2, 1]), 3.0);
        assert_eq!(h.global_bin(&[2, 1]), 2 + 4);
        assert_relative_eq!(h.integral(), 3.0);
        assert_eq!(h.find_in_range_bin(&[1.5, 0.5]), Some(6));
        assert_eq!(h.find_in_range_bin(&[1.5, 1.5]), None);
    }

    #[test]
    fn add_sums_contents() {
        let axis = Axis::new("x", bins(2, 0.0, 2.0));
        let mut a = Histogram::new_1d("a", "", axis.clone());
        let mut b = Histogram::new_1d("b", "", axis);
        a.fill(&[0.5], 1.0);
        b.fill(&[0.5], 2.0);
        b.fill(&[1.5], 4.0);
        a.add(&b);
        assert_eq!(a.bin_content, vec![0.0, 3.0, 4.0, 0.0]);
        assert_eq!(a.sumw2, vec![0.0, 5.0, 16.0, 0.0]);
        assert_eq!(a.entries, 3.0);
    }

    #[test]
    #[should_panic(expected = "binning differs")]
    fn add_rejects_other_binning() {
        let mut a = Histogram::new_1d("a", "", Axis::new("x", bins(2, 0.0, 2.0)));
        let b = Histogram::new_1d("b", "", Axis::new("x", bins(3, 0.0, 2.0)));
        a.add(&b);
    }
}
