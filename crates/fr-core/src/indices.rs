//! Mixed-radix indexing over (flavor, parent, cross section, detector).
//!
//! Think of the flavor index as the units digit, the parent index as the tens
//! digit, the cross-section index as the hundreds digit and the detector index
//! as the thousands digit, except that every digit has its own base:
//!
//! ```text
//! master = flav + par*nFlav + xsec*nFlav*nPar + det*nFlav*nPar*nXSec
//! ```
//!
//! Histogram array positions, histogram names and the combination strides all
//! rely on this digit order.

use serde::{Deserialize, Serialize};

/// The four bases of the index scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Radix {
    /// Number of neutrino flavors.
    pub n_flav: usize,
    /// Number of parents.
    pub n_par: usize,
    /// Number of cross sections.
    pub n_xsec: usize,
    /// Number of detectors.
    pub n_det: usize,
}

impl Radix {
    /// Build from the four collection sizes.
    pub const fn new(n_flav: usize, n_par: usize, n_xsec: usize, n_det: usize) -> Self {
        Self { n_flav, n_par, n_xsec, n_det }
    }

    /// Stride of one parent step.
    pub const fn par_stride(&self) -> usize {
        self.n_flav
    }

    /// Stride of one cross-section step.
    pub const fn xsec_stride(&self) -> usize {
        self.n_flav * self.n_par
    }

    /// Stride of one detector step.
    pub const fn det_stride(&self) -> usize {
        self.n_flav * self.n_par * self.n_xsec
    }

    /// Number of combinations.
    pub const fn max_master(&self) -> usize {
        self.det_stride() * self.n_det
    }

    /// Upper bound (exclusive) of the masters with detector digit `<= det`.
    pub const fn max_master_for(&self, det: usize) -> usize {
        self.det_stride() * (det + 1)
    }

    /// Whether any base is zero, i.e. the combination space is empty.
    pub const fn is_degenerate(&self) -> bool {
        self.max_master() == 0
    }

    /// Encode digits into a master index.
    ///
    /// # Panics
    ///
    /// Panics if a digit is not below its base.
    pub fn encode(&self, idx: Indices) -> usize {
        assert!(
            idx.flav < self.n_flav
                && idx.par < self.n_par
                && idx.xsec < self.n_xsec
                && idx.det < self.n_det,
            "indices {idx:?} out of range for {self:?}"
        );
        idx.flav + idx.par * self.par_stride() + idx.xsec * self.xsec_stride()
            + idx.det * self.det_stride()
    }

    /// Decode a master index into digits, `None` when out of range.
    pub fn decode(&self, master: usize) -> Option<Indices> {
        if master >= self.max_master() {
            return None;
        }
        let det = master / self.det_stride();
        let rem = master - det * self.det_stride();
        let xsec = rem / self.xsec_stride();
        let rem = rem - xsec * self.xsec_stride();
        let par = rem / self.par_stride();
        let flav = rem - par * self.par_stride();
        Some(Indices { flav, par, xsec, det })
    }

    /// Finite iteration over every combination, in master order.
    pub fn iter(&self) -> RadixIter {
        RadixIter { radix: *self, next: 0 }
    }
}

/// Digits of one combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Indices {
    /// Flavor digit.
    pub flav: usize,
    /// Parent digit.
    pub par: usize,
    /// Cross-section digit.
    pub xsec: usize,
    /// Detector digit.
    pub det: usize,
}

impl Indices {
    /// Build from the four digits.
    pub const fn new(flav: usize, par: usize, xsec: usize, det: usize) -> Self {
        Self { flav, par, xsec, det }
    }

    /// Advance by one combination: flavor first, carrying into parent, cross
    /// section, then detector.
    ///
    /// Once the detector digit reaches `radix.n_det` (one past the last
    /// combination) further calls do nothing. Returns whether the digits moved.
    pub fn increment(&mut self, radix: &Radix) -> bool {
        if self.det >= radix.n_det {
            return false;
        }

        self.flav += 1;
        if self.flav >= radix.n_flav {
            self.flav = 0;
            self.par += 1;
        }
        if self.par >= radix.n_par {
            self.par = 0;
            self.xsec += 1;
        }
        if self.xsec >= radix.n_xsec {
            self.xsec = 0;
            self.det += 1;
        }
        true
    }
}

/// Iterator returned by [`Radix::iter`].
#[derive(Debug, Clone)]
pub struct RadixIter {
    radix: Radix,
    next: usize,
}

impl Iterator for RadixIter {
    type Item = (usize, Indices);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.radix.decode(self.next)?;
        let master = self.next;
        self.next += 1;
        Some((master, idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.radix.max_master().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for RadixIter {}
