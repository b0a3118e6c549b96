// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Region registry and layout fingerprint.
//!
//! A [`Region`] is caller-owned memory identified by a short description;
//! a [`RegionSet`] is the ordered, frozen collection of every region
//! registered during the single initialization phase. Rather than a raw
//! pointer (as the original source holds), the live bytes for a region
//! are supplied by the host at each call site as a borrowed slice — this
//! keeps the whole crate free of `unsafe` while preserving the
//! pointer-plus-length semantics the spec describes.

use tracing::warn;

use crate::error::{CoreError, Result};
use crate::hash::{to_hex_upper, FlexHash};

/// Regions may not exceed this count; exceeding it rejects the
/// *registration* atomically (spec §9, open question 4: no partial byte
/// accounting on overflow).
pub const MAX_REGIONS: usize = 1024;

/// One registered memory region: its identifying description and its
/// fixed byte length. The tuple is immutable once registration ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub description: String,
    pub length: usize,
}

/// Builder used during the single initialization phase. Registration is
/// additive, ordered, and enforced to happen only before [`RegionRegistry::seal`]
/// is called — attempts afterward are logged and rejected rather than
/// panicking (spec §7: precondition misuse).
pub struct RegionRegistry {
    regions: Vec<Region>,
    total_bytes: usize,
    sealed: bool,
    max_regions: usize,
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self { regions: Vec::new(), total_bytes: 0, sealed: false, max_regions: MAX_REGIONS }
    }
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry whose count ceiling is `max_regions` instead of
    /// the hard [`MAX_REGIONS`] cap — the tunable behind
    /// `RecorderConfig::max_regions` (spec §3: `count ≤ 1024` is the
    /// ceiling, not a fixed value).
    pub fn with_max_regions(max_regions: usize) -> Self {
        Self { max_regions, ..Self::default() }
    }

    /// Register one region. Fails without mutating any state if the
    /// registry is already sealed, or if adding this region would push
    /// the count past this registry's configured ceiling.
    pub fn register(&mut self, description: &str, length: usize) -> Result<()> {
        if self.sealed {
            warn!(description, "register() called after initialization phase ended");
            return Err(CoreError::Precondition(
                "region registration attempted outside the initialization phase".into(),
            ));
        }
        if self.regions.len() + 1 > self.max_regions {
            warn!(
                description,
                count = self.regions.len(),
                max_regions = self.max_regions,
                "region registration rejected: count would exceed max_regions"
            );
            return Err(CoreError::Capacity(format!(
                "region count would exceed {}",
                self.max_regions
            )));
        }
        self.regions.push(Region { description: description.to_string(), length });
        self.total_bytes += length;
        Ok(())
    }

    /// Freeze the registry into a [`RegionSet`]. No further registration
    /// is possible afterward.
    pub fn seal(mut self) -> RegionSet {
        self.sealed = true;
        RegionSet { regions: self.regions, total_bytes: self.total_bytes }
    }
}

/// The ordered, frozen region list for one run, plus its byte-sum side
/// output. Diff recording degrades to full-snapshot-only when
/// `total_bytes` exceeds the recorder's configured capacity (checked by
/// the caller, see [`crate::recorder::Recorder::new`]).
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    total_bytes: usize,
}

impl RegionSet {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn count(&self) -> usize {
        self.regions.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Fixed-width (10-byte) FlexHash over the registered descriptions,
    /// rendered as uppercase hex.
    ///
    /// Each description is length-prefixed (by its caller-visible byte
    /// length, not counting any terminator) before being fed into the
    /// hash stream — spec §3 describes this informally as a plain
    /// concatenation `D0‖D1‖…`, but §4.2 is explicit that each
    /// description is length-prefixed; this resolves the ambiguity in
    /// favor of §4.2, since an unprefixed concatenation would let
    /// differently-split description sets collide (`"ab","c"` vs.
    /// `"a","bc"`).
    pub fn fingerprint(&self) -> String {
        let mut h = FlexHash::init(10);
        for region in &self.regions {
            let len = region.description.len() as u32;
            h.add(&len.to_be_bytes());
            h.add(region.description.as_bytes());
        }
        to_hex_upper(h.finish())
    }

    /// True iff this RegionSet matches the stored metadata exactly:
    /// same count, same total bytes, and identical per-region
    /// `(description, length)` pairs in order. Used by restore to check
    /// independently of the fingerprint (spec §9, open question 2: both
    /// checks are kept, not merged).
    pub fn matches_metadata(&self, count: usize, total_bytes: usize, regions: &[Region]) -> bool {
        self.regions.len() == count
            && self.total_bytes == total_bytes
            && self.regions.as_slice() == regions
    }
}

/// Borrowed view over the live bytes of every registered region, supplied
/// by the host in registration order. The core treats these as one
/// logical concatenation for diffing purposes (spec §3, `DiffFrame`).
pub struct LiveRegions<'a> {
    slices: Vec<&'a mut [u8]>,
}

impl<'a> LiveRegions<'a> {
    /// Build a view, checking that `slices` matches `set` in count and
    /// per-region length.
    pub fn new(set: &RegionSet, slices: Vec<&'a mut [u8]>) -> Result<Self> {
        if slices.len() != set.count() {
            return Err(CoreError::Precondition(format!(
                "expected {} live regions, got {}",
                set.count(),
                slices.len()
            )));
        }
        for (region, slice) in set.regions().iter().zip(slices.iter()) {
            if slice.len() != region.length {
                return Err(CoreError::Precondition(format!(
                    "region '{}' expected {} bytes, got {}",
                    region.description,
                    region.length,
                    slice.len()
                )));
            }
        }
        Ok(Self { slices })
    }

    /// Concatenate every region's current bytes into one logical buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        let total: usize = self.slices.iter().map(|s| s.len()).sum();
        let mut out = Vec::with_capacity(total);
        for s in &self.slices {
            out.extend_from_slice(s);
        }
        out
    }

    /// Scatter a logical concatenation back into each region in order.
    /// `bytes.len()` must equal the sum of all region lengths.
    pub fn apply(&mut self, bytes: &[u8]) -> Result<()> {
        let total: usize = self.slices.iter().map(|s| s.len()).sum();
        if bytes.len() != total {
            return Err(CoreError::Integrity(format!(
                "apply() expected {total} bytes, got {}",
                bytes.len()
            )));
        }
        let mut offset = 0;
        for s in self.slices.iter_mut() {
            let len = s.len();
            s.copy_from_slice(&bytes[offset..offset + len]);
            offset += len;
        }
        Ok(())
    }
}
