//! Target coordinates and target subsets.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{require_file, AnalysisError, Result};

/// Screen region a label refers to, taken from the label suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScreenRegion {
    Top,
    Bottom,
    /// Labels without a top/bottom suffix, e.g. the validation study distances
    Other,
}

impl ScreenRegion {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.ends_with("bottom") {
            ScreenRegion::Bottom
        } else if label.ends_with("top") {
            ScreenRegion::Top
        } else {
            ScreenRegion::Other
        }
    }
}

/// Target ids to keep for the top and bottom regions.
///
/// `None` keeps every target for that region. Labels in
/// [`ScreenRegion::Other`] are never filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSubset {
    pub top: Option<BTreeSet<u32>>,
    pub bottom: Option<BTreeSet<u32>>,
}

impl TargetSubset {
    /// No filtering
    pub fn all() -> Self {
        Self::default()
    }

    /// Load a subset file: rows of `top|bottom,<id>,<id>,...`.
    ///
    /// This is the format written by the target clusterer. Rows with any
    /// other leading label are ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        require_file(path)?;
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut subset = TargetSubset::default();
        for record in reader.records() {
            let record = record?;
            let Some(label) = record.get(0) else {
                continue;
            };

            let ids = record
                .iter()
                .skip(1)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>()
                        .map_err(|_| AnalysisError::invalid_field("target subset", s))
                })
                .collect::<Result<BTreeSet<u32>>>()?;

            match label.trim().to_lowercase().as_str() {
                "top" => subset.top = Some(ids),
                "bottom" => subset.bottom = Some(ids),
                other => debug!("Ignoring subset row labelled '{}'", other),
            }
        }
        Ok(subset)
    }

    /// Whether any region is restricted
    pub fn is_filtering(&self) -> bool {
        self.top.is_some() || self.bottom.is_some()
    }

    pub fn allows(&self, region: ScreenRegion, target_id: u32) -> bool {
        let ids = match region {
            ScreenRegion::Top => &self.top,
            ScreenRegion::Bottom => &self.bottom,
            ScreenRegion::Other => return true,
        };
        ids.as_ref().map_or(true, |ids| ids.contains(&target_id))
    }
}

/// Target coordinates recorded per screen region.
///
/// The first coordinates seen for a target id are authoritative. Seeing the
/// same id again at a different position means the data file is corrupt.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    regions: BTreeMap<ScreenRegion, BTreeMap<u32, (i64, i64)>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target, or check it against the recorded coordinates.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InconsistentTarget`] when the id is already known in
    /// this region at different coordinates.
    pub fn register(&mut self, region: ScreenRegion, target_id: u32, coords: (i64, i64)) -> Result<()> {
        let targets = self.regions.entry(region).or_default();
        match targets.get(&target_id) {
            Some(&first) if first != coords => Err(AnalysisError::InconsistentTarget {
                target_id,
                first,
                second: coords,
            }),
            Some(_) => Ok(()),
            None => {
                info!("Adding target: {} ({:?})", target_id, region);
                targets.insert(target_id, coords);
                Ok(())
            }
        }
    }

    pub fn get(&self, region: ScreenRegion, target_id: u32) -> Option<(i64, i64)> {
        self.regions.get(&region)?.get(&target_id).copied()
    }

    /// Targets of a region in id order
    pub fn targets(&self, region: ScreenRegion) -> impl Iterator<Item = (u32, (i64, i64))> + '_ {
        self.regions
            .get(&region)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(&id, &coords)| (id, coords)))
    }

    pub fn len(&self) -> usize {
        self.regions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
