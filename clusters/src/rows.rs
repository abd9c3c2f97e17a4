//! Typed Gaia DR2 catalog rows, quality cuts, and column projection.
//!
//! The cone-search service returns rows with several dozen columns; only the
//! twelve listed here matter to the pipeline, so [`SourceRow`] names exactly
//! those and ignores the rest at parse time. Every field is optional because
//! the service reports missing measurements as JSON nulls, and a null in any
//! relevant column is a quality-cut failure rather than a parse error.

use serde::{Deserialize, Serialize};

/// One raw row from a Gaia DR2 cone search.
///
/// Columns split into two groups: the astrometric/photometric quality
/// indicators consumed by [`SourceRow::passes_quality_cuts`], and the data
/// columns that survive projection into a [`StarRecord`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRow {
    // Data columns.
    pub source_id: Option<i64>,
    pub phot_g_mean_flux: Option<f64>,
    pub phot_g_mean_mag: Option<f64>,
    pub bp_rp: Option<f64>,
    pub bp_g: Option<f64>,
    pub g_rp: Option<f64>,

    // Quality columns.
    pub visibility_periods_used: Option<u32>,
    pub astrometric_excess_noise: Option<f64>,
    pub parallax_over_error: Option<f64>,
    pub phot_g_mean_flux_over_error: Option<f64>,
    pub phot_bp_mean_flux_over_error: Option<f64>,
    pub phot_rp_mean_flux_over_error: Option<f64>,
}

impl SourceRow {
    /// Apply the fixed astrometric/photometric quality cuts.
    ///
    /// A row passes only when every relevant column (quality and data alike)
    /// is present and the six thresholds hold:
    /// `visibility_periods_used >= 9`, `astrometric_excess_noise < 1`,
    /// `parallax_over_error > 10`, `phot_g_mean_flux_over_error > 50`,
    /// `phot_bp_mean_flux_over_error > 20`, `phot_rp_mean_flux_over_error > 20`.
    pub fn passes_quality_cuts(&self) -> bool {
        let (Some(periods), Some(noise), Some(plx), Some(g_err), Some(bp_err), Some(rp_err)) = (
            self.visibility_periods_used,
            self.astrometric_excess_noise,
            self.parallax_over_error,
            self.phot_g_mean_flux_over_error,
            self.phot_bp_mean_flux_over_error,
            self.phot_rp_mean_flux_over_error,
        ) else {
            return false;
        };

        if self.project().is_none() {
            return false;
        }

        periods >= 9 && noise < 1.0 && plx > 10.0 && g_err > 50.0 && bp_err > 20.0 && rp_err > 20.0
    }

    /// Project to the output column set.
    ///
    /// Returns `None` if any data column is null. Quality columns are
    /// dropped; they exist only to gate the row.
    pub fn project(&self) -> Option<StarRecord> {
        Some(StarRecord {
            source_id: self.source_id?,
            phot_g_mean_flux: self.phot_g_mean_flux?,
            phot_g_mean_mag: self.phot_g_mean_mag?,
            bp_rp: self.bp_rp?,
            bp_g: self.bp_g?,
            g_rp: self.g_rp?,
        })
    }
}

/// A filtered, projected catalog row: the pipeline's output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    pub source_id: i64,
    pub phot_g_mean_flux: f64,
    pub phot_g_mean_mag: f64,
    pub bp_rp: f64,
    pub bp_g: f64,
    pub g_rp: f64,
}

/// Filter and project a batch of raw rows, preserving their order.
pub fn select_members(rows: &[SourceRow]) -> Vec<StarRecord> {
    rows.iter()
        .filter(|row| row.passes_quality_cuts())
        .filter_map(SourceRow::project)
        .collect()
}
