//! Damage Table Verification Module
//!
//! Checks a loaded depth-damage table for coverage and consistency before it
//! is used for estimates: which (region, building type) curves exist, whether
//! every curve is non-decreasing in damage, and how many countries with
//! maximum values each region has.
//!
//! Use this after pointing the engine at a new data directory.

use chrono::Utc;
use serde::Serialize;

use crate::damage::regions;
use crate::damage::table::{self, DamageFunctionTable};
use crate::logging::{self, Component};
use crate::model::{BuildingType, Region, Result};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TableVerificationReport {
    pub timestamp: String,
    pub regions: Vec<RegionCoverage>,
    /// Curves whose damage ratio decreases somewhere, as "REGION type".
    pub non_monotonic_curves: Vec<String>,
    pub summary: VerificationSummary,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub entries: usize,
    pub curves_present: usize,
    pub curves_possible: usize,
    pub countries_loaded: usize,
    /// Loaded countries not listed in any region; they are reported under
    /// GLOBAL and only usable with the GLOBAL fallback.
    pub countries_unmapped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionCoverage {
    pub region: Region,
    pub building_types_present: Vec<BuildingType>,
    pub building_types_missing: Vec<BuildingType>,
    pub countries_loaded: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    /// Usable, but some region falls back to GLOBAL for some building type.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Checks
// ============================================================================

fn region_coverage(table: &DamageFunctionTable, region: Region) -> RegionCoverage {
    let (present, missing): (Vec<BuildingType>, Vec<BuildingType>) = BuildingType::ALL
        .into_iter()
        .partition(|bt| table.has_curve(region, *bt));

    let countries_loaded = table
        .countries()
        .filter(|code| regions::region_for_country(code).unwrap_or(Region::Global) == region)
        .count();

    RegionCoverage {
        region,
        building_types_present: present,
        building_types_missing: missing,
        countries_loaded,
    }
}

fn non_monotonic_curves(table: &DamageFunctionTable) -> Vec<String> {
    let mut found: Vec<String> = table
        .curves()
        .filter(|curve| {
            curve
                .points()
                .windows(2)
                .any(|w| w[1].damage_ratio < w[0].damage_ratio)
        })
        .map(|curve| format!("{} {}", curve.region, curve.building_type))
        .collect();
    found.sort();
    found
}

pub fn verify_damage_table(table: &DamageFunctionTable) -> TableVerificationReport {
    let regions: Vec<RegionCoverage> = Region::ALL
        .into_iter()
        .map(|region| region_coverage(table, region))
        .collect();
    let non_monotonic_curves = non_monotonic_curves(table);

    let curves_present: usize = regions.iter().map(|r| r.building_types_present.len()).sum();
    let summary = VerificationSummary {
        entries: table.entry_count(),
        curves_present,
        curves_possible: Region::ALL.len() * BuildingType::ALL.len(),
        countries_loaded: table.country_count(),
        countries_unmapped: regions
            .iter()
            .find(|r| r.region == Region::Global)
            .map_or(0, |r| r.countries_loaded),
    };

    let status = if !non_monotonic_curves.is_empty() || summary.countries_loaded == 0 {
        VerificationStatus::Failed
    } else if summary.curves_present < summary.curves_possible {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Success
    };

    match status {
        VerificationStatus::Success => logging::info(Component::DamageTable, None, "table verification passed"),
        VerificationStatus::PartialSuccess => logging::info(
            Component::DamageTable,
            None,
            &format!(
                "table verification: {}/{} curves present, missing ones fall back to GLOBAL",
                summary.curves_present, summary.curves_possible
            ),
        ),
        VerificationStatus::Failed => logging::error(
            Component::DamageTable,
            None,
            &format!(
                "table verification failed: non-monotonic curves {:?}, {} countries",
                non_monotonic_curves, summary.countries_loaded
            ),
        ),
    }

    TableVerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        regions,
        non_monotonic_curves,
        summary,
        status,
    }
}

/// Verifies the process-wide table.
pub fn verify_global() -> Result<TableVerificationReport> {
    Ok(verify_damage_table(table::global()?))
}

pub fn print_summary(report: &TableVerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 DAMAGE TABLE VERIFICATION");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    for coverage in &report.regions {
        let mark = if coverage.building_types_missing.is_empty() { "✓" } else { "⚠" };
        println!(
            "{} {:<22} {}/{} curves  {:>3} countries",
            mark,
            coverage.region.as_str(),
            coverage.building_types_present.len(),
            BuildingType::ALL.len(),
            coverage.countries_loaded
        );
        if !coverage.building_types_missing.is_empty() {
            let missing: Vec<&str> = coverage.building_types_missing.iter().map(|b| b.as_str()).collect();
            println!("    missing: {}", missing.join(", "));
        }
    }
    println!();
    for curve in &report.non_monotonic_curves {
        println!("✗ Non-monotonic curve: {}", curve);
    }
    println!(
        "Entries: {}  Curves: {}/{}  Countries: {} ({} unmapped)",
        report.summary.entries,
        report.summary.curves_present,
        report.summary.curves_possible,
        report.summary.countries_loaded,
        report.summary.countries_unmapped
    );
    println!("Status: {:?}", report.status);
    println!("═══════════════════════════════════════════════════════════");
}
