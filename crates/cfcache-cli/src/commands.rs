// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write as _;

use cfcache::{CacheConfig, ReconcileReport};
use cfcache_core::ExitCode;
use cfcache_model::{IndexEntry, Support};
use cfcache_store::{MetadataStore, PersistentKernelStore, StoreError};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{emit_ok, CliError, OutputMode};

#[derive(Debug, Serialize)]
struct EntryRow {
    id: u32,
    angle_deg: f64,
    angle_rad: f64,
    supports: Vec<Support>,
    sampling: f64,
}

impl From<IndexEntry> for EntryRow {
    fn from(entry: IndexEntry) -> Self {
        Self {
            id: entry.id.get(),
            angle_deg: entry.angle_deg(),
            angle_rad: entry.angle_rad,
            supports: entry.supports,
            sampling: entry.sampling,
        }
    }
}

fn open_read_only(
    config: &CacheConfig,
) -> Result<(MetadataStore, PersistentKernelStore), StoreError> {
    let metadata = MetadataStore::open_existing(&config.root)?;
    let kernels = PersistentKernelStore::new(&config.root, &config.plane_prefix)?
        .with_aggregate_name(&config.aggregate_name)?;
    Ok((metadata, kernels))
}

fn render_findings(out: &mut String, report: &ReconcileReport) {
    let ids = |ids: &[cfcache_model::CacheEntryId]| {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    let _ = writeln!(out, "stale tail: [{}]", ids(&report.stale_tail));
    let _ = writeln!(out, "incomplete: [{}]", ids(&report.incomplete));
    let _ = writeln!(out, "orphan plane files: {}", report.orphans.len());
    for orphan in &report.orphans {
        let _ = writeln!(out, "  plane {} of entry {}", orphan.plane, orphan.id);
    }
}

pub(crate) fn inspect(
    config: &CacheConfig,
    output_mode: OutputMode,
) -> Result<ExitCode, CliError> {
    let (metadata, kernels) = open_read_only(config)?;
    let report = metadata.inspect(&kernels)?;
    let plane_files = kernels.list_plane_files()?.len();
    let aggregate_present = kernels.aggregate_exists();
    let index = metadata.index();
    let entries: Vec<EntryRow> = index.entries().map(EntryRow::from).collect();
    info!(
        root = %config.root.display(),
        entries = entries.len(),
        plane_files,
        "cache root inspected"
    );

    let payload = json!({
        "root": config.root.display().to_string(),
        "plane_prefix": config.plane_prefix,
        "entry_count": index.entry_count(),
        "plane_count": index.plane_count(),
        "plane_files": plane_files,
        "aggregate_present": aggregate_present,
        "entries": &entries,
        "findings": &report,
    });

    let mut text = String::new();
    let _ = writeln!(text, "root: {}", config.root.display());
    let _ = writeln!(
        text,
        "entries: {}  planes per entry: {}  plane files: {}",
        index.entry_count(),
        index.plane_count(),
        plane_files
    );
    let _ = writeln!(
        text,
        "aggregate ({}): {}",
        config.aggregate_name,
        if aggregate_present { "present" } else { "absent" }
    );
    for row in &entries {
        let supports = row
            .supports
            .iter()
            .map(|s| format!("{}x{}", s.x(), s.y()))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            text,
            "  {:>4}  {:>10.4} deg  sampling {:<6}  supports {}",
            row.id, row.angle_deg, row.sampling, supports
        );
    }
    if !report.is_clean() {
        render_findings(&mut text, &report);
    }
    emit_ok(output_mode, &payload, &text)?;
    Ok(ExitCode::Success)
}

/// Exits with [`ExitCode::Validation`] when the root needs reconciliation.
pub(crate) fn verify(
    config: &CacheConfig,
    output_mode: OutputMode,
) -> Result<ExitCode, CliError> {
    let (metadata, kernels) = open_read_only(config)?;
    let report = metadata.inspect(&kernels)?;
    let clean = report.is_clean();
    info!(root = %config.root.display(), clean, "cache root verified");

    let payload = json!({
        "root": config.root.display().to_string(),
        "status": if clean { "clean" } else { "findings" },
        "report": &report,
    });
    let mut text = format!(
        "{}: {}\n",
        config.root.display(),
        if clean { "clean" } else { "needs reconciliation" }
    );
    if !clean {
        render_findings(&mut text, &report);
    }
    emit_ok(output_mode, &payload, &text)?;
    if clean {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::Validation)
    }
}
