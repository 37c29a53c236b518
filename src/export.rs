use crate::report::{ReportPage, SemesterTable};
use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const EXPORT_FORMAT_V1: &str = "gradebook-export-v1";

#[derive(Debug, Error)]
#[error("export cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub state: JobState,
    pub pages_done: usize,
    pub page_count: usize,
    pub message: String,
    pub out_path: String,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// Spreads spanned header cells over a rectangular grid so every CSV line
// has the same width as the body rows.
fn header_grid(table: &SemesterTable) -> Vec<Vec<String>> {
    let width = table.columns.len() + 2;
    let height = table.header_rows.len();
    let mut grid = vec![vec![String::new(); width]; height];
    let mut taken = vec![vec![false; width]; height];

    for (r, row) in table.header_rows.iter().enumerate() {
        let mut c = 0;
        for cell in row {
            while c < width && taken[r][c] {
                c += 1;
            }
            if c >= width {
                break;
            }
            grid[r][c] = cell.label.clone();
            for rr in r..(r + cell.row_span).min(height) {
                for cc in c..(c + cell.col_span).min(width) {
                    taken[rr][cc] = true;
                }
            }
            c += cell.col_span;
        }
    }
    grid
}

pub fn page_csv(page: &ReportPage) -> String {
    let mut out = String::from("\u{feff}");
    for line in header_grid(&page.table) {
        let fields: Vec<String> = line.iter().map(|s| csv_quote(s)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    for row in &page.table.rows {
        let mut fields = vec![row.number.to_string(), csv_quote(&row.name)];
        fields.extend(row.cells.iter().map(|c| c.as_text()));
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn page_entry_name(page: &ReportPage) -> String {
    format!("pages/page-{:03}.csv", page.page_index + 1)
}

fn partial_path(out_path: &Path) -> PathBuf {
    let mut p = out_path.as_os_str().to_owned();
    p.push(".partial");
    PathBuf::from(p)
}

/// Writes every page plus a manifest into a zip bundle. The bundle only
/// appears at `out_path` once complete; on error or cancellation nothing is
/// left behind.
pub fn write_bundle<F>(
    pages: &[ReportPage],
    out_path: &Path,
    cancel: &AtomicBool,
    mut on_page: F,
) -> anyhow::Result<ExportSummary>
where
    F: FnMut(usize, usize),
{
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }

    let tmp = partial_path(out_path);
    let result = write_bundle_to(pages, &tmp, cancel, &mut on_page).and_then(|summary| {
        std::fs::rename(&tmp, out_path).with_context(|| {
            format!("failed to move bundle to {}", out_path.to_string_lossy())
        })?;
        Ok(summary)
    });
    if result.is_err() && tmp.exists() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_bundle_to(
    pages: &[ReportPage],
    tmp: &Path,
    cancel: &AtomicBool,
    on_page: &mut dyn FnMut(usize, usize),
) -> anyhow::Result<ExportSummary> {
    let file = File::create(tmp)
        .with_context(|| format!("failed to create output file {}", tmp.to_string_lossy()))?;
    let mut zip = ZipWriter::new(file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let total = pages.len();
    let mut entries = Vec::with_capacity(total);
    for (i, page) in pages.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            return Err(Cancelled.into());
        }
        let name = page_entry_name(page);
        let body = page_csv(page);
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write entry {}", name))?;
        entries.push(json!({
            "entry": name,
            "semester": page.semester,
            "chunkIndex": page.chunk_index,
            "title": page.table.title,
            "rows": page.table.rows.len(),
            "sha256": format!("{:x}", Sha256::digest(body.as_bytes())),
        }));
        on_page(i + 1, total);
    }

    let orientation = pages.first().map(|p| p.orientation.as_str()).unwrap_or("");
    let manifest = json!({
        "format": EXPORT_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "orientation": orientation,
        "pageCount": total,
        "info": pages.first().map(|p| json!(p.table.info)),
        "pages": entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: EXPORT_FORMAT_V1.to_string(),
        entry_count: total + 1,
    })
}

/// A background export over a snapshot of the record's pages.
pub struct ExportJob {
    pub id: String,
    progress: Arc<Mutex<ExportProgress>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn update(progress: &Mutex<ExportProgress>, f: impl FnOnce(&mut ExportProgress)) {
    let mut guard = match progress.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

impl ExportJob {
    pub fn spawn(id: String, pages: Vec<ReportPage>, out_path: PathBuf) -> Self {
        let page_count = pages.len();
        let progress = Arc::new(Mutex::new(ExportProgress {
            state: JobState::Running,
            pages_done: 0,
            page_count,
            message: format!("preparing {} pages", page_count),
            out_path: out_path.to_string_lossy().to_string(),
        }));
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_progress = Arc::clone(&progress);
        let worker_cancel = Arc::clone(&cancel);
        let job_id = id.clone();
        let handle = std::thread::spawn(move || {
            let result = write_bundle(&pages, &out_path, &worker_cancel, |done, total| {
                update(&worker_progress, |p| {
                    p.pages_done = done;
                    p.message = format!("page {} of {}", done, total);
                });
            });
            match result {
                Ok(summary) => {
                    info!(
                        job = %job_id,
                        format = %summary.bundle_format,
                        entries = summary.entry_count,
                        "export completed"
                    );
                    update(&worker_progress, |p| {
                        p.state = JobState::Completed;
                        p.message = format!("exported {} pages", p.page_count);
                    });
                }
                Err(e) if e.downcast_ref::<Cancelled>().is_some() => {
                    info!(job = %job_id, "export cancelled");
                    update(&worker_progress, |p| {
                        p.state = JobState::Cancelled;
                        p.message = "export cancelled".to_string();
                    });
                }
                Err(e) => {
                    warn!(job = %job_id, error = %format!("{e:#}"), "export failed");
                    update(&worker_progress, |p| {
                        p.state = JobState::Failed;
                        p.message = format!("{e:#}");
                    });
                }
            }
        });

        Self {
            id,
            progress,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn progress(&self) -> ExportProgress {
        match self.progress.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Blocks until the worker exits.
    #[cfg(test)]
    pub fn wait(&mut self) -> ExportProgress {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        self.progress()
    }
}
