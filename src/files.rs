use thiserror::Error;

use crate::api::types::UploadedFile;

pub const MAX_SELECTED: usize = 3;
pub const FILES_PER_PAGE: usize = 5;
pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("You can select maximum 3 files")]
    LimitReached,
    #[error("file {0} is not in the library")]
    UnknownFile(i64),
}

pub fn selected_ids(files: &[UploadedFile]) -> Vec<i64> {
    files.iter().filter(|f| f.is_selected).map(|f| f.id).collect()
}

/// The full selection to send after toggling `file_id`.
pub fn toggle_selection(files: &[UploadedFile], file_id: i64) -> Result<Vec<i64>, SelectionError> {
    let file = files
        .iter()
        .find(|f| f.id == file_id)
        .ok_or(SelectionError::UnknownFile(file_id))?;
    let mut selected = selected_ids(files);

    if file.is_selected {
        selected.retain(|id| *id != file_id);
    } else {
        if selected.len() >= MAX_SELECTED {
            return Err(SelectionError::LimitReached);
        }
        selected.push(file_id);
    }
    Ok(selected)
}

/// Mirror the server's answer to a selection change onto the local list.
pub fn apply_selection(files: &mut [UploadedFile], selected: &[i64]) {
    for file in files.iter_mut() {
        file.is_selected = selected.contains(&file.id);
    }
}

/// Case-insensitive match on filename or description.
pub fn filter_files<'a>(files: &'a [UploadedFile], query: &str) -> Vec<&'a UploadedFile> {
    let query = query.trim().to_lowercase();
    files
        .iter()
        .filter(|f| {
            query.is_empty()
                || f.filename.to_lowercase().contains(&query)
                || f
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&query))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based, clamped into range.
    pub number: usize,
    pub total: usize,
    pub start: usize,
    pub end: usize,
}

pub fn page(len: usize, requested: usize, per_page: usize) -> Page {
    let per_page = per_page.max(1);
    let total = len.div_ceil(per_page).max(1);
    let number = requested.clamp(1, total);
    let start = ((number - 1) * per_page).min(len);
    Page {
        number,
        total,
        start,
        end: (start + per_page).min(len),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Only PDF files are allowed")]
    NotPdf(String),
    #[error("Duplicate file(s) found: {}", .0.join(", "))]
    AllDuplicates(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    /// Indexes into the picked files that should be sent.
    pub accepted: Vec<usize>,
    pub duplicates: Vec<String>,
}

/// Check picked `(name, mime)` pairs against the library. Any non-PDF rejects
/// the whole batch; names already in the library are skipped.
pub fn plan_upload(picked: &[(String, String)], existing: &[UploadedFile]) -> Result<UploadPlan, UploadError> {
    if let Some((name, _)) = picked.iter().find(|(_, mime)| mime != PDF_MIME) {
        return Err(UploadError::NotPdf(name.clone()));
    }

    let mut plan = UploadPlan {
        accepted: Vec::new(),
        duplicates: Vec::new(),
    };
    for (index, (name, _)) in picked.iter().enumerate() {
        if existing.iter().any(|f| &f.filename == name) {
            plan.duplicates.push(name.clone());
        } else {
            plan.accepted.push(index);
        }
    }

    if plan.accepted.is_empty() && !plan.duplicates.is_empty() {
        return Err(UploadError::AllDuplicates(plan.duplicates));
    }
    Ok(plan)
}

pub fn format_file_size(bytes: f64) -> String {
    if bytes <= 0.0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let exp = ((bytes.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = bytes / 1024f64.powi(exp as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exp])
}
