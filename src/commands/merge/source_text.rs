use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

use super::types::FormatHint;

pub(crate) const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

pub(crate) fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Plain text of one source document: `.txt` files as-is, `.pdf` files
/// through `pdftotext`. Tabular reports keep their column layout so the
/// delimiter strategy sees cells separated by runs of spaces.
pub(crate) fn extract_text(path: &Path, format_hint: FormatHint) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        return extract_text_with_pdftotext(path, format_hint);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn pdftotext_args(pdf_path: &Path, format_hint: FormatHint) -> Vec<OsString> {
    let mut args = Vec::with_capacity(5);
    if format_hint == FormatHint::Tabular {
        args.push(OsString::from("-layout"));
    }
    args.push(OsString::from("-enc"));
    args.push(OsString::from("UTF-8"));
    args.push(pdf_path.as_os_str().to_owned());
    args.push(OsString::from("-"));
    args
}

fn extract_text_with_pdftotext(pdf_path: &Path, format_hint: FormatHint) -> Result<String> {
    let output = Command::new("pdftotext")
        .args(pdftotext_args(pdf_path, format_hint))
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    Ok(raw
        .split('\u{000C}')
        .map(|page| page.replace('\u{0000}', ""))
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<String>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdftotext_keeps_layout_only_for_tabular_reports() {
        let path = Path::new("Labcorp_20250306.pdf");

        assert_eq!(
            pdftotext_args(path, FormatHint::Tabular),
            vec!["-layout", "-enc", "UTF-8", "Labcorp_20250306.pdf", "-"]
        );
        assert_eq!(
            pdftotext_args(path, FormatHint::ScanReport),
            vec!["-enc", "UTF-8", "Labcorp_20250306.pdf", "-"]
        );
    }

    #[test]
    fn text_documents_are_read_lossily() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.txt");
        fs::write(&path, b"Component\n\xffSodium\n").expect("write");

        let text = extract_text(&path, FormatHint::ScanReport).expect("text");
        assert_eq!(text, "Component\n\u{fffd}Sodium\n");
    }
}
