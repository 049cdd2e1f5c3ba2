//! Converter Implementations
//!
//! LibreOfficeを使った変換の実装。

use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::FormatConverter;
use crate::error::MergeError;

/// LibreOffice（`soffice`）のヘッドレスモードでPDFに変換する
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::{FormatConverter, SofficeConverter};
/// use std::path::Path;
///
/// # fn main() -> Result<(), docxmerge::MergeError> {
/// let converter = SofficeConverter::new().with_program("/usr/bin/libreoffice");
/// converter.convert_dir(Path::new("out/.temp"), Path::new("out"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: OsString,
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl SofficeConverter {
    /// `PATH`上の`soffice`を使う
    pub fn new() -> Self {
        Self {
            program: OsString::from("soffice"),
        }
    }

    /// 実行ファイルを指定する
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }
}

/// ディレクトリ直下の`.docx`ファイル（名前順）
pub(crate) fn docx_files(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_docx = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("docx"))
            .unwrap_or(false);
        if is_docx && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl FormatConverter for SofficeConverter {
    fn convert_dir(&self, source_dir: &Path, dest_dir: &Path) -> Result<(), MergeError> {
        let files = docx_files(source_dir)?;
        if files.is_empty() {
            debug!("No documents to convert in {}", source_dir.display());
            return Ok(());
        }

        info!(
            "Converting {} document(s) to PDF with {}",
            files.len(),
            self.program.to_string_lossy()
        );

        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(dest_dir)
            .args(&files)
            .output()
            .map_err(|e| {
                MergeError::Conversion(format!(
                    "Failed to launch '{}': {}",
                    self.program.to_string_lossy(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(MergeError::Conversion(format!(
                "'{}' exited with {}: {}",
                self.program.to_string_lossy(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}
