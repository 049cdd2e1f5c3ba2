//! Workbook Parser Module
//!
//! calamineを使用して、ワークシートを差し込み用の表データとして読み込みます。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use log::debug;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::api::SheetSelector;
use crate::error::MergeError;
use crate::formatter::CellFormatter;
use crate::security::SecurityConfig;
use crate::types::{Cell, Dataset};

/// ワークブックパーサー
///
/// calamineのラッパーとして、ワークブックレベルの操作を提供します。
pub(crate) struct WorkbookParser {
    workbook: Sheets<Cursor<Vec<u8>>>,
    formatter: CellFormatter,
}

impl WorkbookParser {
    /// ワークブックを開く
    ///
    /// XLSX/XLS/ODSのいずれの形式でも読み込めます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックの読み込みに成功した場合
    /// * `Err(MergeError::SecurityViolation)` - 入力サイズが上限を超えた場合
    /// * `Err(MergeError::Spreadsheet)` - ワークブックとして解析できない場合
    pub fn open<R: Read + Seek>(mut reader: R) -> Result<Self, MergeError> {
        let security_config = SecurityConfig::default();

        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        if bytes_read as u64 > security_config.max_input_file_size {
            return Err(MergeError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, security_config.max_input_file_size
            )));
        }

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;

        Ok(Self {
            workbook,
            formatter: CellFormatter::new(),
        })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// シート選択方式に基づいてシートのセル範囲を取得
    fn select_range(&mut self, selector: &SheetSelector) -> Result<Range<Data>, MergeError> {
        let sheet_names = self.sheet_names();

        let index = match selector {
            SheetSelector::First => 0,
            SheetSelector::Index(index) => *index,
            SheetSelector::Name(name) => sheet_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| MergeError::Config(format!("Sheet '{}' not found", name)))?,
        };

        if index >= sheet_names.len() {
            return Err(MergeError::Config(format!(
                "Sheet index {} is out of range (total: {})",
                index,
                sheet_names.len()
            )));
        }

        match self.workbook.worksheet_range_at(index) {
            Some(range) => Ok(range?),
            None => Err(MergeError::Config(format!(
                "Sheet index {} is out of range (total: {})",
                index,
                sheet_names.len()
            ))),
        }
    }

    /// 選択したシートを表データとして読み込む
    ///
    /// 使用範囲の1行目を見出し行、2行目以降をデータ行として扱います。
    /// シートが空の場合は列も行もない表データになります。
    pub fn read_dataset(
        &mut self,
        selector: &SheetSelector,
        source: &Path,
    ) -> Result<Dataset, MergeError> {
        let range = self.select_range(selector)?;
        let mut rows = range.rows();

        let headers: Vec<Option<String>> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|data| self.formatter.format_header(data))
                .collect(),
            None => Vec::new(),
        };

        let rows: Vec<Vec<Cell>> = rows
            .map(|row| row.iter().map(|data| self.formatter.format_cell(data)).collect())
            .collect();

        debug!(
            "Read {} column(s) and {} row(s) from {}",
            headers.len(),
            rows.len(),
            source.display()
        );

        Ok(Dataset::new(source, headers, rows))
    }
}

/// ファイルから表データを読み込む
pub(crate) fn load_dataset(path: &Path, selector: &SheetSelector) -> Result<Dataset, MergeError> {
    let file = File::open(path)?;
    let mut parser = WorkbookParser::open(file)?;
    parser.read_dataset(selector, path)
}
