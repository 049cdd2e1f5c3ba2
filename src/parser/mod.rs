//! Parser Module
//!
//! 入力ファイルの解析を担当するモジュール。
//! 表データ（XLSX/XLS/ODS）の読み込みはcalamine、
//! Wordテンプレート（DOCX）の解析はzipとquick-xmlで行います。

mod document;
mod workbook;

pub use document::DocxTemplate;
pub(crate) use workbook::load_dataset;
