//! Output Conversion Module
//!
//! Strategy Patternによる一括変換処理（DOCX → PDF）の抽象化を提供するモジュール。

mod converters;

use crate::error::MergeError;
use std::path::Path;

pub use converters::SofficeConverter;

/// 一括変換の戦略
///
/// `source_dir`内の各DOCXファイルを、拡張子だけを変えた同名のファイルとして
/// `dest_dir`に出力します。
pub trait FormatConverter {
    /// ディレクトリ内の文書を一括変換する
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - すべてのファイルの変換に成功した場合
    /// * `Err(MergeError)` - 変換に失敗した場合
    fn convert_dir(&self, source_dir: &Path, dest_dir: &Path) -> Result<(), MergeError>;
}

impl<F> FormatConverter for F
where
    F: Fn(&Path, &Path) -> Result<(), MergeError>,
{
    fn convert_dir(&self, source_dir: &Path, dest_dir: &Path) -> Result<(), MergeError> {
        self(source_dir, dest_dir)
    }
}
