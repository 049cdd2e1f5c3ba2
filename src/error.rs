//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// docxmergeクレート全体で使用するエラー型
///
/// テンプレートと表データの読み込み、差し込み、ファイル名生成、
/// PDF変換の各段階で発生するすべてのエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - 入力エラー（`MissingInput`, `Validation`）: ファイルI/Oの前に検出され、生成処理は開始されない
/// - 外部処理エラー（`Io`, `Spreadsheet`, `Zip`, `Template`, `Conversion`）: バッチ全体を中断する
/// - 設定エラー（`Config`）: `GeneratorBuilder::build()`時に検出される
///
/// # 使用例
///
/// ```rust,no_run
/// use docxmerge::MergeError;
/// use std::fs::File;
///
/// fn open_template(path: &str) -> Result<(), MergeError> {
///     let _file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum MergeError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Excelファイルの解析中に発生したエラー（calamine由来）
    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// ZIPアーカイブ（DOCXテンプレート）の読み書きエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// テンプレートXMLの解析・差し込みエラー
    #[error("Template error: {0}")]
    Template(String),

    /// 設定の検証に失敗したエラー
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use docxmerge::{GeneratorBuilder, MergeError};
    ///
    /// let result = GeneratorBuilder::new()
    ///     .with_output_dir("out")
    ///     .with_field_date_format("")  // 空の日付形式は無効
    ///     .build();
    ///
    /// match result {
    ///     Err(MergeError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// テンプレート・表データ・出力フォルダのいずれかが選択されていない
    #[error("{0}")]
    MissingInput(String),

    /// ファイル名テンプレートの検証エラー（未知の列、使用禁止文字）
    ///
    /// メッセージはそのままユーザーに表示できる形式です。
    #[error("{0}")]
    Validation(String),

    /// 一括PDF変換の失敗
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb、パストラバーサル、ファイルサイズ制限などに違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// セッションの状態が操作を許可しない
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
