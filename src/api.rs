//! Public API Types
//!
//! 公開APIで使用する列挙型と定数を定義するモジュール。

use serde::{Deserialize, Serialize};
use std::fmt;

/// ファイル名テンプレートが未設定であることを示す既定テキスト
///
/// このテキストのまま生成した場合、自動生成のファイル名が使われます。
pub const FILENAME_DEFAULT_TEXT: &str =
    "Enter filename... You may use information from columns by using {column_name}. Only exact matches work.";

/// ファイル名に使用できない文字
pub const ILLEGAL_CHARACTERS: [char; 9] = ['<', '>', ':', '"', '\\', '/', '|', '?', '*'];

/// 一時ディレクトリの既定名（出力フォルダ直下に作成される）
pub const TEMP_DIR_NAME: &str = ".temp";

/// 差し込みフィールドに挿入する日付の既定形式
pub const DEFAULT_FIELD_DATE_FORMAT: &str = "%d/%m/%Y";

/// ファイル名の先頭に付ける日付の既定形式
pub const DEFAULT_FILE_DATE_FORMAT: &str = "%y%m%d";

pub(crate) const UNMAPPABLE_LABEL: &str = "Empty Column Name (This Column cannot be mapped)";
pub(crate) const LEAVE_EMPTY_LABEL: &str = "Leave Empty";
pub(crate) const CURRENT_DATE_LABEL: &str = "EXTRA - Add Current Date =>";

/// 差し込みフィールドのデータ取得元
///
/// 差し込みフィールドごとにユーザーが選択する値の取得元です。
/// 実在する列名と特殊な選択肢を型で区別するため、
/// "Leave Empty" という名前の列があっても衝突しません。
///
/// # JSON表現
///
/// ```json
/// { "Name": { "column": "Customer Name" }, "Note": "leave_empty", "Date": "current_date" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// 表データの列（完全一致、大文字小文字を区別）
    Column(String),

    /// 見出しが空の列（マッピング不可）
    ///
    /// `index`は0始まりの列番号です。常に空文字列に解決されます。
    Unmappable { index: usize },

    /// 空のままにする
    LeaveEmpty,

    /// 生成時の日付（既定形式 `dd/mm/yyyy`）
    CurrentDate,
}

impl Selector {
    /// ドロップダウン等に表示するラベルを返す
    ///
    /// # 引数
    ///
    /// * `today` - `CurrentDate`のラベルに埋め込む日付文字列
    pub fn label(&self, today: &str) -> String {
        match self {
            Selector::Column(name) => name.clone(),
            Selector::Unmappable { .. } => UNMAPPABLE_LABEL.to_string(),
            Selector::LeaveEmpty => LEAVE_EMPTY_LABEL.to_string(),
            Selector::CurrentDate => format!("{} {}", CURRENT_DATE_LABEL, today),
        }
    }

    /// 実在する列を指しているかどうか
    pub fn is_column(&self) -> bool {
        matches!(self, Selector::Column(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Column(name) => write!(f, "{}", name),
            Selector::Unmappable { index } => write!(f, "{} [#{}]", UNMAPPABLE_LABEL, index),
            Selector::LeaveEmpty => f.write_str(LEAVE_EMPTY_LABEL),
            Selector::CurrentDate => f.write_str("Current Date"),
        }
    }
}

/// シート選択方式
///
/// 表データとして読み込むワークシートを指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetSelector {
    /// 最初のシート（デフォルト）
    #[default]
    First,

    /// インデックス指定（0始まり）
    Index(usize),

    /// シート名指定
    Name(String),
}
