//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::Selector;

/// 表データのセル値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// テキストに変換済みの値
    Text(String),

    /// 欠損値（空セル）
    Missing,
}

impl Cell {
    /// 値が欠損しているかどうかを判定
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// 値をテキストとして取得（欠損値は空文字列）
    pub fn as_text(&self) -> &str {
        match self {
            Cell::Text(s) => s,
            Cell::Missing => "",
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// ワークシートから読み込んだ表データ
///
/// 1行目を見出し行とし、2行目以降をデータ行（0始まりのインデックス）として保持します。
/// 見出しが空の列は`None`として保持され、マッピングには使用できません。
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    source: PathBuf,
    headers: Vec<Option<String>>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// 表データを構築する
    ///
    /// 見出しより短い行は`Cell::Missing`で補完され、長い行は切り詰められます。
    pub fn new(
        source: impl Into<PathBuf>,
        headers: Vec<Option<String>>,
        rows: Vec<Vec<Cell>>,
    ) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();

        Self {
            source: source.into(),
            headers,
            rows,
        }
    }

    /// 読み込み元のファイルパス
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 読み込み元のファイル名（ディレクトリ部分を除く）
    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// 見出し行（空の見出しは`None`）
    pub fn headers(&self) -> &[Option<String>] {
        &self.headers
    }

    /// 名前のある列名を左から順に返す
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().filter_map(|h| h.as_deref())
    }

    /// 列が存在するかどうか（完全一致）
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 列名から列インデックスを取得（同名の列がある場合は最初の列）
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.as_deref() == Some(name))
    }

    /// データ行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// データ行が存在しないかどうか
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 指定行・列のセル
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// 指定行の全セル
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    /// マッピングの選択肢一覧
    ///
    /// 見出し順に列（空の見出しは`Unmappable`）を並べ、
    /// 最後に`LeaveEmpty`と`CurrentDate`を追加します。
    pub fn choices(&self) -> Vec<Selector> {
        let mut choices: Vec<Selector> = self
            .headers
            .iter()
            .enumerate()
            .map(|(index, header)| match header {
                Some(name) => Selector::Column(name.clone()),
                None => Selector::Unmappable { index },
            })
            .collect();
        choices.push(Selector::LeaveEmpty);
        choices.push(Selector::CurrentDate);
        choices
    }
}

/// バッチ生成の結果
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// 処理した行数
    pub rows: usize,

    /// 変換後のファイルパス（行順）
    pub files: Vec<PathBuf>,

    /// 処理全体の所要時間
    pub elapsed: Duration,
}

impl BatchReport {
    /// 1ファイルあたりの平均所要時間（秒、小数第2位に丸め）
    pub fn average_secs(&self) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        let avg = self.elapsed.as_secs_f64() / self.rows as f64;
        (avg * 100.0).round() / 100.0
    }

    /// 所要時間を`H:MM:SS`形式で返す（秒未満は切り捨て）
    pub fn elapsed_hms(&self) -> String {
        let total = self.elapsed.as_secs();
        format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
    }

    /// 完了時にユーザーへ表示する要約
    pub fn summary(&self) -> String {
        format!(
            "{} PDF files successfully generated after {}.\n (~{:.2} seconds per file) ",
            self.rows,
            self.elapsed_hms(),
            self.average_secs()
        )
    }
}
