//! Row Mapper Module
//!
//! 表データの1行を、差し込みフィールドごとの具体的な文字列値に解決するモジュール。

use std::collections::BTreeMap;

use crate::api::Selector;
use crate::resolver::FieldMapping;
use crate::types::Dataset;

/// 1行分の差し込みフィールドの値を解決する
///
/// 取得元ごとの解決規則:
///
/// - `LeaveEmpty` / `Unmappable` → 空文字列
/// - `CurrentDate` → `today`
/// - `Column(name)` → 行のセル値（欠損値は空文字列）
///
/// 存在しない列や範囲外の行は空文字列に解決され、エラーにはなりません。
///
/// # 引数
///
/// * `row` - データ行のインデックス（0始まり）
/// * `mapping` - フィールドマッピング
/// * `dataset` - 表データ
/// * `today` - `CurrentDate`に使用する日付文字列
///
/// # 使用例
///
/// ```rust
/// use docxmerge::{resolve_row, Cell, Dataset, FieldMapping, Selector};
///
/// let dataset = Dataset::new(
///     "data.xlsx",
///     vec![Some("Name".into())],
///     vec![vec![Cell::Text("Acme".into())]],
/// );
/// let mut mapping = FieldMapping::new();
/// mapping.insert("Customer", Selector::Column("Name".into()));
/// mapping.insert("Note", Selector::LeaveEmpty);
///
/// let values = resolve_row(0, &mapping, &dataset, "19/10/2026");
/// assert_eq!(values["Customer"], "Acme");
/// assert_eq!(values["Note"], "");
/// ```
pub fn resolve_row(
    row: usize,
    mapping: &FieldMapping,
    dataset: &Dataset,
    today: &str,
) -> BTreeMap<String, String> {
    mapping
        .iter()
        .map(|(field, selector)| {
            let value = match selector {
                Selector::LeaveEmpty | Selector::Unmappable { .. } => String::new(),
                Selector::CurrentDate => today.to_string(),
                Selector::Column(column) => dataset
                    .cell(row, column)
                    .map(|cell| cell.as_text().to_string())
                    .unwrap_or_default(),
            };
            (field.to_string(), value)
        })
        .collect()
}
