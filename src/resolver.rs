//! Column Resolver Module
//!
//! 差し込みフィールドと表データの列の対応付け（フィールドマッピング）を扱うモジュール。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::Selector;
use crate::error::MergeError;

/// 差し込みフィールドの既定の取得元を推定する
///
/// 選択肢のラベルのうち、フィールド名を部分文字列として含む最初のもの
/// （大文字小文字を区別しない）を返します。一致するものがなければ
/// 先頭の選択肢を返します。`choices`が空の場合のみ`None`です。
///
/// 見出しが空の列（`Unmappable`）は照合の対象外ですが、先頭にあれば
/// フォールバック先になります。
///
/// # 引数
///
/// * `field` - 差し込みフィールド名
/// * `choices` - 選択肢（`Dataset::choices()`の並び順）
/// * `today` - `CurrentDate`のラベルに埋め込む日付文字列
///
/// # 使用例
///
/// ```rust
/// use docxmerge::{default_for, Selector};
///
/// let choices = vec![
///     Selector::Column("Customer Name".into()),
///     Selector::Column("Amount".into()),
///     Selector::LeaveEmpty,
///     Selector::CurrentDate,
/// ];
/// assert_eq!(
///     default_for("name", &choices, "01/02/2025"),
///     Some(&Selector::Column("Customer Name".into()))
/// );
/// assert_eq!(default_for("Date", &choices, "01/02/2025"), Some(&Selector::CurrentDate));
/// ```
pub fn default_for<'a>(field: &str, choices: &'a [Selector], today: &str) -> Option<&'a Selector> {
    let needle = field.to_uppercase();
    choices
        .iter()
        .filter(|choice| !matches!(choice, Selector::Unmappable { .. }))
        .find(|choice| choice.label(today).to_uppercase().contains(&needle))
        .or_else(|| choices.first())
}

/// 差し込みフィールド名から取得元へのマッピング
///
/// フィールド名の昇順で保持されます。生成時には読み取り専用で全行に共有されます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: BTreeMap<String, Selector>,
}

impl FieldMapping {
    /// 空のマッピングを生成する
    pub fn new() -> Self {
        Self::default()
    }

    /// すべてのフィールドに既定の取得元を設定したマッピングを生成する
    ///
    /// `choices`が空の場合、フィールドは`LeaveEmpty`に設定されます。
    pub fn with_defaults<'f, I>(fields: I, choices: &[Selector], today: &str) -> Self
    where
        I: IntoIterator<Item = &'f str>,
    {
        let entries = fields
            .into_iter()
            .map(|field| {
                let selector = default_for(field, choices, today)
                    .cloned()
                    .unwrap_or(Selector::LeaveEmpty);
                (field.to_string(), selector)
            })
            .collect();
        Self { entries }
    }

    /// フィールドの取得元を設定する（既存の設定は上書き）
    pub fn insert(&mut self, field: impl Into<String>, selector: Selector) -> Option<Selector> {
        self.entries.insert(field.into(), selector)
    }

    /// フィールドの取得元を取得する
    pub fn get(&self, field: &str) -> Option<&Selector> {
        self.entries.get(field)
    }

    /// フィールド名の一覧（昇順）
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// (フィールド名, 取得元)の一覧（フィールド名の昇順）
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 登録されているフィールド数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 登録されているフィールドがないかどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// すべての差し込みフィールドにマッピングがあることを確認する
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - すべてのフィールドが登録済みの場合
    /// * `Err(MergeError::Validation)` - 未登録のフィールドがある場合
    pub fn ensure_covers<'f, I>(&self, fields: I) -> Result<(), MergeError>
    where
        I: IntoIterator<Item = &'f str>,
    {
        let missing: Vec<&str> = fields
            .into_iter()
            .filter(|field| !self.entries.contains_key(*field))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MergeError::Validation(format!(
                "No mapping for merge field(s): {}",
                missing.join(", ")
            )))
        }
    }
}
