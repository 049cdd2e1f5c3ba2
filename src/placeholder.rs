//! Placeholder Module
//!
//! ファイル名テンプレート中の`{列名}`プレースホルダーを抽出・検証するモジュール。

use regex::Regex;
use std::sync::OnceLock;

/// `{...}`を最短一致で捕捉するパターン
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(.+?)\}").expect("placeholder pattern is valid"))
}

/// テンプレートからプレースホルダー名を左から順に抽出する
///
/// 各名前の前後の空白は除去されます。重複は除去しません。
/// プレースホルダーがない場合は空のベクターを返します。
///
/// # 使用例
///
/// ```rust
/// use docxmerge::extract_placeholders;
///
/// assert_eq!(
///     extract_placeholders("{ Name } - {Amount} - {Name}"),
///     vec!["Name", "Amount", "Name"]
/// );
/// ```
pub fn extract_placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// 表データに存在しないプレースホルダー名を返す
///
/// # 引数
///
/// * `template` - ファイル名テンプレート
/// * `columns` - 表データの列名
///
/// # 戻り値
///
/// 未知の名前（出現順、重複あり）。空であればすべて解決可能です。
pub fn unknown_columns<'a, I>(template: &str, columns: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: Vec<&str> = columns.into_iter().collect();
    extract_placeholders(template)
        .into_iter()
        .filter(|name| !columns.contains(&name.as_str()))
        .collect()
}

/// テンプレート中の`{name}`を値で置換する
///
/// プレースホルダー内の前後空白は無視して名前を照合します。
/// `lookup`が`None`を返した場合、プレースホルダーはそのまま残ります。
pub(crate) fn substitute<'a, F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<&'a str>,
{
    placeholder_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = caps[1].trim();
            match lookup(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
