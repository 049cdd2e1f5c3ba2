//! Filename Sanitizing Module
//!
//! ファイル名に使用できない文字の検出と除去を提供するモジュール。

use crate::api::ILLEGAL_CHARACTERS;

/// テキストに含まれる使用禁止文字を返す
///
/// 戻り値は`ILLEGAL_CHARACTERS`の並び順で、各文字は1回だけ含まれます。
/// 空の場合、テキストはファイル名として安全です。
///
/// # 使用例
///
/// ```rust
/// use docxmerge::detect_illegal_chars;
///
/// assert_eq!(detect_illegal_chars("a/b:c/d"), vec![':', '/']);
/// assert!(detect_illegal_chars("report 2025").is_empty());
/// ```
pub fn detect_illegal_chars(text: &str) -> Vec<char> {
    ILLEGAL_CHARACTERS
        .iter()
        .copied()
        .filter(|c| text.contains(*c))
        .collect()
}

/// テキストに使用禁止文字が含まれるかどうか
pub fn contains_illegal_chars(text: &str) -> bool {
    text.contains(&ILLEGAL_CHARACTERS[..])
}

/// 使用禁止文字をすべて削除する
///
/// 置換やエスケープは行わず、単純に削除します（元に戻せません）。
///
/// # 使用例
///
/// ```rust
/// use docxmerge::clean_filename;
///
/// assert_eq!(clean_filename("a<b>c?.docx"), "abc.docx");
/// ```
pub fn clean_filename(text: &str) -> String {
    text.chars()
        .filter(|c| !ILLEGAL_CHARACTERS.contains(c))
        .collect()
}

/// 文字の一覧を空白区切りで連結する（メッセージ表示用）
pub(crate) fn join_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
