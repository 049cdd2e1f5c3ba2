//! Formatter Module
//!
//! calamineのセル値を差し込み用のテキストに変換するモジュール。

use calamine::Data;
use chrono::{NaiveDateTime, Timelike};

use crate::types::Cell;

/// セルフォーマッター
///
/// セル値のフォーマット処理のファサードとして機能します。
#[derive(Debug, Default)]
pub(crate) struct CellFormatter {
    /// 日付フォーマッター
    date_formatter: DateFormatter,

    /// 数値フォーマッター
    number_formatter: NumberFormatter,
}

impl CellFormatter {
    /// 新しいCellFormatterインスタンスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// セル値をテキストに変換
    ///
    /// 空セルと空文字列は`Cell::Missing`になります。
    pub fn format_cell(&self, data: &Data) -> Cell {
        let text = match data {
            Data::Empty => return Cell::Missing,
            Data::String(s) if s.is_empty() => return Cell::Missing,
            Data::String(s) => s.clone(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) => self.number_formatter.format(*f),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) if dt.is_datetime() => self.date_formatter.format(&value),
                // 期間値や範囲外の日付はシリアル値のまま出力
                _ => self.number_formatter.format(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
            Data::Error(e) => e.to_string(),
        };
        Cell::Text(text)
    }

    /// 見出しセルを列名に変換（空の見出しは`None`）
    pub fn format_header(&self, data: &Data) -> Option<String> {
        match self.format_cell(data) {
            Cell::Text(text) => Some(text),
            Cell::Missing => None,
        }
    }
}

/// 日付フォーマッター
///
/// 時刻成分がなければ`YYYY-MM-DD`、あれば`YYYY-MM-DD HH:MM:SS`で出力します。
#[derive(Debug, Default)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    pub fn format(&self, value: &NaiveDateTime) -> String {
        let time = value.time();
        if time.num_seconds_from_midnight() == 0 {
            value.format("%Y-%m-%d").to_string()
        } else {
            value.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }
}

/// 数値フォーマッター
///
/// 整数値は小数点なし、それ以外は最短表現で出力します。
#[derive(Debug, Default)]
pub(crate) struct NumberFormatter;

impl NumberFormatter {
    /// 整数として表示する上限（f64で整数を正確に表現できる範囲内）
    const MAX_INTEGRAL: f64 = 1e15;

    pub fn format(&self, value: f64) -> String {
        if value == 0.0 {
            return "0".to_string();
        }
        if value.is_finite() && value.fract() == 0.0 && value.abs() < Self::MAX_INTEGRAL {
            format!("{:.0}", value)
        } else {
            value.to_string()
        }
    }
}
