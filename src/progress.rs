//! Progress Module
//!
//! バッチ生成の進捗通知を抽象化するモジュール。

use log::info;

/// 進捗の通知先
///
/// 行ごとに書き込みの前後で1回ずつ、変換の完了時に1回通知されます
/// （行数をNとすると`max`は`2N+1`）。`value`は1から単調に増加します。
pub trait ProgressSink {
    /// 進捗を通知する
    ///
    /// # 引数
    ///
    /// * `value` - 現在の進捗（1始まり）
    /// * `max` - 進捗の最大値
    /// * `label` - 現在の処理内容
    fn tick(&mut self, value: usize, max: usize, label: &str);
}

/// 通知を捨てる
impl ProgressSink for () {
    fn tick(&mut self, _value: usize, _max: usize, _label: &str) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str),
{
    fn tick(&mut self, value: usize, max: usize, label: &str) {
        self(value, max, label)
    }
}

/// 進捗をログに出力する
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn tick(&mut self, value: usize, max: usize, label: &str) {
        info!("[{:>6.2}%] {}", percentage(value, max), label);
    }
}

/// 進捗率（%、小数第2位に丸め）
pub(crate) fn percentage(value: usize, max: usize) -> f64 {
    if max == 0 {
        return 0.0;
    }
    let pct = value as f64 / max as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
