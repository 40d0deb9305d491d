//! # 日志模块
//!
//! 以 `env_logger` 作为 `log` 的后端，按命令行的 verbose/silent 选项设定级别，
//! 每条消息前带一个着色的级别标签。

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

pub fn level_filter(verbose: bool, silent: bool) -> LevelFilter {
    if silent {
        LevelFilter::Off
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// 初始化全局日志器，每个进程只能调用一次。
pub fn init_logger(verbose: bool, silent: bool) {
    Builder::new()
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => "[ERROR]".red().bold(),
                Level::Warn => "[WARNING]".yellow().bold(),
                Level::Info => "[INFO]".green(),
                Level::Debug => "[VERBOSE]".dimmed(),
                Level::Trace => "[TRACE]".dimmed(),
            };
            writeln!(buf, "{tag} {}", record.args())
        })
        .filter_level(level_filter(verbose, silent))
        .init();
}
