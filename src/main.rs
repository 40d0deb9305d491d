use clap::Parser;
use std::process::ExitCode;

use lsb_shard::{
    cli::{Cli, Commands},
    handler::{exit_code, handle_extract, handle_hide},
    logging::init_logger,
};

/// 程序的主入口点
///
/// 负责解析命令行参数，初始化日志，并根据指定的子命令（`hide` 或 `extract`）
/// 将执行分派到相应的处理函数。失败时以错误对应的退出码结束进程。
fn main() -> ExitCode {
    // 解析命令行参数
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.silent);

    // 根据子命令调用相应的处理函数
    let result = match cli.command {
        Commands::Hide(args) => handle_hide(args),
        Commands::Extract(args) => handle_extract(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
