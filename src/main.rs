//! multienv 主程序入口
//!
//! 安静模式：成功时只输出命令结果；`--verbose` 同时切换日志级别与错误报告的详细程度

use clap::Parser;
use multienv::ComponentCatalog;
use multienv::cli::{self, Cli};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 独立二进制不携带组件，环境只提供属性
    let catalog = Arc::new(ComponentCatalog::new());

    if let Err(e) = cli::run(&cli, catalog) {
        e.report(cli.verbose);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
