//! CLI 参数定义与命令分发

use crate::application::multi_env::MultiEnvContext;
use crate::config::format::properties::PropertiesParser;
use crate::config::manifest::MultiEnvManifest;
use crate::domain::component::ComponentCatalog;
use crate::error::{MultiEnvError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// multienv - 查看清单中声明的环境
#[derive(Parser)]
#[command(
    name = "multienv",
    version,
    about = "Inspect multi-environment container manifests",
    long_about = "Loads a multienv.toml manifest, builds its environments and prints their resolved properties"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 详细输出模式
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 清单路径（默认 ./multienv.toml，其次 ~/.multienv/multienv.toml）
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 列出环境名称
    Envs,

    /// 逐个构建所有环境
    Check,

    /// 输出环境的全部属性
    Props {
        /// 环境名称
        env: String,
        /// 输出格式
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Env)]
        format: OutputFormat,
    },

    /// 输出单个属性
    Get {
        /// 环境名称
        env: String,
        /// 属性名
        key: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `key=value` 行
    Env,
    Json,
}

impl Cli {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(MultiEnvManifest::default_path)
    }
}

/// 以 `catalog` 执行已解析的命令
pub fn run(cli: &Cli, catalog: Arc<ComponentCatalog>) -> Result<()> {
    let path = cli.manifest_path();
    tracing::debug!(manifest = %path.display(), "loading manifest");

    let manifest = MultiEnvManifest::load(&path)?;
    // check 逐个构建环境，每成功一个就输出一行
    let lazy = manifest.settings.lazy || matches!(cli.command, Commands::Check);
    let registry = manifest.to_context(&catalog)?.lazy_initialization(lazy);

    match &cli.command {
        Commands::Envs => {
            for name in registry.environment_names() {
                println!("{name}");
            }
        }

        Commands::Check => {
            registry.start()?;
            for name in registry.environment_names() {
                registry.start_environment_context(&name)?;
                if cli.verbose {
                    let beans = registry.bean_names(&name)?;
                    println!("{name}: ok ({} beans)", beans.len());
                } else {
                    println!("{name}: ok");
                }
            }
        }

        Commands::Props { env, format } => {
            open_environment(&registry, env)?;
            let entries = registry.properties(env)?;

            match format {
                OutputFormat::Env if entries.is_empty() => {}
                OutputFormat::Env => println!("{}", PropertiesParser::serialize(&entries)),
                OutputFormat::Json => {
                    let map: BTreeMap<_, _> = entries.into_iter().collect();
                    let json = serde_json::to_string_pretty(&map)
                        .map_err(|e| MultiEnvError::Parse(e.to_string()))?;
                    println!("{json}");
                }
            }
        }

        Commands::Get { env, key } => {
            open_environment(&registry, env)?;
            match registry.get_property(env, key)? {
                Some(value) => println!("{value}"),
                None => return Err(MultiEnvError::PropertyNotFound(key.clone())),
            }
        }
    }

    registry.close();
    Ok(())
}

/// 启动注册表并确保 `name` 已构建（无论是否 lazy）
fn open_environment(registry: &MultiEnvContext, name: &str) -> Result<()> {
    registry.start()?;
    registry.start_environment_context(name)
}
