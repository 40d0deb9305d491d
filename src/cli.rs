//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use crate::constants::{DEFAULT_BITS_PER_CHANNEL, DEFAULT_ZSTD_LEVEL};
use crate::header::CollectionId;
use clap::{Parser, ValueEnum};
use image::ImageFormat;
use std::path::PathBuf;

/// 一款基于 LSB (最低有效位) 隐写术的命令行工具，可以把文件分散隐藏在一组无损格式图像中。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款基于 LSB (最低有效位) 隐写术的命令行工具，可以把文件分散隐藏在一组无损格式图像中，并在之后重新组合提取。"
)]
pub struct Cli {
    /// 输出更多调试信息。
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 静默模式，不输出任何信息 (以退出码判断结果)。
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令：hide (隐藏) 和 extract (提取)。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 把文件隐藏到一组图像中。
    Hide(HideArgs),

    /// 从图像中提取隐藏的文件。
    Extract(ExtractArgs),
}

/// 输出图像的格式，只提供无损格式。
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Png,
    Bmp,
    Tiff,
    Webp,
    Qoi,
}

impl OutputFormat {
    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::Webp => ImageFormat::WebP,
            Self::Qoi => ImageFormat::Qoi,
        }
    }
}

/// 'hide' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct HideArgs {
    /// 用作载体的图像文件或包含图像的目录 (递归搜索)。
    #[arg(short, long, num_args = 1.., required = true)]
    pub images: Vec<PathBuf>,

    /// 要隐藏的文件或目录。
    #[arg(short, long, num_args = 1.., required = true)]
    pub data: Vec<PathBuf>,

    /// 输出目录，生成的图像会放在这里。
    #[arg(short, long, default_value = "processed")]
    pub output: PathBuf,

    /// 每个像素通道使用的低位数 (1-8)。
    #[arg(short, long, default_value_t = DEFAULT_BITS_PER_CHANNEL, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub bits: u8,

    /// 同时使用 alpha 通道 (提高容量)。
    #[arg(short, long)]
    pub alpha: bool,

    /// 输出图像的集合编号 (十六进制)，默认随机生成。
    #[arg(short, long)]
    pub collection: Option<CollectionId>,

    /// 不为集合创建子目录，所有图像直接放在输出目录中。
    #[arg(short = 'n', long = "no-sub-directory")]
    pub flat: bool,

    /// 输出图像格式。
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Png)]
    pub format: OutputFormat,

    /// 不压缩载荷。
    #[arg(long)]
    pub no_compress: bool,

    /// zstd 压缩级别。
    #[arg(long, default_value_t = DEFAULT_ZSTD_LEVEL)]
    pub level: i32,

    /// 覆盖已存在的输出文件。
    #[arg(long)]
    pub force: bool,
}

/// 'extract' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// 含有隐藏数据的图像文件或目录 (递归搜索)。
    #[arg(short, long, num_args = 1.., required = true)]
    pub images: Vec<PathBuf>,

    /// 输出目录，提取出的文件会放在这里。
    #[arg(short, long, default_value = "extracted")]
    pub output: PathBuf,

    /// 每个像素通道使用的低位数 (1-8)，必须与隐藏时相同。
    #[arg(short, long, default_value_t = DEFAULT_BITS_PER_CHANNEL, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub bits: u8,

    /// 隐藏时使用了 alpha 通道。
    #[arg(short, long)]
    pub alpha: bool,

    /// 只提取指定编号的集合 (十六进制)，默认提取所有找到的集合。
    #[arg(short, long)]
    pub collection: Option<CollectionId>,

    /// 不为集合创建子目录，所有文件直接放在输出目录中。
    #[arg(short = 'n', long = "no-sub-directory")]
    pub flat: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn hide_defaults_and_hex_collection() {
        let cli = Cli::parse_from([
            "lsb_shard", "hide", "-i", "a.png", "b", "-d", "secret.txt", "-c", "00ff00aa",
        ]);
        let Commands::Hide(args) = cli.command else {
            panic!("expected hide");
        };
        assert_eq!(args.images, vec![PathBuf::from("a.png"), PathBuf::from("b")]);
        assert_eq!(args.bits, DEFAULT_BITS_PER_CHANNEL);
        assert_eq!(args.collection, Some(CollectionId(0x00FF_00AA)));
        assert_eq!(args.output, PathBuf::from("processed"));
        assert_eq!(args.format, OutputFormat::Png);
        assert!(!args.alpha && !args.flat && !args.force && !args.no_compress);
    }

    #[test]
    fn bits_out_of_range_are_rejected() {
        let result = Cli::try_parse_from(["lsb_shard", "extract", "-i", "x", "-b", "9"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["lsb_shard", "extract", "-i", "x", "-c", "zz"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_and_silent_conflict() {
        let result = Cli::try_parse_from(["lsb_shard", "-v", "-s", "extract", "-i", "x"]);
        assert!(result.is_err());
    }
}
