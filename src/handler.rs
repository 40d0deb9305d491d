//! # 命令处理逻辑模块
//!
//! 包含处理 `hide` 和 `extract` 子命令的高级业务逻辑。
//! 本模块负责协调文件 I/O、调用核心编解码逻辑以及向用户报告结果。

use crate::archive;
use crate::cli::{ExtractArgs, HideArgs};
use crate::config::LsbConfig;
use crate::constants::exit_code as codes;
use crate::decoder::{self, Collection};
use crate::discovery::{self, Scan};
use crate::encoder::Encoder;
use crate::error::StegoError;
use crate::header::CollectionId;
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// 处理 'Hide' 命令的执行逻辑。
///
/// 扫描载体图像、打包并压缩数据、规划容量，再把载荷分散写入选中的图像。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 输出目录无法创建。
/// * 没有找到可用的图像。
/// * 无法读取或打包要隐藏的数据。
/// * 图像总容量不足以容纳数据。
/// * 任何一张图像写出失败。
pub fn handle_hide(args: HideArgs) -> Result<()> {
    let config = LsbConfig::new(args.bits, args.alpha)?;
    let collection = args.collection.unwrap_or_else(CollectionId::random);
    let output_dir = collection_dir(&args.output, collection, args.flat);
    create_output_dir(&output_dir)?;

    log::info!("Locating and parsing images");
    let Scan {
        mut carriers,
        rejected,
    } = discovery::scan_carriers(&args.images, config);
    report_rejected(&rejected);
    if carriers.is_empty() {
        return Err(StegoError::NoImagesFound.into());
    }
    carriers.sort_by_key(|carrier| carrier.capacity_bytes());
    log::info!("Found {} images", carriers.len());

    log::debug!("Packing data");
    let level = (!args.no_compress).then_some(args.level);
    let payload = archive::pack(&args.data, level)
        .map_err(StegoError::from)
        .context("Failed to read or compress the data to hide")?;
    log::debug!(
        "Packed {} files into {} bytes ({} bytes before compression)",
        payload.entries,
        payload.len,
        payload.raw_len
    );

    let encoder = Encoder::new(collection, &output_dir)
        .format(args.format.image_format())
        .compressed(payload.compressed)
        .overwrite(args.force);

    let report = match encoder.encode(BufReader::new(payload.file), payload.len, &carriers) {
        Ok(report) => report,
        Err(StegoError::InsufficientCapacity {
            required,
            available,
            shortfall,
        }) => {
            log::info!(
                "The given data size is {} ({} bytes)",
                human_size(required),
                required
            );
            log::info!(
                "The given images capacity is {} ({} bytes) using {} bits and {} channels",
                human_size(available),
                available,
                config.bits_per_channel(),
                config.channel_count()
            );
            log::info!(
                "{} Try increasing the bits option, enabling alpha or providing more images",
                "[TIP]".magenta()
            );
            return Err(StegoError::InsufficientCapacity {
                required,
                available,
                shortfall,
            }
            .into());
        }
        Err(err) => return Err(err.into()),
    };

    for written in &report.written {
        log::debug!(
            "[{}] {} -> {}",
            human_size(u64::from(written.header.stored_length)),
            written.source.display(),
            written.output.display()
        );
    }
    for failure in &report.failures {
        log::error!("{failure:#}");
    }

    log::info!(
        "Images found: {}, used: {}, rejected: {}",
        carriers.len() + rejected.len(),
        report.selected(),
        rejected.len()
    );

    if !report.is_success() {
        return Err(StegoError::ImagesFailed {
            failed: report.failures.len(),
            total: report.selected(),
        }
        .into());
    }

    log::info!(
        "Done! Generated {} images with collection key {} in directory {}",
        report.written.len().to_string().green().bold(),
        collection.to_string().green().bold(),
        output_dir.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 处理 'Extract' 命令的执行逻辑。
///
/// 读取所有图像的头部，按集合分组排序后重组载荷，再解压并还原文件。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 输出目录无法创建。
/// * 没有找到可用的图像，或其中没有隐藏的集合。
/// * 指定的集合不存在。
/// * 任何一个集合提取失败。
pub fn handle_extract(args: ExtractArgs) -> Result<()> {
    let config = LsbConfig::new(args.bits, args.alpha)?;
    create_output_dir(&args.output)?;

    log::info!("Locating and parsing images");
    let Scan { carriers, rejected } = discovery::scan_carriers(&args.images, config);
    report_rejected(&rejected);
    if carriers.is_empty() {
        return Err(StegoError::NoImagesFound.into());
    }
    let found = carriers.len() + rejected.len();

    log::debug!("Filtering unsigned images");
    let signed = decoder::discover(carriers);
    for (path, err) in &signed.rejected {
        log::debug!("Rejected {}: {err}", path.display());
    }
    log::debug!("Removed {} unsigned images", signed.rejected.len());
    log::info!(
        "Images found: {}, signed: {}, rejected: {}",
        found,
        signed.carriers.len(),
        rejected.len() + signed.rejected.len()
    );
    if signed.carriers.is_empty() {
        return Err(StegoError::NoCollectionsFound.into());
    }

    let collections = decoder::regroup(signed.carriers, args.collection)?;
    log::info!("Found {} data collections", collections.len());
    if collections.len() > 1 && args.collection.is_none() {
        log::info!(
            "{} Use --collection to extract only one of them",
            "[TIP]".magenta()
        );
    }

    let total = collections.len();
    let mut failed = 0;
    for mut collection in collections {
        let id = collection.id();
        log::info!("Extracting collection {}", id.to_string().bold());
        for issue in collection.sequence_issues() {
            log::warn!("Collection {id}: {issue}");
        }

        let dest = collection_dir(&args.output, id, args.flat);
        match extract_collection(&mut collection, &dest) {
            Ok(files) => log::info!(
                "Extracted {} files of collection {} to {}",
                files.len().to_string().green().bold(),
                id.to_string().green().bold(),
                dest.to_string_lossy().green().bold()
            ),
            Err(err) => {
                log::error!("Failed to extract collection {id}: {err:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(StegoError::ExtractionFailed { failed, total }.into());
    }
    Ok(())
}

/// 从错误链中找到第一个 [`StegoError`] 并返回对应的退出码。
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StegoError>())
        .map_or(codes::UNKNOWN, StegoError::exit_code)
}

fn extract_collection(collection: &mut Collection, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut file = tempfile::tempfile().context("Unable to create a temporary file")?;
    let len = collection.reassemble(&mut file)?;
    log::debug!(
        "Recovered {} bytes from {} images",
        len,
        collection.images().len()
    );
    file.seek(SeekFrom::Start(0))?;

    let reader = archive::open_payload(file, collection.is_compressed()).map_err(StegoError::from)?;
    let files = archive::unpack(reader, dest)
        .map_err(StegoError::from)
        .context(
            "The recovered data is not a valid archive. \nCheck that --bits and --alpha match the values used when hiding.",
        )?;
    Ok(files)
}

fn collection_dir(output: &Path, collection: CollectionId, flat: bool) -> PathBuf {
    if flat {
        output.to_path_buf()
    } else {
        output.join(collection.to_string())
    }
}

fn create_output_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| StegoError::OutputDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn report_rejected(rejected: &[(PathBuf, StegoError)]) {
    for (path, err) in rejected {
        match err {
            StegoError::ImageTooSmall { .. } => {
                log::warn!("Image is too small [{}]", path.display())
            }
            _ => log::warn!("Unsupported or unreadable image [{}]", path.display()),
        }
        log::debug!("{err}");
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}{}", UNITS[0])
    } else {
        format!("{size:.1}{}", UNITS[unit])
    }
}
