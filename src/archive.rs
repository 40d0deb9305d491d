//! # 载荷打包模块
//!
//! 把要隐藏的文件打包成一个字节流，并在提取后还原。
//!
//! 每个条目依次为：`u16` 路径长度 (大端)、以 `/` 分隔的 UTF-8 路径、
//! `u64` 数据长度 (大端)、数据本身；路径长度为 0 表示结束。
//! 打包结果可以再经过 zstd 压缩，只有压缩后更小时才使用压缩形式。

use crate::error::ArchiveError;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

type Result<T> = std::result::Result<T, ArchiveError>;

/// 准备写入图像的载荷，位于一个已回到开头的临时文件中。
#[derive(Debug)]
pub struct PackedPayload {
    pub file: File,
    pub len: u64,
    pub raw_len: u64,
    pub compressed: bool,
    pub entries: usize,
}

/// 打包 `sources` 下的所有文件。
/// 文件以其文件名入包，目录以目录名作为路径的第一段。
///
/// `level` 为 `Some` 时尝试用 zstd 压缩。
pub fn pack(sources: &[PathBuf], level: Option<i32>) -> Result<PackedPayload> {
    let entries = collect_entries(sources)?;
    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }

    let mut bundle = tempfile::tempfile()?;
    {
        let mut writer = BufWriter::new(&mut bundle);
        for (name, path) in &entries {
            write_entry(&mut writer, name, path)?;
        }
        writer.write_all(&0u16.to_be_bytes())?;
        writer.flush()?;
    }
    let raw_len = bundle.stream_position()?;
    bundle.seek(SeekFrom::Start(0))?;

    let mut payload = PackedPayload {
        file: bundle,
        len: raw_len,
        raw_len,
        compressed: false,
        entries: entries.len(),
    };

    if let Some(level) = level {
        let mut compressed = tempfile::tempfile()?;
        zstd::stream::copy_encode(BufReader::new(&mut payload.file), &mut compressed, level)?;
        let compressed_len = compressed.stream_position()?;
        log::debug!("Compressed payload from {raw_len} to {compressed_len} bytes (level {level})");

        if compressed_len < raw_len {
            compressed.seek(SeekFrom::Start(0))?;
            payload.file = compressed;
            payload.len = compressed_len;
            payload.compressed = true;
        } else {
            payload.file.seek(SeekFrom::Start(0))?;
        }
    }

    Ok(payload)
}

/// 根据头部的压缩标志，把恢复出的字节流包装成可直接解包的读取器。
pub fn open_payload<'a, R>(reader: R, compressed: bool) -> Result<Box<dyn Read + 'a>>
where
    R: Read + 'a,
{
    if compressed {
        Ok(Box::new(zstd::stream::read::Decoder::new(reader)?))
    } else {
        Ok(Box::new(BufReader::new(reader)))
    }
}

/// 把包中的文件还原到 `dest` 下，返回写出的文件路径。
pub fn unpack<R: Read>(mut reader: R, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    loop {
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let len = u16::from_be_bytes(len) as usize;
        if len == 0 {
            return Ok(written);
        }

        let mut name = vec![0u8; len];
        reader.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|err| ArchiveError::UnsafePath(String::from_utf8_lossy(err.as_bytes()).into_owned()))?;
        let target = dest.join(safe_relative_path(&name)?);

        let mut size = [0u8; 8];
        reader.read_exact(&mut size)?;
        let size = u64::from_be_bytes(size);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(File::create(&target)?);
        let copied = io::copy(&mut (&mut reader).take(size), &mut file)?;
        if copied != size {
            return Err(ArchiveError::Truncated(name));
        }
        file.flush()?;
        log::debug!("Unpacked {} ({size} bytes)", target.display());
        written.push(target);
    }
}

fn write_entry<W: Write>(writer: &mut W, name: &str, path: &Path) -> Result<()> {
    let name_len =
        u16::try_from(name.len()).map_err(|_| ArchiveError::PathTooLong(path.to_path_buf()))?;
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    writer.write_all(&name_len.to_be_bytes())?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&size.to_be_bytes())?;
    let copied = io::copy(&mut (&mut file).take(size), writer)?;
    if copied != size {
        return Err(ArchiveError::Truncated(name.to_owned()));
    }
    Ok(())
}

/// 收集 (包内路径, 磁盘路径)，按包内路径排序。
fn collect_entries(sources: &[PathBuf]) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for source in sources {
        let root = source.parent().unwrap_or_else(|| Path::new(""));
        for path in crate::discovery::collect_files(std::slice::from_ref(source)) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            entries.push((archive_name(relative)?, path));
        }
    }
    entries.sort();
    entries.dedup_by(|duplicate, kept| {
        let same = duplicate.0 == kept.0;
        if same {
            log::warn!(
                "Skipping {}: {} is already archived as {}",
                duplicate.1.display(),
                kept.1.display(),
                kept.0
            );
        }
        same
    });
    Ok(entries)
}

fn archive_name(relative: &Path) -> Result<String> {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(ArchiveError::UnsafePath(relative.display().to_string()));
    }
    Ok(parts.join("/"))
}

fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for part in name.split('/') {
        if part.is_empty() || part == "." || part == ".." || part.contains('\\') {
            return Err(ArchiveError::UnsafePath(name.to_owned()));
        }
        let component = Path::new(part);
        if component.is_absolute() || component.components().count() != 1 {
            return Err(ArchiveError::UnsafePath(name.to_owned()));
        }
        path.push(component);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pack_and_unpack_restore_the_tree() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let data = dir.path().join("data");
        fs::create_dir_all(data.join("nested"))?;
        fs::write(data.join("a.txt"), "alpha")?;
        fs::write(data.join("nested/b.bin"), [0u8, 1, 2, 3])?;
        let single = dir.path().join("single.txt");
        fs::write(&single, "x".repeat(4096))?;

        for level in [None, Some(3)] {
            let payload = pack(&[data.clone(), single.clone()], level)?;
            assert_eq!(payload.entries, 3);
            assert_eq!(payload.compressed, level.is_some());

            let out = dir.path().join(format!("out_{}", level.is_some()));
            let reader = open_payload(payload.file, payload.compressed)?;
            let files = unpack(reader, &out)?;
            assert_eq!(files.len(), 3);

            assert_eq!(fs::read_to_string(out.join("data/a.txt"))?, "alpha");
            assert_eq!(fs::read(out.join("data/nested/b.bin"))?, vec![0u8, 1, 2, 3]);
            assert_eq!(fs::read_to_string(out.join("single.txt"))?, "x".repeat(4096));
        }
        Ok(())
    }

    #[test]
    fn empty_sources_are_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        assert!(matches!(
            pack(&[dir.path().to_path_buf()], None),
            Err(ArchiveError::Empty)
        ));
        Ok(())
    }

    #[test]
    fn traversal_paths_are_rejected() {
        for name in ["../evil", "/etc/passwd", "a//b", "a/./b", "a\\..\\b"] {
            assert!(
                matches!(safe_relative_path(name), Err(ArchiveError::UnsafePath(_))),
                "{name} should be rejected"
            );
        }
        assert_eq!(safe_relative_path("a/b.txt").unwrap(), Path::new("a").join("b.txt"));
    }

    #[test]
    fn truncated_entry_is_an_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut bundle = Vec::new();
        bundle.extend_from_slice(&5u16.to_be_bytes());
        bundle.extend_from_slice(b"f.txt");
        bundle.extend_from_slice(&10u64.to_be_bytes());
        bundle.extend_from_slice(b"short");

        let result = unpack(bundle.as_slice(), dir.path());
        assert!(matches!(result, Err(ArchiveError::Truncated(name)) if name == "f.txt"));
        Ok(())
    }
}
