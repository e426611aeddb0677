// src/downloader/dedup.rs

use crate::{constants, error::AppResult, utils};
use log::{debug, info};
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static COPY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:{}\d+)+$", regex::escape(constants::COPY_SUFFIX))).unwrap()
});

/// 去掉文件名主干末尾的 `-copyN` 后缀
fn base_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    COPY_SUFFIX_RE.replace(&stem, "").into_owned()
}

/// 检查刚下载的文件是否与同目录下的同名文件内容重复。
///
/// 同目录中以相同基础名开头的文件逐一比较 (先比大小，再比 MD5)。
/// 若发现内容相同的文件，删除 `path` 并返回已有文件的路径；否则原样返回 `path`。
pub fn manage_duplicate_file(path: &Path) -> AppResult<PathBuf> {
    let Some(parent) = path.parent() else {
        return Ok(path.to_path_buf());
    };
    let base = base_stem(path);
    let file_name = path.file_name();

    // 直接按前缀比较目录项，文件名中的 `[`、`*` 等字符无需转义
    let mut siblings: Vec<PathBuf> = fs::read_dir(parent)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| Some(entry.file_name().as_os_str()) != file_name)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&base))
        .map(|entry| entry.path())
        .collect();
    // 原始文件名最短，优先保留
    siblings.sort_by(|a, b| {
        let (a, b) = (a.as_os_str(), b.as_os_str());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });

    if siblings.is_empty() {
        return Ok(path.to_path_buf());
    }

    let current_size = fs::metadata(path)?.len();
    let mut current_md5: Option<String> = None;
    for sibling in siblings {
        if fs::metadata(&sibling)?.len() != current_size {
            continue;
        }
        let current = match &current_md5 {
            Some(hash) => hash.clone(),
            None => {
                let hash = utils::calculate_file_md5(path)?;
                current_md5 = Some(hash.clone());
                hash
            }
        };
        let sibling_md5 = utils::calculate_file_md5(&sibling)?;
        debug!(
            "比较 MD5: {} ({}) <-> {} ({})",
            path.display(),
            current,
            sibling.display(),
            sibling_md5
        );
        if sibling_md5 == current {
            fs::remove_file(path)?;
            info!("删除重复文件 {}，保留 {}", path.display(), sibling.display());
            return Ok(sibling);
        }
    }
    Ok(path.to_path_buf())
}
