// src/downloader/naming.rs

use crate::{
    constants,
    models::{MediaItem, MediaKind, MessageId},
    utils,
};
use chrono::{DateTime, FixedOffset, Utc};
use std::path::{Path, PathBuf};

/// 媒体在下载根目录下的相对位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaName {
    pub kind: MediaKind,
    /// 按媒体类型划分的子目录
    pub dir: PathBuf,
    pub file_name: String,
    /// MIME 子类型
    pub format: Option<String>,
}

impl MediaName {
    pub fn base_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// 在文件名前嵌入 `##<消息ID>##` 标记，不同消息的同名附件因此不会互相覆盖。
    /// 文件名没有扩展名时补上格式后缀。
    pub fn namespaced(&self, message_id: MessageId) -> PathBuf {
        let marker = constants::MESSAGE_ID_MARKER;
        let mut file_name = format!("{marker}{message_id}{marker}{}", self.file_name);
        if Path::new(&self.file_name).extension().is_none() {
            file_name.push('.');
            file_name.push_str(
                self.format
                    .as_deref()
                    .unwrap_or_else(|| self.kind.default_extension()),
            );
        }
        self.dir.join(file_name)
    }
}

/// 根据媒体信息推导文件名。
///
/// voice / video_note 没有自带文件名，按 `类型_时间戳.扩展名` 生成；
/// 其它类型使用声明的文件名 (清理非法字符)，没有则为空。
pub fn resolve_media_name(
    media: &MediaItem,
    fallback_date: Option<DateTime<FixedOffset>>,
) -> MediaName {
    let format = media.format();
    let file_name = if media.kind.is_nameless() {
        let date = media
            .date
            .or(fallback_date)
            .unwrap_or_else(|| Utc::now().fixed_offset());
        format!(
            "{}_{}.{}",
            media.kind,
            date.format("%Y%m%dT%H%M%S"),
            format.as_deref().unwrap_or_else(|| media.kind.default_extension())
        )
    } else {
        media
            .file_name
            .as_deref()
            .map(utils::sanitize_filename)
            .unwrap_or_default()
    };

    MediaName {
        kind: media.kind,
        dir: PathBuf::from(media.kind.as_str()),
        file_name,
        format,
    }
}

/// 生成下一个可用的文件名：`<stem>-copy<N>.<ext>`，N 从 1 开始递增。
/// 只做存在性探测，不占位；调用方需立即创建该文件。
pub fn next_available_name(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter: u32 = 1;
    loop {
        let candidate = parent.join(format!(
            "{}{}{}{}",
            stem,
            constants::COPY_SUFFIX,
            counter,
            ext
        ));
        if !utils::is_regular_file(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
