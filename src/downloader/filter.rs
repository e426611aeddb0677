// src/downloader/filter.rs

use crate::{constants, models::MediaKind};

/// 判断某个媒体的格式是否在允许下载的范围内。
///
/// 只有 audio / document / video 按格式过滤：白名单非空、不含 "all" 且不含实际格式时拒绝。
/// 其余类型总是允许。
pub fn can_download(
    kind: MediaKind,
    allowed_formats: &[String],
    actual_format: Option<&str>,
) -> bool {
    if !kind.has_format_filter() || allowed_formats.is_empty() {
        return true;
    }
    if allowed_formats
        .iter()
        .any(|f| f.eq_ignore_ascii_case(constants::FORMAT_WILDCARD))
    {
        return true;
    }
    actual_format.is_some_and(|actual| {
        allowed_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(actual))
    })
}
