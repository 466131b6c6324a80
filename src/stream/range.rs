// HTTP Range 解析

/// 闭区间字节范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// 区间字节数
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Content-Range 响应头值
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// 解析单个 `bytes=start-end` 范围并裁剪到文件大小
///
/// end 缺省取 size-1，超界的 end 裁剪到 size-1。
/// 无法解析、start 越界或多段范围时返回 None，调用方按无
/// Range 处理（完整 200 响应）
pub fn parse_range(header: &str, file_size: u64) -> Option<ByteRange> {
    if file_size == 0 {
        return None;
    }

    let spec = header.strip_prefix("bytes=")?;
    let (start_raw, end_raw) = spec.split_once('-')?;

    let start: u64 = start_raw.trim().parse().ok()?;
    let end: u64 = match end_raw.trim() {
        "" => file_size - 1,
        raw => raw.parse().ok()?,
    };

    let end = end.min(file_size - 1);
    if start > end {
        return None;
    }

    Some(ByteRange { start, end })
}
