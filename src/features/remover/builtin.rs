use std::collections::{HashMap, VecDeque};
use std::io::Cursor;

use async_trait::async_trait;
use axum::body::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::{BackgroundRemover, RemoverError};

/// 进程内启发式引擎：以边框主色为背景，把与边框连通且色差在容差内的像素置为透明。
///
/// 适合纯色/近纯色背景的商品图与开发环境联调，复杂场景请使用远端模型服务。
#[derive(Debug, Clone)]
pub struct BuiltinRemover {
    tolerance: u8,
}

impl BuiltinRemover {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }
}

#[async_trait]
impl BackgroundRemover for BuiltinRemover {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn remove_background(&self, image: Bytes) -> Result<Bytes, RemoverError> {
        let tolerance = self.tolerance;
        // 解码/洪泛/编码均为 CPU 密集操作，必须移出 tokio worker。
        tokio::task::spawn_blocking(move || remove_border_background(&image, tolerance))
            .await
            .map_err(|e| RemoverError::Crashed(e.to_string()))?
            .map(Bytes::from)
    }
}

/// 同步实现：返回 PNG 编码后的 RGBA 图片
pub(crate) fn remove_border_background(input: &[u8], tolerance: u8) -> Result<Vec<u8>, RemoverError> {
    let decoded = image::load_from_memory(input).map_err(|e| RemoverError::Decode(e.to_string()))?;
    let mut rgba = decoded.to_rgba8();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Err(RemoverError::Decode("image has no pixels".to_string()));
    }

    let background = estimate_background(&rgba);
    let is_background = |p: &Rgba<u8>| p[3] == 0 || channel_distance(p, &background) <= tolerance;

    let idx = |x: u32, y: u32| (y as usize) * (w as usize) + x as usize;
    let mut visited = vec![false; (w as usize) * (h as usize)];
    let mut queue = VecDeque::new();

    for (x, y) in border_coords(w, h) {
        let i = idx(x, y);
        if !visited[i] && is_background(rgba.get_pixel(x, y)) {
            visited[i] = true;
            queue.push_back((x, y));
        }
    }

    let mut cleared = 0usize;
    while let Some((x, y)) = queue.pop_front() {
        rgba.get_pixel_mut(x, y)[3] = 0;
        cleared += 1;

        let neighbours = [
            (x.checked_sub(1), Some(y)),
            ((x + 1 < w).then_some(x + 1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), (y + 1 < h).then_some(y + 1)),
        ];
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            let i = idx(nx, ny);
            if !visited[i] && is_background(rgba.get_pixel(nx, ny)) {
                visited[i] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    tracing::debug!(
        width = w,
        height = h,
        cleared,
        "内置引擎背景像素清除完成"
    );

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| RemoverError::Encode(e.to_string()))?;
    Ok(out)
}

fn border_coords(w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let horizontal = (0..w).flat_map(move |x| [(x, 0), (x, h - 1)]);
    let vertical = (0..h).flat_map(move |y| [(0, y), (w - 1, y)]);
    horizontal.chain(vertical)
}

/// 取边框像素中出现最多的颜色桶（每通道 16 级量化），返回该桶的平均色
fn estimate_background(img: &RgbaImage) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let mut buckets: HashMap<(u8, u8, u8), (u32, [u64; 3])> = HashMap::new();
    for (x, y) in border_coords(w, h) {
        let p = img.get_pixel(x, y);
        let entry = buckets
            .entry((p[0] >> 4, p[1] >> 4, p[2] >> 4))
            .or_insert((0, [0; 3]));
        entry.0 += 1;
        for c in 0..3 {
            entry.1[c] += u64::from(p[c]);
        }
    }

    let (count, sums) = buckets
        .into_values()
        .max_by_key(|(count, _)| *count)
        .unwrap_or((1, [0; 3]));
    let avg = |s: u64| (s / u64::from(count.max(1))) as u8;
    Rgba([avg(sums[0]), avg(sums[1]), avg(sums[2]), 255])
}

fn channel_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    (0..3).map(|c| a[c].abs_diff(b[c])).max().unwrap_or(0)
}
