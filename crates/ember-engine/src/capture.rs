//! Framebuffer screenshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::gfx::GraphicsContext;

/// `YYYYMMDD.png`: one file per day, later captures overwrite earlier ones.
pub fn screenshot_file_name(date: NaiveDate) -> String {
    format!("{}.png", date.format("%Y%m%d"))
}

/// Reads back the current frame and writes it as an RGBA PNG into `dir`.
///
/// Must run after the frame's draws and before it is presented.
pub fn capture_screenshot<C>(ctx: &mut C, dir: &Path, date: NaiveDate) -> Result<PathBuf>
where
    C: GraphicsContext + ?Sized,
{
    let pixels = ctx.read_pixels().context("reading back the framebuffer")?;
    let path = dir.join(screenshot_file_name(date));
    pixels
        .save_with_format(&path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_zero_padded_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(screenshot_file_name(date), "20240307.png");
    }
}
