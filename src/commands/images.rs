use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use image::codecs::jpeg::JpegEncoder;
use log::{debug, info, warn};

use crate::runtime::Runtime;

use super::Context;

const JPEG_QUALITY: u8 = 80;

/// A PNG that was replaced by a JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Convert opaque PNGs under `<assets>/images` to JPEG and point the asset
/// records at the new files.
///
/// Returns the number of images converted.
#[tracing::instrument(skip(ctx))]
pub fn run<R: Runtime>(ctx: &Context<'_, R>) -> Result<usize> {
    let images_dir = ctx.config.images_dir();
    if !ctx.runtime.is_dir(&images_dir) {
        warn!("No images directory at {:?}", images_dir);
        return Ok(0);
    }

    let mut renames = Vec::new();
    for path in ctx.runtime.read_dir(&images_dir)? {
        if !is_png(&path) {
            continue;
        }
        match convert(ctx.runtime, &path) {
            Ok(Some(rename)) => renames.push(rename),
            Ok(None) => debug!("{:?} has transparency, keeping it", path),
            Err(e) => warn!("Failed to convert {:?}: {:#}", path, e),
        }
    }

    if !renames.is_empty() {
        rewrite_references(ctx, &renames)?;
    }

    info!("Converted {} images", renames.len());
    Ok(renames.len())
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Re-encode one PNG as JPEG if it has no alpha channel.
fn convert<R: Runtime>(runtime: &R, png: &Path) -> Result<Option<Rename>> {
    let bytes = runtime.read(png)?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode {:?}", png))?;
    if img.color().has_alpha() {
        return Ok(None);
    }

    let jpg = png.with_extension("jpg");
    info!("Converting {:?} to {:?}", png, jpg);

    let mut buf = Cursor::new(Vec::new());
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .with_context(|| format!("Failed to encode {:?}", jpg))?;
    runtime.write(&jpg, buf.get_ref())?;
    runtime.remove_file(png)?;

    Ok(Some(Rename {
        from: file_name(png),
        to: file_name(&jpg),
    }))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn rewrite_references<R: Runtime>(ctx: &Context<'_, R>, renames: &[Rename]) -> Result<()> {
    let store = ctx.store();
    let records: Vec<(PathBuf, _)> = store.load_all(None)?;

    for (path, mut record) in records {
        let mut changed = false;
        for rename in renames {
            changed |= record.replace_text(&rename.from, &rename.to);
        }
        if changed {
            debug!("Updating image references in {:?}", path);
            if let Err(e) = store.save(&path, &record) {
                warn!("{:#}", e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{config_for, context};
    use crate::provider::MockProvider;
    use crate::runtime::RealRuntime;
    use crate::vcs::MockVersionControl;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_is_png() {
        assert!(is_png(Path::new("a/b.png")));
        assert!(is_png(Path::new("B.PNG")));
        assert!(!is_png(Path::new("b.jpg")));
        assert!(!is_png(Path::new("png")));
    }

    #[test]
    fn test_opaque_png_converted_and_references_updated() {
        let dir = tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))
            .save(images.join("hero.png"))
            .unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]))
            .save(images.join("logo.png"))
            .unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"name": "A", "images": {"hero": "/images/hero.png", "thumb": "/images/logo.png"}}"#,
        )
        .unwrap();
        let untouched = r#"{"name": "B", "images": {"hero": "/images/other.png"}}"#;
        std::fs::write(dir.path().join("b.json"), untouched).unwrap();

        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let vcs = MockVersionControl::new();
        let config = config_for(dir.path());
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).unwrap(), 1);

        assert!(!images.join("hero.png").exists());
        let jpg = image::open(images.join("hero.jpg")).unwrap();
        assert_eq!((jpg.width(), jpg.height()), (4, 4));
        assert!(images.join("logo.png").exists());

        let a: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("a.json")).unwrap())
                .unwrap();
        assert_eq!(a["images"]["hero"], "/images/hero.jpg");
        assert_eq!(a["images"]["thumb"], "/images/logo.png");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("b.json")).unwrap(),
            untouched
        );
    }

    #[test]
    fn test_undecodable_png_skipped() {
        let dir = tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("broken.png"), b"not a png").unwrap();

        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let vcs = MockVersionControl::new();
        let config = config_for(dir.path());
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).unwrap(), 0);
        assert!(images.join("broken.png").exists());
    }

    #[test]
    fn test_missing_images_dir() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let provider = MockProvider::new();
        let vcs = MockVersionControl::new();
        let config = config_for(dir.path());
        let ctx = context(&runtime, &provider, &vcs, &config);

        assert_eq!(run(&ctx).unwrap(), 0);
    }
}
