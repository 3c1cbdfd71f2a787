use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lopdf::{Document, Object, Stream, dictionary};
use std::path::Path;
use tracing::debug;

use super::{AcquisitionContext, AcquisitionStep, Produced};
use crate::models::AcquisitionStrategy;

/// A4 portrait in points.
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const PAGE_MARGIN: f64 = 24.0;

/// Last resort: rasterize the report region onto a single PDF page.
pub struct ScreenshotRender;

#[async_trait]
impl AcquisitionStep for ScreenshotRender {
    fn strategy(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::ScreenshotRender
    }

    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
        let png = staging.with_extension("png");
        let selector = ctx
            .settings
            .screenshot_selector
            .as_deref()
            .or(ctx.probe.region_selector.as_deref())
            .unwrap_or(ctx.probe.table_selector.as_str());

        if let Err(err) = ctx.page.screenshot(Some(selector), &png).await {
            debug!(selector, error = %err, "Region screenshot failed, capturing full page");
            ctx.page.screenshot(None, &png).await?;
        }
        let bytes = tokio::fs::read(&png).await?;
        let _ = tokio::fs::remove_file(&png).await;

        let pdf = png_to_pdf(&bytes)?;
        tokio::fs::write(staging, pdf).await?;
        Ok(Produced::File { has_content: true })
    }
}

/// Embed a PNG as an RGB image on one A4 page, scaled to fit the margins.
pub fn png_to_pdf(png: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .context("Screenshot is not a valid PNG")?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        bail!("Screenshot has no pixels");
    }

    let scale = ((PAGE_WIDTH - 2.0 * PAGE_MARGIN) / width as f64)
        .min((PAGE_HEIGHT - 2.0 * PAGE_MARGIN) / height as f64);
    let drawn_width = width as f64 * scale;
    let drawn_height = height as f64 * scale;
    let x = (PAGE_WIDTH - drawn_width) / 2.0;
    let y = PAGE_HEIGHT - PAGE_MARGIN - drawn_height;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));
    let content = format!(
        "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Shot Do Q\n",
        drawn_width, drawn_height, x, y
    )
    .into_bytes();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Shot" => image_id },
        },
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(PAGE_WIDTH as f32), Object::Real(PAGE_HEIGHT as f32)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionSettings;
    use crate::testing::FixturePage;
    use reportflow_browser::ReportProbe;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn png_becomes_single_page_pdf() {
        let pdf = png_to_pdf(&png(300, 120)).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(png_to_pdf(b"not an image").is_err());
    }

    #[tokio::test]
    async fn produces_pdf_from_page_screenshot() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("doc.part");
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = ReportProbe {
            table_selector: "#gvReport".to_string(),
            empty_markers: Vec::new(),
            period_selector: None,
            region_selector: None,
        };
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let produced = ScreenshotRender.produce(&mut ctx, &staging).await.unwrap();
        assert_eq!(produced, Produced::File { has_content: true });
        let bytes = std::fs::read(&staging).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!staging.with_extension("png").exists());
    }
}
