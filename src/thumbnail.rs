use eframe::egui::ColorImage;

/// Downloads and decodes a thumbnail image. Blocking; run it off the UI thread.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    match try_fetch(url) {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("Could not load thumbnail {url}: {e}");
            None
        }
    }
}

fn try_fetch(url: &str) -> Result<ColorImage, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    decode_thumbnail(&bytes)
}

/// Decodes any format the `image` crate understands into an egui image.
pub fn decode_thumbnail(bytes: &[u8]) -> Result<ColorImage, Box<dyn std::error::Error + Send + Sync>> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, &img))
}
