//! Main-thread presentation surface.
//!
//! Three RGBA layers (base image, mask overlay, interactive UI) are kept at
//! the data dimensions of the current slice, independent of how large the
//! surface is displayed. `present` flattens them with ordinary alpha-over
//! compositing.

use crate::interaction::BoundingBox;
use crate::volume::SliceRaster;

use image::Rgba;

const BOX_STROKE: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BOX_STROKE_WIDTH: u32 = 2;
const BOX_HANDLE_SIZE: u32 = 4;

/// Discards slice responses that are older than the most recent request.
///
/// Every `GetSlice` request takes its sequence number from `next_seq`; the
/// echoed number in `SliceReady` is checked with `admit` before the raster
/// is applied. With several requests in flight during fast scrolling, only
/// the newest one may update the display.
#[derive(Debug, Default)]
pub struct SliceGate {
    latest: u64,
}

impl SliceGate {
    /// Sequence number for the next request. Monotonically increasing.
    pub fn next_seq(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    /// Whether a response with this sequence number may be displayed.
    pub fn admit(&self, seq: u64) -> bool {
        seq == self.latest
    }
}

/// Layered presentation surface sized to the current slice.
pub struct DisplayCompositor {
    base: SliceRaster,
    mask: SliceRaster,
    ui: SliceRaster,
}

impl Default for DisplayCompositor {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl DisplayCompositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            base: opaque_black(width, height),
            mask: SliceRaster::new(width, height),
            ui: SliceRaster::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.base.width()
    }

    pub fn height(&self) -> u32 {
        self.base.height()
    }

    /// Resize all layers to the given data dimensions. A no-op when the
    /// dimensions already match; otherwise all layers are cleared, since
    /// rasters from a differently sized volume cannot be reused.
    pub fn sync_dimensions(&mut self, width: u32, height: u32) {
        if self.width() == width && self.height() == height {
            return;
        }
        self.base = opaque_black(width, height);
        self.mask = SliceRaster::new(width, height);
        self.ui = SliceRaster::new(width, height);
    }

    /// Install a freshly rendered base raster, resizing the surface to it.
    pub fn set_base(&mut self, raster: SliceRaster) {
        self.sync_dimensions(raster.width(), raster.height());
        self.base = raster;
    }

    /// Install or clear the mask overlay layer.
    pub fn set_mask(&mut self, raster: Option<SliceRaster>) {
        match raster {
            Some(raster) => {
                self.sync_dimensions(raster.width(), raster.height());
                self.mask = raster;
            }
            None => self.mask = SliceRaster::new(self.width(), self.height()),
        }
    }

    /// The mask layer, edited in place by the brush and eraser tools.
    pub fn mask_layer_mut(&mut self) -> &mut SliceRaster {
        &mut self.mask
    }

    pub fn mask_layer(&self) -> &SliceRaster {
        &self.mask
    }

    /// Clear the interactive layer.
    pub fn clear_ui(&mut self) {
        self.ui = SliceRaster::new(self.width(), self.height());
    }

    /// Draw a bounding box outline with corner handles on the UI layer.
    pub fn draw_bounding_box(&mut self, bbox: &BoundingBox) {
        self.clear_ui();
        let (x1, y1) = (bbox.x1.round() as i64, bbox.y1.round() as i64);
        let (x2, y2) = (bbox.x2.round() as i64, bbox.y2.round() as i64);

        let stroke = BOX_STROKE_WIDTH as i64;
        self.fill_ui_rect(x1, y1, x2 - x1, stroke);
        self.fill_ui_rect(x1, y2 - stroke, x2 - x1, stroke);
        self.fill_ui_rect(x1, y1, stroke, y2 - y1);
        self.fill_ui_rect(x2 - stroke, y1, stroke, y2 - y1);

        let handle = BOX_HANDLE_SIZE as i64;
        for (cx, cy) in [(x1, y1), (x2, y1), (x1, y2), (x2, y2)] {
            self.fill_ui_rect(cx - handle / 2, cy - handle / 2, handle, handle);
        }
    }

    fn fill_ui_rect(&mut self, x: i64, y: i64, w: i64, h: i64) {
        let width = self.ui.width() as i64;
        let height = self.ui.height() as i64;
        for py in y.max(0)..(y + h).min(height) {
            for px in x.max(0)..(x + w).min(width) {
                self.ui.put_pixel(px as u32, py as u32, BOX_STROKE);
            }
        }
    }

    /// Flatten base, mask and UI layers into one opaque raster.
    pub fn present(&self) -> SliceRaster {
        let mut out = self.base.clone();
        for layer in [&self.mask, &self.ui] {
            for (dst, src) in out.pixels_mut().zip(layer.pixels()) {
                *dst = over(*src, *dst);
            }
        }
        out
    }
}

fn opaque_black(width: u32, height: u32) -> SliceRaster {
    SliceRaster::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}

/// Source-over blend of one pixel.
fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let alpha = src.0[3] as u16;
    if alpha == 255 {
        return src;
    }
    if alpha == 0 {
        return dst;
    }
    let inverse = 255 - alpha;
    let blend = |s: u8, d: u8| ((s as u16 * alpha + d as u16 * inverse) / 255) as u8;
    Rgba([
        blend(src.0[0], dst.0[0]),
        blend(src.0[1], dst.0[1]),
        blend(src.0[2], dst.0[2]),
        dst.0[3].max(src.0[3]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::OVERLAY_RGBA;

    #[test]
    fn gate_admits_only_latest_sequence() {
        let mut gate = SliceGate::default();
        let first = gate.next_seq();
        let second = gate.next_seq();
        let third = gate.next_seq();
        assert!(!gate.admit(first));
        assert!(!gate.admit(second));
        assert!(gate.admit(third));
    }

    #[test]
    fn surface_tracks_raster_dimensions() {
        let mut compositor = DisplayCompositor::default();
        compositor.set_base(SliceRaster::new(16, 8));
        assert_eq!((compositor.width(), compositor.height()), (16, 8));
        // Same dimensions: layers untouched.
        compositor.mask_layer_mut().put_pixel(0, 0, Rgba(OVERLAY_RGBA));
        compositor.set_base(SliceRaster::new(16, 8));
        assert_eq!(compositor.mask_layer().get_pixel(0, 0).0, OVERLAY_RGBA);
        // New dimensions: everything resets.
        compositor.set_base(SliceRaster::new(4, 4));
        assert_eq!(compositor.mask_layer().get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn present_blends_overlay_over_base() {
        let mut compositor = DisplayCompositor::new(1, 1);
        compositor.set_base(SliceRaster::from_pixel(1, 1, Rgba([100, 100, 100, 255])));
        compositor.set_mask(Some(SliceRaster::from_pixel(1, 1, Rgba(OVERLAY_RGBA))));
        let out = compositor.present();
        // 50% red over mid-gray: r = (255*128 + 100*127)/255.
        assert_eq!(out.get_pixel(0, 0).0, [177, 49, 49, 255]);
    }

    #[test]
    fn transparent_layers_leave_base_untouched() {
        let mut compositor = DisplayCompositor::new(2, 2);
        compositor.set_base(SliceRaster::from_pixel(2, 2, Rgba([9, 9, 9, 255])));
        let out = compositor.present();
        assert!(out.pixels().all(|p| p.0 == [9, 9, 9, 255]));
    }

    #[test]
    fn bounding_box_outline_lands_on_ui_layer() {
        let mut compositor = DisplayCompositor::new(100, 100);
        compositor.draw_bounding_box(&BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 80.0,
            y2: 80.0,
        });
        let out = compositor.present();
        assert_eq!(out.get_pixel(10, 10).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(79, 45).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(45, 45).0, [0, 0, 0, 255]);
    }
}
