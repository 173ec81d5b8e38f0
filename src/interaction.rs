//! Pointer and wheel input translated into data-space edits.
//!
//! All pointer positions arrive in presentation-surface device pixels and
//! are scaled by the buffer/display ratio per axis before anything touches a
//! raster. The controller owns the per-slice bounding-box and mask-record
//! maps; the render worker never sees them.

use crate::compositor::DisplayCompositor;
use crate::enums::Tool;
use crate::mask::MaskRecord;
use crate::volume::SliceRaster;
use crate::volume::VolumeHeader;

use image::Rgba;
use std::collections::HashMap;

/// Boxes narrower or shorter than this (in data-space pixels) are discarded
/// on release as accidental clicks.
pub const MIN_BOX_EXTENT: f32 = 5.0;

/// Brush color for painted mask pixels: fully opaque solid red.
const BRUSH_RGBA: Rgba<u8> = Rgba([255, 0, 0, 255]);
const ERASE_RGBA: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const DEFAULT_BRUSH_SIZE: u32 = 10;

/// Axis-aligned rectangle in data-space pixel coordinates, normalized so
/// `x1 <= x2` and `y1 <= y2`, scoped to a single slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_corners(a: (f32, f32), b: (f32, f32)) -> Self {
        Self {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// A finished user edit, handed to external collaborators (e.g. as the seed
/// of a remote segmentation request).
#[derive(Clone, Debug, PartialEq)]
pub enum UserEdit {
    Box(BoundingBox),
    Mask(MaskRecord),
}

enum Drag {
    Box { anchor: (f32, f32) },
    Stroke,
}

/// Translates pointer/wheel input into slice navigation, bounding boxes and
/// freehand mask edits.
pub struct InteractionController {
    tool: Tool,
    brush_size: u32,
    depth: usize,
    current_slice: usize,
    /// Device-pixel to data-pixel scale, per axis.
    scale: (f32, f32),
    drag: Option<Drag>,
    boxes: HashMap<usize, BoundingBox>,
    masks: HashMap<usize, MaskRecord>,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            depth: 0,
            current_slice: 0,
            scale: (1.0, 1.0),
            drag: None,
            boxes: HashMap::new(),
            masks: HashMap::new(),
        }
    }
}

impl InteractionController {
    /// Reset for a freshly loaded volume: navigation starts at the middle
    /// slice and all per-slice edits are discarded.
    pub fn load_volume(&mut self, header: &VolumeHeader) {
        self.depth = header.dims.2;
        self.current_slice = self.depth / 2;
        self.drag = None;
        self.boxes.clear();
        self.masks.clear();
    }

    /// Recompute the device-to-data scale from the surface's pixel buffer
    /// size and its on-screen display size. Must be called whenever either
    /// changes (new volume, window resize).
    pub fn set_viewport(&mut self, buffer: (u32, u32), display: (f32, f32)) {
        let dx = if display.0 > 0.0 { display.0 } else { 1.0 };
        let dy = if display.1 > 0.0 { display.1 } else { 1.0 };
        self.scale = (buffer.0 as f32 / dx, buffer.1 as f32 / dy);
    }

    /// Map a pointer position in device pixels to data-space coordinates.
    pub fn to_data_coords(&self, device: (f32, f32)) -> (f32, f32) {
        (device.0 * self.scale.0, device.1 * self.scale.1)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    /// Brush diameter in data-space pixels.
    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.max(1);
    }

    pub fn current_slice(&self) -> usize {
        self.current_slice
    }

    /// One discrete wheel event: advance or retreat by one slice, clamped to
    /// the volume. Returns the (possibly unchanged) slice index.
    pub fn scroll(&mut self, delta: f32) -> usize {
        if self.depth == 0 {
            return 0;
        }
        self.current_slice = if delta > 0.0 {
            (self.current_slice + 1).min(self.depth - 1)
        } else {
            self.current_slice.saturating_sub(1)
        };
        self.current_slice
    }

    /// Committed bounding box for a slice, if any.
    pub fn bounding_box(&self, slice: usize) -> Option<&BoundingBox> {
        self.boxes.get(&slice)
    }

    /// Committed mask record for a slice, if any.
    pub fn mask_record(&self, slice: usize) -> Option<&MaskRecord> {
        self.masks.get(&slice)
    }

    /// Pointer button pressed at a device-pixel position.
    pub fn pointer_down(&mut self, device: (f32, f32), compositor: &mut DisplayCompositor) {
        let pos = self.to_data_coords(device);
        match self.tool {
            Tool::BoundingBox => {
                self.drag = Some(Drag::Box { anchor: pos });
                compositor.clear_ui();
            }
            Tool::Brush | Tool::Eraser => {
                self.drag = Some(Drag::Stroke);
                self.stamp(pos, compositor.mask_layer_mut());
            }
        }
    }

    /// Pointer moved while the button is held. Each move event stamps once;
    /// the stroke is the union of the sampled circles.
    pub fn pointer_move(&mut self, device: (f32, f32), compositor: &mut DisplayCompositor) {
        let pos = self.to_data_coords(device);
        match self.drag {
            Some(Drag::Box { anchor }) => {
                let live = BoundingBox::from_corners(anchor, pos);
                compositor.draw_bounding_box(&live);
            }
            Some(Drag::Stroke) => self.stamp(pos, compositor.mask_layer_mut()),
            None => {}
        }
    }

    /// Pointer button released. Commits the gesture and returns the
    /// resulting edit, if the gesture produced one.
    pub fn pointer_up(
        &mut self,
        device: (f32, f32),
        compositor: &mut DisplayCompositor,
    ) -> Option<UserEdit> {
        let pos = self.to_data_coords(device);
        match self.drag.take() {
            Some(Drag::Box { anchor }) => {
                let bbox = BoundingBox::from_corners(anchor, pos);
                if bbox.width() > MIN_BOX_EXTENT && bbox.height() > MIN_BOX_EXTENT {
                    self.boxes.insert(self.current_slice, bbox);
                    compositor.draw_bounding_box(&bbox);
                    Some(UserEdit::Box(bbox))
                } else {
                    // Accidental click.
                    compositor.clear_ui();
                    None
                }
            }
            Some(Drag::Stroke) => {
                let record = MaskRecord::from_raster(compositor.mask_layer());
                self.masks.insert(self.current_slice, record.clone());
                Some(UserEdit::Mask(record))
            }
            None => None,
        }
    }

    fn stamp(&self, center: (f32, f32), layer: &mut SliceRaster) {
        let color = match self.tool {
            Tool::Eraser => ERASE_RGBA,
            _ => BRUSH_RGBA,
        };
        stamp_circle(layer, center, self.brush_size, color);
    }
}

/// Write a filled circle of the given diameter, sampled at pixel centers.
fn stamp_circle(layer: &mut SliceRaster, center: (f32, f32), diameter: u32, color: Rgba<u8>) {
    let radius = diameter as f32 / 2.0;
    let x_lo = ((center.0 - radius).floor().max(0.0)) as u32;
    let y_lo = ((center.1 - radius).floor().max(0.0)) as u32;
    let x_hi = (((center.0 + radius).ceil()).max(0.0) as u32).min(layer.width());
    let y_hi = (((center.1 + radius).ceil()).max(0.0) as u32).min(layer.height());

    for y in y_lo..y_hi {
        for x in x_lo..x_hi {
            let dx = x as f32 + 0.5 - center.0;
            let dy = y as f32 + 0.5 - center.1;
            if dx * dx + dy * dy <= radius * radius {
                layer.put_pixel(x, y, color);
            }
        }
    }
}
