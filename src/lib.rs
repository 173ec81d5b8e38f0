//! # NIfTI-volume library
//!
//! Slice rendering and interactive mask editing for NIfTI scan volumes.

//!
//! This crate is the rendering and editing core of a slice-by-slice scan
//! viewer. It decodes a NIfTI-1 file (optionally gzip-compressed, with
//! uint8/int16/float32 voxels) into an immutable [`volume::Volume`], renders
//! axial slices as grayscale RGBA rasters under auto or fixed window
//! width/level contrast, and overlays a separately held binary mask, either
//! per slice on the fly or through a precomputed whole-volume composite
//! cache for fast scroll-through.
//!
//! All heavy numeric work runs on a background [`worker::RenderWorker`]
//! thread that exclusively owns the loaded volumes and answers plain-data
//! messages. The main-thread side layers the returned rasters with
//! [`compositor::DisplayCompositor`], drops stale replies with
//! [`compositor::SliceGate`], and feeds pointer input through
//! [`interaction::InteractionController`] for bounding-box drawing and
//! freehand brush/eraser mask editing. Finished strokes compress into
//! one-byte-per-pixel [`mask::MaskRecord`]s, the form handed to external
//! collaborators such as a remote segmentation service.
//!
//! # Examples
//!
//! ## Rendering the middle slice of a scan
//!
//! Load a file off the interactive thread, then request a slice raster.
//!
//! ```no_run
//! # use nifti_volume::compositor::{DisplayCompositor, SliceGate};
//! # use nifti_volume::windowing::Windowing;
//! # use nifti_volume::worker::{RenderWorker, Request, Response};
//! # use std::time::Duration;
//! let bytes = std::fs::read("scan.nii.gz").expect("should have read scan file");
//! let worker = RenderWorker::spawn();
//! let mut gate = SliceGate::default();
//! let mut compositor = DisplayCompositor::default();
//!
//! worker.request(Request::LoadImage { bytes });
//! let header = match worker.recv_timeout(Duration::from_secs(10)) {
//!     Some(Response::ImageLoaded { header }) => header,
//!     other => panic!("load failed: {other:?}"),
//! };
//!
//! worker.request(Request::GetSlice {
//!     seq: gate.next_seq(),
//!     slice_index: header.dims.2 / 2,
//!     windowing: Windowing::Auto,
//! });
//! if let Some(Response::SliceReady { seq, base, .. }) =
//!     worker.recv_timeout(Duration::from_secs(10))
//! {
//!     if gate.admit(seq) {
//!         compositor.set_base(base);
//!         compositor.present().save("slice.png").unwrap();
//!     }
//! }
//! ```

pub mod compositor;
pub mod enums;
pub mod interaction;
pub mod mask;
pub mod volume;
pub mod volume_loader;
pub mod windowing;
pub mod worker;
