//! Background render worker.
//!
//! All heavy numeric passes (file decode, per-slice windowing, merged-cache
//! construction) run on a dedicated thread that exclusively owns the loaded
//! volumes. The interactive side talks to it through plain-data messages;
//! raster buffers move through the channel by value, so nothing is shared
//! and nothing is copied twice.

use crate::mask;
use crate::mask::MergedVolume;
use crate::volume::SliceRaster;
use crate::volume::Volume;
use crate::volume::VolumeHeader;
use crate::volume_loader::VolumeLoader;
use crate::windowing::Windowing;

use ndarray::Array3;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::mpsc::TryRecvError;
use std::sync::mpsc::channel;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

/// Requests accepted by the worker.
#[derive(Debug)]
pub enum Request {
    /// Decode raw file bytes into the session's base volume. Replaces any
    /// previously loaded volume and discards the mask and merged cache.
    LoadImage { bytes: Vec<u8> },
    /// Install an already-decoded mask volume and rebuild the merged cache.
    LoadMask {
        header: VolumeHeader,
        data: Vec<f32>,
    },
    /// Render one slice. `seq` is echoed back so the consumer can discard
    /// stale replies.
    GetSlice {
        seq: u64,
        slice_index: usize,
        windowing: Windowing,
    },
}

/// Replies produced by the worker, in request order.
#[derive(Debug)]
pub enum Response {
    ImageLoaded { header: VolumeHeader },
    MaskLoaded,
    SliceReady {
        seq: u64,
        slice_index: usize,
        base: SliceRaster,
        mask: Option<SliceRaster>,
    },
    Error { message: String },
}

/// Worker session lifecycle. Replaced wholesale on every `LoadImage`; never
/// partially mutated.
enum Session {
    Empty,
    Ready {
        volume: Volume,
    },
    ReadyWithMask {
        volume: Volume,
        mask: Volume,
        /// Absent when the merge failed (dimension mismatch); slice requests
        /// then fall back to per-slice overlay rendering.
        merged: Option<MergedVolume>,
    },
}

fn handle_request(session: &mut Session, request: Request) -> Option<Response> {
    match request {
        Request::LoadImage { bytes } => match VolumeLoader::load_from_bytes(&bytes) {
            Ok(volume) => {
                let header = volume.header();
                *session = Session::Ready { volume };
                Some(Response::ImageLoaded { header })
            }
            Err(err) => {
                log::warn!("volume decode failed: {err}");
                *session = Session::Empty;
                Some(Response::Error {
                    message: err.to_string(),
                })
            }
        },
        Request::LoadMask { header, data } => load_mask(session, header, data),
        Request::GetSlice {
            seq,
            slice_index,
            windowing,
        } => get_slice(session, seq, slice_index, windowing),
    }
}

fn load_mask(session: &mut Session, header: VolumeHeader, data: Vec<f32>) -> Option<Response> {
    let volume = match std::mem::replace(session, Session::Empty) {
        Session::Empty => {
            return Some(Response::Error {
                message: "mask loaded before base volume".into(),
            });
        }
        Session::Ready { volume } | Session::ReadyWithMask { volume, .. } => volume,
    };

    let (x, y, z) = header.dims;
    if data.len() != x * y * z {
        let message = format!(
            "mask buffer length {} does not match dimensions {:?}",
            data.len(),
            header.dims
        );
        log::warn!("{message}");
        *session = Session::Ready { volume };
        return Some(Response::Error { message });
    }

    let array = Array3::from_shape_vec((z, y, x), data).expect("length checked above");
    let mask = Volume::new(array, header.element_type, header.spacing);

    match MergedVolume::build(&volume, &mask) {
        Ok(merged) => {
            *session = Session::ReadyWithMask {
                volume,
                mask,
                merged: Some(merged),
            };
            Some(Response::MaskLoaded)
        }
        Err(err) => {
            // Keep the mask for on-the-fly overlays; only the cache is lost.
            log::warn!("merged cache construction failed: {err}");
            let message = err.to_string();
            *session = Session::ReadyWithMask {
                volume,
                mask,
                merged: None,
            };
            Some(Response::Error { message })
        }
    }
}

fn get_slice(
    session: &Session,
    seq: u64,
    slice_index: usize,
    windowing: Windowing,
) -> Option<Response> {
    let volume = match session {
        // The caller is expected not to request before ImageLoaded.
        Session::Empty => {
            log::debug!("GetSlice ignored: no volume loaded");
            return None;
        }
        Session::Ready { volume } => volume,
        Session::ReadyWithMask { volume, .. } => volume,
    };

    if slice_index >= volume.depth() {
        return Some(Response::Error {
            message: format!(
                "slice index {slice_index} out of range (depth {})",
                volume.depth()
            ),
        });
    }

    let (base, mask_raster) = match session {
        // The merged cache bakes whole-volume auto windowing; any other
        // windowing bypasses it and renders both layers per slice.
        Session::ReadyWithMask {
            merged: Some(merged),
            ..
        } if windowing == Windowing::Auto => (merged.slice(slice_index), None),
        Session::ReadyWithMask { volume, mask, .. } => {
            // A mismatched mask can be shallower than the base volume.
            let overlay = (slice_index < mask.depth())
                .then(|| mask::rasterize_overlay(mask, slice_index));
            (volume.extract_slice(slice_index, windowing), overlay)
        }
        Session::Ready { volume } => (volume.extract_slice(slice_index, windowing), None),
        Session::Empty => unreachable!("checked above"),
    };

    Some(Response::SliceReady {
        seq,
        slice_index,
        base,
        mask: mask_raster,
    })
}

/// Handle to the render worker thread.
///
/// Dropping the handle closes the request channel, which ends the worker
/// loop and joins the thread.
pub struct RenderWorker {
    tx: Option<Sender<Request>>,
    rx: Receiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = channel::<Request>();
        let (response_tx, response_rx) = channel::<Response>();

        let thread = thread::spawn(move || {
            let mut session = Session::Empty;
            while let Ok(request) = request_rx.recv() {
                if let Some(response) = handle_request(&mut session, request) {
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            tx: Some(request_tx),
            rx: response_rx,
            thread: Some(thread),
        }
    }

    /// Queue a request. Requests are processed and answered strictly in
    /// arrival order.
    pub fn request(&self, request: Request) {
        if let Some(tx) = &self.tx {
            if tx.send(request).is_err() {
                log::error!("render worker thread is gone");
            }
        }
    }

    /// Non-blocking poll for the next response.
    pub fn try_recv(&self) -> Option<Response> {
        match self.rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("render worker thread is gone");
                None
            }
        }
    }

    /// Block until the next response arrives or `timeout` passes.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Response> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
