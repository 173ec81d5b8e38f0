use std::time::Duration;

use nifti_volume::{
    compositor::{DisplayCompositor, SliceGate},
    windowing::Windowing,
    worker::{RenderWorker, Request, Response},
};

fn main() {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .expect("usage: nifti-volume <scan.nii[.gz]>");
    let bytes = std::fs::read(&path).expect("should have read scan file");

    let worker = RenderWorker::spawn();
    worker.request(Request::LoadImage { bytes });

    let header = match worker.recv_timeout(Duration::from_secs(30)) {
        Some(Response::ImageLoaded { header }) => header,
        other => panic!("failed to load {path}: {other:?}"),
    };
    log::info!("loaded volume {:?} from {path}", header.dims);

    let mut gate = SliceGate::default();
    worker.request(Request::GetSlice {
        seq: gate.next_seq(),
        slice_index: header.dims.2 / 2,
        windowing: Windowing::Auto,
    });

    match worker.recv_timeout(Duration::from_secs(30)) {
        Some(Response::SliceReady { seq, base, .. }) if gate.admit(seq) => {
            let mut compositor = DisplayCompositor::default();
            compositor.set_base(base);
            compositor
                .present()
                .save("slice.png")
                .expect("should have written slice.png");
        }
        other => panic!("failed to render slice: {other:?}"),
    }
}
