#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw, gzip and ZIP inputs all go through the same entry point
    let _ = labelmesh::nifti::load_from_bytes(data);
    let _ = labelmesh::vista3d::load_inference_result(data);
});
