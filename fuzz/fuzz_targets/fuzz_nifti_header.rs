#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header fields drive every allocation and the affine, so exercise them
    // without the voxel payload
    if let Ok(header) = labelmesh::nifti::NiftiHeader::parse(data) {
        let _ = header.spacing();
        let affine = header.affine();
        let _ = labelmesh::transform::invert_affine(&affine);
    }
});
