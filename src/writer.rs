//! STL export
//!
//! Meshes are written as binary STL with per-face normals computed from the
//! geometry. Every file is first written to a temporary file in the target
//! directory and then persisted over the final name, so readers never see a
//! partially written STL.

use crate::clean::{CleanParams, clean_mesh};
use crate::error::{Error, Result};
use crate::mesh_ops::calculate_face_normal;
use crate::model::{Mesh, Triangle, Vertex};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Make a structure name safe to use as a file stem
///
/// Characters other than ASCII letters, digits, `-` and `_` become `_`,
/// runs of `_` collapse, and leading or trailing `_` are trimmed. An empty
/// result becomes `"mesh"`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "mesh".to_string()
    } else {
        trimmed.to_string()
    }
}

fn stl_triangles(mesh: &Mesh) -> Vec<stl_io::Triangle> {
    let point = |v: &Vertex| stl_io::Vertex::new([v.x as f32, v.y as f32, v.z as f32]);
    mesh.triangles
        .iter()
        .map(|t| {
            let (v0, v1, v2) = (
                &mesh.vertices[t.v1],
                &mesh.vertices[t.v2],
                &mesh.vertices[t.v3],
            );
            let n = calculate_face_normal(v0, v1, v2);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [point(v0), point(v1), point(v2)],
            }
        })
        .collect()
}

/// Write `mesh` to `path` as binary STL
///
/// Parent directories are created as needed and an existing file is
/// replaced atomically.
///
/// # Errors
/// [`Error::Export`] for an empty mesh, invalid indices or any I/O failure.
pub fn export_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    if mesh.is_empty() {
        return Err(Error::export(path, "mesh has no triangles"));
    }
    mesh.check_indices()
        .map_err(|e| Error::export(path, e))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| Error::export(path, e))?;

    let triangles = stl_triangles(mesh);
    let temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::export(path, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| Error::export(path, e))?;
        writer.flush().map_err(|e| Error::export(path, e))?;
    }
    temp.persist(path).map_err(|e| Error::export(path, e.error))?;

    info!(path = %path.display(), triangles = mesh.triangle_count(), "Exported STL");
    Ok(())
}

/// Reserve `dir/stem.stl`, or the first free `dir/stem_N.stl` for N >= 2
fn reserve_path(dir: &Path, stem: &str) -> Result<PathBuf> {
    let mut suffix = 1usize;
    loop {
        let name = if suffix == 1 {
            format!("{}.stl", stem)
        } else {
            format!("{}_{}.stl", stem, suffix)
        };
        let candidate = dir.join(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "Output name taken");
                suffix += 1;
            }
            Err(e) => return Err(Error::export(&candidate, e)),
        }
    }
}

/// Export one STL per named mesh into `dir`
///
/// File names come from [`sanitize_filename`]; a name already present in
/// `dir` gets a `_2`, `_3`, ... suffix. Returns the written paths in input
/// order.
pub fn export_named<P: AsRef<Path>>(meshes: &[(String, Mesh)], dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::export(dir, e))?;

    let mut written = Vec::with_capacity(meshes.len());
    for (name, mesh) in meshes {
        let path = reserve_path(dir, &sanitize_filename(name))?;
        if let Err(err) = export_mesh(mesh, &path) {
            let _ = std::fs::remove_file(&path);
            return Err(err);
        }
        written.push(path);
    }
    Ok(written)
}

/// Concatenate meshes into one and clean the result
pub fn combine_meshes(meshes: &[Mesh]) -> Mesh {
    let vertices: usize = meshes.iter().map(|m| m.vertex_count()).sum();
    let triangles: usize = meshes.iter().map(|m| m.triangle_count()).sum();
    let mut combined = Mesh::with_capacity(vertices, triangles);
    for mesh in meshes {
        let offset = combined.vertices.len();
        combined.vertices.extend_from_slice(&mesh.vertices);
        combined.triangles.extend(
            mesh.triangles
                .iter()
                .map(|t| Triangle::new(t.v1 + offset, t.v2 + offset, t.v3 + offset)),
        );
    }
    clean_mesh(&mut combined, &CleanParams::default());
    combined
}

/// Read an STL file, ASCII or binary
///
/// Coincident vertices are shared, so a mesh written by [`export_mesh`]
/// comes back with the same topology.
pub fn read_stl<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| Error::load(format!("Failed to read STL {}: {}", path.display(), e)))?;

    let vertices = stl
        .vertices
        .iter()
        .map(|v| Vertex::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();
    let triangles = stl
        .faces
        .iter()
        .map(|f| Triangle::new(f.vertices[0], f.vertices[1], f.vertices[2]))
        .collect();
    Mesh::from_parts(vertices, triangles)
}
