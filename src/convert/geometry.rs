use crate::error::{ImportError, ImportResult};
use crate::scene::{AttributeKind, AttributeLayer, MappingMode, MeshSource};
use crate::settings::ImportSettings;

use super::skinning::assemble_skin_weights;
use super::types::{
    Armature, BindFrame, BlendInfluences, BoneNodeMap, DEFAULT_TANGENT, DEFAULT_VERTEX_COLOR,
    SkinMesh, SkinVertex,
};

// ─── Corners and mappings ─────────────────────────────────────────────────────

/// One triangle corner: the control point it references and its running
/// polygon-vertex number in the source polygon list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Corner {
    pub(super) control_point: u32,
    pub(super) polygon_vertex: usize,
}

/// Attribute mappings the seam splitter can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttributeMapping {
    ByControlPoint,
    ByPolygonVertex,
}

fn resolve_mapping(
    mesh: &MeshSource,
    layer: AttributeKind,
    mapping: MappingMode,
) -> ImportResult<AttributeMapping> {
    match mapping {
        MappingMode::ByControlPoint => Ok(AttributeMapping::ByControlPoint),
        MappingMode::ByPolygonVertex => Ok(AttributeMapping::ByPolygonVertex),
        MappingMode::ByPolygon | MappingMode::ByEdge | MappingMode::AllSame => {
            Err(ImportError::UnsupportedAttributeMapping {
                mesh: mesh.name.clone(),
                layer,
                mapping,
            })
        }
    }
}

fn resolve_layer<'a, T: Copy>(
    mesh: &MeshSource,
    kind: AttributeKind,
    layer: Option<&'a AttributeLayer<T>>,
) -> ImportResult<Option<(AttributeMapping, &'a AttributeLayer<T>)>> {
    layer
        .map(|layer| resolve_mapping(mesh, kind, layer.mapping).map(|mapping| (mapping, layer)))
        .transpose()
}

fn layer_element<T: Copy>(
    mesh: &MeshSource,
    kind: AttributeKind,
    layer: &AttributeLayer<T>,
    element: usize,
) -> ImportResult<T> {
    layer.element(element).ok_or_else(|| {
        ImportError::malformed(
            &mesh.name,
            format!("{} layer has no element {}", kind, element),
        )
    })
}

/// Fan-triangulate every polygon into corners.
///
/// Polygons with fewer than three corners are dropped but still advance the
/// polygon-vertex counter so later attribute lookups stay aligned.
pub(super) fn triangulate(mesh: &MeshSource) -> ImportResult<Vec<[Corner; 3]>> {
    let control_point_count = mesh.control_points.len();
    let mut triangles = Vec::<[Corner; 3]>::with_capacity(mesh.polygons.len());
    let mut polygon_vertex_base = 0usize;
    let mut skipped = 0usize;

    for (polygon_index, polygon) in mesh.polygons.iter().enumerate() {
        if let Some(&control_point) = polygon
            .iter()
            .find(|&&control_point| control_point as usize >= control_point_count)
        {
            return Err(ImportError::malformed(
                &mesh.name,
                format!(
                    "polygon {} references control point {} (control point count: {})",
                    polygon_index, control_point, control_point_count
                ),
            ));
        }

        if polygon.len() < 3 {
            skipped += 1;
            polygon_vertex_base += polygon.len();
            continue;
        }

        let corner = |offset: usize| Corner {
            control_point: polygon[offset],
            polygon_vertex: polygon_vertex_base + offset,
        };
        for offset in 1..polygon.len() - 1 {
            triangles.push([corner(0), corner(offset), corner(offset + 1)]);
        }
        polygon_vertex_base += polygon.len();
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {} degenerate polygon(s) in '{}'",
            skipped,
            mesh.name
        );
    }

    Ok(triangles)
}

// ─── Seam splitting ───────────────────────────────────────────────────────────

/// Weld or split vertices so every corner sees its own attribute value.
///
/// Each vertex currently referenced by `indices` keeps a list of the values
/// seen at its corners. A corner whose value lies within `epsilon` (squared
/// distance) of a seen value reuses that value's vertex. The first distinct
/// value claims the referenced vertex itself; every further value gets a
/// copy appended to `vertices` and the corner is rewritten to it.
///
/// Returns the number of vertices appended.
pub(super) fn split_seams<V: Copy>(
    vertices: &mut Vec<SkinVertex>,
    indices: &mut [u32],
    corner_values: &[V],
    epsilon: f32,
    distance_sq: impl Fn(&V, &V) -> f32,
    apply: impl Fn(&mut SkinVertex, V),
) -> usize {
    let original_count = vertices.len();
    let mut variants: Vec<Vec<(V, u32)>> = vec![Vec::new(); original_count];

    for (index, value) in indices.iter_mut().zip(corner_values) {
        let key = *index as usize;
        let seen = &mut variants[key];

        if let Some(&(_, existing)) = seen
            .iter()
            .find(|(candidate, _)| distance_sq(candidate, value) < epsilon)
        {
            *index = existing;
            continue;
        }

        if seen.is_empty() {
            apply(&mut vertices[key], *value);
            seen.push((*value, *index));
            continue;
        }

        let mut duplicate = vertices[key];
        apply(&mut duplicate, *value);
        let duplicate_index = vertices.len() as u32;
        vertices.push(duplicate);
        seen.push((*value, duplicate_index));
        *index = duplicate_index;
    }

    vertices.len() - original_count
}

fn squared_distance<const N: usize>(a: &[f32; N], b: &[f32; N]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn uv_tangent_distance(a: &([f32; 2], [f32; 4]), b: &([f32; 2], [f32; 4])) -> f32 {
    squared_distance(&a.0, &b.0) + squared_distance(&a.1, &b.1)
}

// ─── Mesh assembly ────────────────────────────────────────────────────────────

/// Build a skin mesh: weights, per-control-point attributes, then the normal
/// split pass followed by the UV/tangent split pass.
pub(super) fn build_skin_mesh(
    mesh: &MeshSource,
    armature: &Armature,
    bone_nodes: &BoneNodeMap,
    bind_frame: &BindFrame,
    settings: &ImportSettings,
) -> ImportResult<SkinMesh> {
    let blend = assemble_skin_weights(mesh, bone_nodes, settings)?;

    let normals = resolve_layer(mesh, AttributeKind::Normal, mesh.normals.as_ref())?;
    let uvs = resolve_layer(mesh, AttributeKind::Uv, mesh.uvs.as_ref())?;
    let tangents = resolve_layer(mesh, AttributeKind::Tangent, mesh.tangents.as_ref())?;

    let triangles = triangulate(mesh)?;
    let corners: Vec<Corner> = triangles.iter().flatten().copied().collect();

    let control_point_count = mesh.control_points.len();
    if control_point_count + 2 * corners.len() > u32::MAX as usize {
        return Err(ImportError::malformed(
            &mesh.name,
            "mesh is too large for 32-bit indices",
        ));
    }

    let mut vertices = base_vertices(mesh, &blend);

    if let Some((AttributeMapping::ByControlPoint, layer)) = normals {
        for (index, vertex) in vertices.iter_mut().enumerate() {
            vertex.normal = layer_element(mesh, AttributeKind::Normal, layer, index)?;
        }
    }
    if let Some((AttributeMapping::ByControlPoint, layer)) = uvs {
        for (index, vertex) in vertices.iter_mut().enumerate() {
            vertex.uv = layer_element(mesh, AttributeKind::Uv, layer, index)?;
        }
    }
    if let Some((AttributeMapping::ByControlPoint, layer)) = tangents {
        for (index, vertex) in vertices.iter_mut().enumerate() {
            vertex.tangent = layer_element(mesh, AttributeKind::Tangent, layer, index)?;
        }
    }

    let mut indices: Vec<u32> = corners.iter().map(|corner| corner.control_point).collect();

    let mut normal_splits = 0usize;
    if let Some((AttributeMapping::ByPolygonVertex, layer)) = normals {
        let corner_normals = corners
            .iter()
            .map(|corner| layer_element(mesh, AttributeKind::Normal, layer, corner.polygon_vertex))
            .collect::<ImportResult<Vec<[f32; 3]>>>()?;
        normal_splits = split_seams(
            &mut vertices,
            &mut indices,
            &corner_normals,
            settings.seam_epsilon,
            squared_distance::<3>,
            |vertex, normal| vertex.normal = normal,
        );
    }

    let mut uv_splits = 0usize;
    let uv_per_corner = matches!(uvs, Some((AttributeMapping::ByPolygonVertex, _)));
    let tangent_per_corner = matches!(tangents, Some((AttributeMapping::ByPolygonVertex, _)));
    if uv_per_corner || tangent_per_corner {
        let corner_pairs = corners
            .iter()
            .zip(&indices)
            .map(|(corner, &vertex_index)| -> ImportResult<([f32; 2], [f32; 4])> {
                let vertex = &vertices[vertex_index as usize];
                let uv = match uvs {
                    Some((AttributeMapping::ByPolygonVertex, layer)) => {
                        layer_element(mesh, AttributeKind::Uv, layer, corner.polygon_vertex)?
                    }
                    _ => vertex.uv,
                };
                let tangent = match tangents {
                    Some((AttributeMapping::ByPolygonVertex, layer)) => {
                        layer_element(mesh, AttributeKind::Tangent, layer, corner.polygon_vertex)?
                    }
                    _ => vertex.tangent,
                };
                Ok((uv, tangent))
            })
            .collect::<ImportResult<Vec<([f32; 2], [f32; 4])>>>()?;
        uv_splits = split_seams(
            &mut vertices,
            &mut indices,
            &corner_pairs,
            settings.seam_epsilon,
            uv_tangent_distance,
            |vertex, (uv, tangent)| {
                vertex.uv = uv;
                vertex.tangent = tangent;
            },
        );
    }

    log::debug!(
        "Mesh '{}': {} control points, {} triangles, {} normal seams, {} uv seams",
        mesh.name,
        control_point_count,
        triangles.len(),
        normal_splits,
        uv_splits
    );

    let indices = indices
        .chunks_exact(3)
        .map(|triangle| [triangle[0], triangle[1], triangle[2]])
        .collect();

    Ok(SkinMesh {
        name: mesh.name.clone(),
        vertices,
        indices,
        bone_count: armature.len(),
        default_bone_transforms: bind_frame.globals.clone(),
        control_point_count,
    })
}

fn base_vertices(mesh: &MeshSource, blend: &[BlendInfluences]) -> Vec<SkinVertex> {
    mesh.control_points
        .iter()
        .zip(blend)
        .map(|(position, influences)| SkinVertex {
            position: *position,
            normal: [0.0, 0.0, 0.0],
            tangent: DEFAULT_TANGENT,
            uv: [0.0, 0.0],
            color: DEFAULT_VERTEX_COLOR,
            blend_indices: influences.indices,
            blend_weights: influences.weights,
        })
        .collect()
}
