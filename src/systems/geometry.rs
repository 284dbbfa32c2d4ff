//! Geometry system and the built-in shape generators.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{anyhow, bail};
use cgmath::{InnerSpace, Vector2, Vector3};

use crate::{
    data_structures::geometry::{
        Extents, Geometry, GeometryConfig, Vertex2D, Vertex3D, Vertices,
    },
    error::RegistryError,
    renderer::Renderer,
    resources::registry::ReferenceRegistry,
    systems::material::{DEFAULT_MATERIAL_NAME, MaterialDeps, MaterialSystem},
};

pub const DEFAULT_GEOMETRY_NAME: &str = "default";

/// Side length of the default quads.
const DEFAULT_QUAD_SIZE: f32 = 10.0;

pub struct GeometrySystem {
    max_geometry_count: usize,
    registry: ReferenceRegistry<Geometry>,
    default_geometry: Arc<Geometry>,
    default_geometry_2d: Arc<Geometry>,
    next_id: AtomicU32,
}

impl GeometrySystem {
    pub fn new(
        renderer: &mut Renderer,
        materials: &MaterialSystem,
        max_geometry_count: usize,
    ) -> anyhow::Result<Self> {
        if max_geometry_count == 0 {
            bail!("geometry system needs room for at least one geometry");
        }
        let half = DEFAULT_QUAD_SIZE * 0.5;
        //  0    3
        //
        //  2    1
        let quad = [
            ([-half, -half], [0.0, 0.0]),
            ([half, half], [1.0, 1.0]),
            ([-half, half], [0.0, 1.0]),
            ([half, -half], [1.0, 0.0]),
        ];
        let extents = Extents {
            min: Vector3::new(-half, -half, 0.0),
            max: Vector3::new(half, half, 0.0),
        };

        let vertices = Vertices::D3(
            quad.iter()
                .map(|&([x, y], uv)| Vertex3D::new([x, y, 0.0], [0.0, 0.0, 1.0], uv))
                .collect(),
        );
        let handle = upload(renderer, &vertices, &[0, 1, 2, 0, 3, 1])?;
        let default_geometry = Arc::new(Geometry {
            id: 0,
            name: DEFAULT_GEOMETRY_NAME.to_string(),
            center: Vector3::new(0.0, 0.0, 0.0),
            extents,
            material: Some(materials.default_material()),
            handle: Some(handle),
        });

        let vertices_2d = Vertices::D2(
            quad.iter()
                .map(|&(position, texcoord)| Vertex2D { position, texcoord })
                .collect(),
        );
        // counter-clockwise
        let handle_2d = upload(renderer, &vertices_2d, &[2, 1, 0, 3, 0, 1])?;
        let default_geometry_2d = Arc::new(Geometry {
            id: 1,
            name: format!("{DEFAULT_GEOMETRY_NAME}_2d"),
            center: Vector3::new(0.0, 0.0, 0.0),
            extents,
            material: Some(materials.default_material()),
            handle: Some(handle_2d),
        });

        Ok(Self {
            max_geometry_count,
            registry: ReferenceRegistry::new(),
            default_geometry,
            default_geometry_2d,
            next_id: AtomicU32::new(2),
        })
    }

    pub fn default_geometry(&self) -> Arc<Geometry> {
        Arc::clone(&self.default_geometry)
    }

    pub fn default_geometry_2d(&self) -> Arc<Geometry> {
        Arc::clone(&self.default_geometry_2d)
    }

    /// Uploads `config` and acquires its material. An existing geometry with the
    /// same name is shared instead.
    pub fn acquire_from_config(
        &self,
        deps: MaterialDeps<'_>,
        materials: &MaterialSystem,
        config: &GeometryConfig,
        auto_release: bool,
    ) -> Result<Arc<Geometry>, RegistryError> {
        if !self.registry.contains(&config.name) && self.registry.len() >= self.max_geometry_count
        {
            return Err(RegistryError::Load {
                name: config.name.clone(),
                source: anyhow!("geometry system is full ({} geometries)", self.max_geometry_count),
            });
        }
        self.registry.acquire(&config.name, auto_release, || {
            if config.vertices.is_empty() || config.indices.is_empty() {
                bail!("geometry '{}' has no vertices or indices", config.name);
            }
            let MaterialDeps {
                renderer,
                shaders,
                textures,
                assets,
            } = deps;
            let handle = upload(renderer, &config.vertices, &config.indices)?;
            let material = match config.material_name.as_deref() {
                Some(name) if !name.is_empty() => {
                    let deps = MaterialDeps {
                        renderer: &mut *renderer,
                        shaders,
                        textures,
                        assets,
                    };
                    match materials.acquire(deps, name) {
                        Ok(material) => material,
                        Err(e) => {
                            renderer.backend_mut().geometry_destroy(handle);
                            return Err(anyhow!(
                                "geometry '{}' could not acquire material '{name}': {e}",
                                config.name
                            ));
                        }
                    }
                }
                _ => materials.default_material(),
            };
            log::debug!(
                "geometry '{}' created ({} vertices, {} indices)",
                config.name,
                config.vertices.len(),
                config.indices.len()
            );
            Ok(Geometry {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                name: config.name.clone(),
                center: config.center,
                extents: config.extents,
                material: Some(material),
                handle: Some(handle),
            })
        })
    }

    /// Adds a reference to an already created geometry.
    pub fn acquire(&self, name: &str) -> Result<Arc<Geometry>, RegistryError> {
        if name == DEFAULT_GEOMETRY_NAME {
            return Ok(self.default_geometry());
        }
        if !self.registry.contains(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.registry
            .acquire(name, false, || Err(anyhow!("geometry '{name}' was released meanwhile")))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Geometry>> {
        self.registry.get(name)
    }

    pub fn ref_count(&self, name: &str) -> Option<u64> {
        self.registry.ref_count(name)
    }

    /// Drops one reference. At zero an auto-release geometry is destroyed and its
    /// material released.
    pub fn release(
        &self,
        deps: MaterialDeps<'_>,
        materials: &MaterialSystem,
        name: &str,
    ) -> Result<u64, RegistryError> {
        if name == DEFAULT_GEOMETRY_NAME {
            return Ok(0);
        }
        self.registry
            .release(name, |geometry| destroy_geometry(deps, materials, &geometry))
    }

    pub fn shutdown(&self, deps: MaterialDeps<'_>, materials: &MaterialSystem) {
        let MaterialDeps {
            renderer,
            shaders,
            textures,
            assets,
        } = deps;
        for (_, geometry) in self.registry.drain() {
            let deps = MaterialDeps {
                renderer: &mut *renderer,
                shaders: &mut *shaders,
                textures,
                assets,
            };
            destroy_geometry(deps, materials, &geometry);
        }
        for geometry in [&self.default_geometry, &self.default_geometry_2d] {
            if let Some(handle) = geometry.handle {
                renderer.backend_mut().geometry_destroy(handle);
            }
        }
    }
}

fn upload(
    renderer: &mut Renderer,
    vertices: &Vertices,
    indices: &[u32],
) -> anyhow::Result<crate::renderer::backend::BackendHandle> {
    Ok(renderer.backend_mut().geometry_create(
        vertices.vertex_size(),
        vertices.len() as u32,
        vertices.as_bytes(),
        indices,
    )?)
}

fn destroy_geometry(deps: MaterialDeps<'_>, materials: &MaterialSystem, geometry: &Geometry) {
    if let Some(handle) = geometry.handle {
        deps.renderer.backend_mut().geometry_destroy(handle);
    }
    if let Some(material) = &geometry.material {
        if material.name != DEFAULT_MATERIAL_NAME {
            if let Err(e) = materials.release(deps, &material.name) {
                log::warn!("geometry '{}': releasing material failed: {e}", geometry.name);
            }
        }
    }
}

fn non_zero(value: f32, what: &str) -> f32 {
    if value == 0.0 {
        log::warn!("{what} must be nonzero, defaulting to one");
        1.0
    } else {
        value
    }
}

fn geometry_name(name: &str) -> String {
    if name.is_empty() {
        DEFAULT_GEOMETRY_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn material_name(name: &str) -> Option<String> {
    Some(if name.is_empty() {
        DEFAULT_MATERIAL_NAME.to_string()
    } else {
        name.to_string()
    })
}

/// A flat plane in the XY plane facing +Z, split into segments with the texture
/// tiled `tile_x` by `tile_y` times across it. Zero sizes, segment counts and
/// tiling default to one.
#[allow(clippy::too_many_arguments)]
pub fn generate_plane_config(
    width: f32,
    height: f32,
    x_segment_count: u32,
    y_segment_count: u32,
    tile_x: f32,
    tile_y: f32,
    name: &str,
    material: &str,
) -> GeometryConfig {
    let width = non_zero(width, "plane width");
    let height = non_zero(height, "plane height");
    let tile_x = non_zero(tile_x, "plane tile_x");
    let tile_y = non_zero(tile_y, "plane tile_y");
    let x_segments = if x_segment_count == 0 {
        log::warn!("plane x segment count must be positive, defaulting to one");
        1
    } else {
        x_segment_count
    };
    let y_segments = if y_segment_count == 0 {
        log::warn!("plane y segment count must be positive, defaulting to one");
        1
    } else {
        y_segment_count
    };

    let segment_width = width / x_segments as f32;
    let segment_height = height / y_segments as f32;
    let half_width = width * 0.5;
    let half_height = height * 0.5;
    let mut vertices = Vec::with_capacity((x_segments * y_segments * 4) as usize);
    let mut indices = Vec::with_capacity((x_segments * y_segments * 6) as usize);
    for y in 0..y_segments {
        for x in 0..x_segments {
            let min_x = x as f32 * segment_width - half_width;
            let min_y = y as f32 * segment_height - half_height;
            let max_x = min_x + segment_width;
            let max_y = min_y + segment_height;
            let min_u = x as f32 / x_segments as f32 * tile_x;
            let min_v = y as f32 / y_segments as f32 * tile_y;
            let max_u = (x + 1) as f32 / x_segments as f32 * tile_x;
            let max_v = (y + 1) as f32 / y_segments as f32 * tile_y;

            let offset = vertices.len() as u32;
            let normal = [0.0, 0.0, 1.0];
            vertices.push(Vertex3D::new([min_x, min_y, 0.0], normal, [min_u, min_v]));
            vertices.push(Vertex3D::new([max_x, max_y, 0.0], normal, [max_u, max_v]));
            vertices.push(Vertex3D::new([min_x, max_y, 0.0], normal, [min_u, max_v]));
            vertices.push(Vertex3D::new([max_x, min_y, 0.0], normal, [max_u, min_v]));
            indices.extend(quad_indices(offset));
        }
    }

    GeometryConfig {
        name: geometry_name(name),
        vertices: Vertices::D3(vertices),
        indices,
        center: Vector3::new(0.0, 0.0, 0.0),
        extents: Extents {
            min: Vector3::new(-half_width, -half_height, 0.0),
            max: Vector3::new(half_width, half_height, 0.0),
        },
        material_name: material_name(material),
    }
}

/// An axis-aligned box centred on the origin with per-face texture tiling and
/// generated tangents.
pub fn generate_cube_config(
    width: f32,
    height: f32,
    depth: f32,
    tile_x: f32,
    tile_y: f32,
    name: &str,
    material: &str,
) -> GeometryConfig {
    let width = non_zero(width, "cube width");
    let height = non_zero(height, "cube height");
    let depth = non_zero(depth, "cube depth");
    let tile_x = non_zero(tile_x, "cube tile_x");
    let tile_y = non_zero(tile_y, "cube tile_y");

    let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);
    let uv = [[0.0, 0.0], [tile_x, tile_y], [0.0, tile_y], [tile_x, 0.0]];
    // positions per face follow the quad layout 0: min/min, 1: max/max, 2: min/max, 3: max/min
    let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
        // front
        ([[-hx, -hy, hz], [hx, hy, hz], [-hx, hy, hz], [hx, -hy, hz]], [0.0, 0.0, 1.0]),
        // back
        ([[hx, -hy, -hz], [-hx, hy, -hz], [hx, hy, -hz], [-hx, -hy, -hz]], [0.0, 0.0, -1.0]),
        // left
        ([[-hx, -hy, -hz], [-hx, hy, hz], [-hx, hy, -hz], [-hx, -hy, hz]], [-1.0, 0.0, 0.0]),
        // right
        ([[hx, -hy, hz], [hx, hy, -hz], [hx, hy, hz], [hx, -hy, -hz]], [1.0, 0.0, 0.0]),
        // bottom
        ([[hx, -hy, hz], [-hx, -hy, -hz], [hx, -hy, -hz], [-hx, -hy, hz]], [0.0, -1.0, 0.0]),
        // top
        ([[-hx, hy, hz], [hx, hy, -hz], [-hx, hy, -hz], [hx, hy, hz]], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (positions, normal) in faces {
        let offset = vertices.len() as u32;
        for (position, texcoord) in positions.into_iter().zip(uv) {
            vertices.push(Vertex3D::new(position, normal, texcoord));
        }
        indices.extend(quad_indices(offset));
    }
    generate_tangents(&mut vertices, &indices);

    GeometryConfig {
        name: geometry_name(name),
        vertices: Vertices::D3(vertices),
        indices,
        center: Vector3::new(0.0, 0.0, 0.0),
        extents: Extents {
            min: Vector3::new(-hx, -hy, -hz),
            max: Vector3::new(hx, hy, hz),
        },
        material_name: material_name(material),
    }
}

fn quad_indices(offset: u32) -> [u32; 6] {
    [
        offset,
        offset + 1,
        offset + 2,
        offset,
        offset + 3,
        offset + 1,
    ]
}

/// Per-triangle tangents from positions and texture coordinates. The fourth
/// component holds the bitangent handedness.
pub fn generate_tangents(vertices: &mut [Vertex3D], indices: &[u32]) {
    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if i0.max(i1).max(i2) >= vertices.len() {
            log::warn!("tangent generation: index out of range, skipping triangle");
            continue;
        }
        let p = |i: usize| Vector3::from(vertices[i].position);
        let t = |i: usize| Vector2::from(vertices[i].texcoord);
        let edge1 = p(i1) - p(i0);
        let edge2 = p(i2) - p(i0);
        let delta1 = t(i1) - t(i0);
        let delta2 = t(i2) - t(i0);

        let divisor = delta1.x * delta2.y - delta2.x * delta1.y;
        if divisor.abs() < f32::EPSILON {
            continue;
        }
        let tangent = ((edge1 * delta2.y - edge2 * delta1.y) / divisor).normalize();
        let handedness = if delta1.y * delta2.x - delta2.y * delta1.x < 0.0 {
            -1.0
        } else {
            1.0
        };
        for i in [i0, i1, i2] {
            vertices[i].tangent = [tangent.x, tangent.y, tangent.z, handedness];
        }
    }
}
