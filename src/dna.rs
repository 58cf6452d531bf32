use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

/// stable polygon identity. assigned once at insertion (the sequence length at that moment)
/// and never tied to the polygon's current paint position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolygonId(pub u32);

impl fmt::Display for PolygonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// un-premultiplied RGBA, every channel in 0..=1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const CHANNELS: usize = 4;

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn channel(&self, idx: usize) -> f32 {
        match idx {
            0 => self.r,
            1 => self.g,
            2 => self.b,
            _ => self.a,
        }
    }

    #[inline]
    pub fn set_channel(&mut self, idx: usize, value: f32) {
        match idx {
            0 => self.r = value,
            1 => self.g = value,
            2 => self.b = value,
            _ => self.a = value,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|c| (0.0..=1.0).contains(c))
    }
}

/// coordinate axis of a vertex. x is bounded by the canvas width, y by its height
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// a polygon stored as a closed ring: the n distinct vertices followed by a copy of the
/// first one. also caches a tiny-skia path for the renderer.
#[derive(Debug)]
pub struct Polygon {
    pub id: PolygonId,
    points: Vec<(f32, f32)>,
    pub color: Color,

    pub(crate) cached_path: OnceLock<Arc<tiny_skia::Path>>,
}

// stale paths are never copied along with a clone
impl Clone for Polygon {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            points: self.points.clone(),
            color: self.color,
            cached_path: OnceLock::new(),
        }
    }
}

// structural equality only, the path cache is derived data
impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.points == other.points && self.color == other.color
    }
}

impl Polygon {
    /// build a polygon from its distinct vertices, closing the ring
    pub fn new(id: PolygonId, vertices: Vec<(f32, f32)>, color: Color) -> Self {
        let mut points = vertices;
        if let Some(&first) = points.first() {
            points.push(first);
        }
        Self {
            id,
            points,
            color,
            cached_path: OnceLock::new(),
        }
    }

    /// number of distinct vertices (the closing point is not counted)
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// the full ring including the closing point
    #[inline]
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// the distinct vertices
    #[inline]
    pub fn vertices(&self) -> &[(f32, f32)] {
        &self.points[..self.vertex_count()]
    }

    #[inline]
    pub fn coord(&self, vertex: usize, axis: Axis) -> f32 {
        let p = self.points[vertex];
        match axis {
            Axis::X => p.0,
            Axis::Y => p.1,
        }
    }

    /// write one coordinate. the first vertex is mirrored onto the closing point
    pub fn set_coord(&mut self, vertex: usize, axis: Axis, value: f32) {
        let last = self.points.len() - 1;
        let mirror = if vertex == 0 { Some(last) } else { None };
        for i in std::iter::once(vertex).chain(mirror) {
            match axis {
                Axis::X => self.points[i].0 = value,
                Axis::Y => self.points[i].1 = value,
            }
        }
        self.cached_path = OnceLock::new();
    }

    /// all vertices inside [0,width]x[0,height] and the color inside [0,1]
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as f32, height as f32);
        self.color.is_valid()
            && self
                .points
                .iter()
                .all(|&(x, y)| (0.0..=w).contains(&x) && (0.0..=h).contains(&y))
    }
}

// arc slots give copy-on-write: cloning a genome only copies pointers,
// mutations go through Arc::make_mut and clone just the polygon they touch.
#[derive(Clone, Debug, PartialEq)]
pub struct Genome {
    pub width: u32,
    pub height: u32,
    pub polys: Vec<Arc<Polygon>>,
}

impl Genome {
    pub fn new_blank(width: u32, height: u32) -> Self {
        profiling::scope!("Genome::new_blank");
        Self { width, height, polys: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.polys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polys.is_empty()
    }

    /// id the next appended polygon will receive
    #[inline]
    pub fn next_id(&self) -> PolygonId {
        PolygonId(self.polys.len() as u32)
    }

    /// append on top of the paint order. the polygon is re-stamped with the next free id
    pub fn append(&mut self, mut poly: Polygon) -> PolygonId {
        let id = self.next_id();
        poly.id = id;
        self.polys.push(Arc::new(poly));
        id
    }

    /// exchange two paint positions, identities travel with the polygons
    pub fn swap(&mut self, pos_a: usize, pos_b: usize) -> Result<()> {
        let len = self.polys.len();
        for position in [pos_a, pos_b] {
            if position >= len {
                return Err(Error::OutOfRange { position, len });
            }
        }
        self.polys.swap(pos_a, pos_b);
        Ok(())
    }

    pub fn index_of(&self, id: PolygonId) -> Result<usize> {
        self.polys
            .iter()
            .position(|p| p.id == id)
            .ok_or(Error::NotFound(id))
    }

    pub fn get(&self, id: PolygonId) -> Result<&Polygon> {
        let idx = self.index_of(id)?;
        Ok(&self.polys[idx])
    }

    /// copy-on-write access to one polygon
    pub fn get_mut(&mut self, id: PolygonId) -> Result<&mut Polygon> {
        let idx = self.index_of(id)?;
        Ok(Arc::make_mut(&mut self.polys[idx]))
    }

    /// substitute the polygon holding `id` in place; the stored polygon keeps `id`
    pub fn replace(&mut self, id: PolygonId, mut poly: Polygon) -> Result<()> {
        let idx = self.index_of(id)?;
        poly.id = id;
        self.polys[idx] = Arc::new(poly);
        Ok(())
    }

    pub fn ids_in_order(&self) -> Vec<PolygonId> {
        self.polys.iter().map(|p| p.id).collect()
    }

    /// true if every id is unique
    pub fn ids_unique(&self) -> bool {
        let mut ids = self.ids_in_order();
        ids.sort_unstable();
        ids.windows(2).all(|w| w[0] != w[1])
    }
}
