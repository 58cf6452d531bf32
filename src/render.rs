use std::sync::Arc;

use tiny_skia as sk;

use crate::dna::{Genome, Polygon};
use crate::error::{Error, Result};
use crate::raster::Raster;

/// rendering service consumed by the fitness evaluator and placement oracle.
/// a pure function of scene data: painter's algorithm, later polygons over earlier ones.
pub trait Renderer {
    fn render(&self, genome: &Genome) -> Result<Raster>;
}

/// tiny-skia rasterizer over an opaque black background
#[derive(Clone, Copy, Debug)]
pub struct CpuRenderer {
    pub anti_alias: bool,
}

impl Default for CpuRenderer {
    fn default() -> Self {
        Self { anti_alias: true }
    }
}

impl CpuRenderer {
    pub fn new(anti_alias: bool) -> Self {
        Self { anti_alias }
    }

    /// full-frame render to tiny-skia's premultiplied RGBA bytes
    pub fn render_rgba_premul(&self, genome: &Genome) -> Result<Vec<u8>> {
        profiling::scope!("render_rgba_premul");
        let mut pix = sk::Pixmap::new(genome.width, genome.height).ok_or_else(|| {
            Error::RenderFailure(format!(
                "cannot allocate a {}x{} pixmap",
                genome.width, genome.height
            ))
        })?;
        // blank canvas is black, so an empty scene scores the base image's own intensity
        pix.fill(sk::Color::BLACK);

        for poly in &genome.polys {
            draw_polygon(&mut pix, poly, self.anti_alias, sk::Transform::identity())?;
        }
        Ok(pix.data().to_vec())
    }
}

impl Renderer for CpuRenderer {
    fn render(&self, genome: &Genome) -> Result<Raster> {
        let rgba = self.render_rgba_premul(genome)?;
        // background is opaque, so premultiplied bytes equal straight RGB
        Raster::from_rgba8(genome.width, genome.height, &rgba)
    }
}

fn draw_polygon(
    pix: &mut sk::Pixmap,
    poly: &Polygon,
    anti_alias: bool,
    transform: sk::Transform,
) -> Result<()> {
    profiling::scope!("draw_polygon");
    let points = poly.points();
    if points.len() < 3 {
        return Ok(());
    }

    // quick reject: bbox fully outside the pixmap
    let (w, h) = (pix.width() as f32, pix.height() as f32);
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    if max_x < 0.0 || max_y < 0.0 || min_x >= w || min_y >= h {
        return Ok(());
    }

    let path = match poly.cached_path.get() {
        Some(path) => Arc::clone(path),
        None => {
            let mut pb = sk::PathBuilder::new();
            pb.move_to(points[0].0, points[0].1);
            for &(x, y) in &points[1..] {
                pb.line_to(x, y);
            }
            pb.close();
            // degenerate rings tiny-skia refuses to build cover nothing
            let Some(built) = pb.finish() else {
                return Ok(());
            };
            Arc::clone(poly.cached_path.get_or_init(|| Arc::new(built)))
        }
    };

    let c = poly.color;
    let color = sk::Color::from_rgba(c.r, c.g, c.b, c.a).ok_or_else(|| {
        Error::RenderFailure(format!("polygon {} has color outside 0..1: {:?}", poly.id, c))
    })?;
    let mut paint = sk::Paint::default();
    paint.anti_alias = anti_alias;
    paint.shader = sk::Shader::SolidColor(color);

    pix.fill_path(&path, &paint, sk::FillRule::Winding, transform, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{Color, PolygonId};

    fn full_cover(w: u32, h: u32, color: Color) -> Polygon {
        let (wf, hf) = (w as f32, h as f32);
        Polygon::new(PolygonId(0), vec![(0.0, 0.0), (wf, 0.0), (wf, hf), (0.0, hf)], color)
    }

    #[test]
    fn empty_scene_renders_black() {
        let out = CpuRenderer::default().render(&Genome::new_blank(4, 3)).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 3);
        assert!(out.data().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn opaque_cover_paints_its_color() {
        let mut g = Genome::new_blank(4, 4);
        g.append(full_cover(4, 4, Color::new(1.0, 0.0, 1.0, 1.0)));
        let out = CpuRenderer::new(false).render(&g).unwrap();
        assert_eq!(out.pixel(2, 2), [1.0, 0.0, 1.0]);
    }

    #[test]
    fn later_polygons_paint_on_top() {
        let mut g = Genome::new_blank(4, 4);
        g.append(full_cover(4, 4, Color::new(1.0, 0.0, 0.0, 1.0)));
        g.append(full_cover(4, 4, Color::new(0.0, 0.0, 1.0, 1.0)));
        let out = CpuRenderer::new(false).render(&g).unwrap();
        assert_eq!(out.pixel(1, 1), [0.0, 0.0, 1.0]);

        g.swap(0, 1).unwrap();
        let out = CpuRenderer::new(false).render(&g).unwrap();
        assert_eq!(out.pixel(1, 1), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn half_alpha_blends_over_black() {
        let mut g = Genome::new_blank(2, 2);
        g.append(full_cover(2, 2, Color::new(1.0, 1.0, 1.0, 0.5)));
        let out = CpuRenderer::new(false).render(&g).unwrap();
        let [r, _, _] = out.pixel(0, 0);
        assert!((r - 0.5).abs() < 0.01, "got {r}");
    }

    #[test]
    fn zero_sized_canvas_fails() {
        let res = CpuRenderer::default().render(&Genome::new_blank(0, 4));
        assert!(matches!(res, Err(Error::RenderFailure(_))));
    }

    #[test]
    fn collapsed_polygon_is_skipped() {
        let mut g = Genome::new_blank(4, 4);
        g.append(Polygon::new(
            PolygonId(0),
            vec![(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)],
            Color::new(1.0, 1.0, 1.0, 1.0),
        ));
        let out = CpuRenderer::default().render(&g).unwrap();
        assert!(out.data().iter().all(|&c| c == 0.0));
    }
}
