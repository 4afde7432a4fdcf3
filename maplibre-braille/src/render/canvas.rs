//! Vector drawing on top of a [`BrailleBuffer`].

use cgmath::Point2;
use lyon::{
    geom,
    path::Path,
    tessellation::{
        BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
        VertexBuffers,
    },
};

use crate::render::braille_buffer::BrailleBuffer;

const FILL_TOLERANCE: f32 = 0.1;

struct VertexConstructor;

impl FillVertexConstructor<[f32; 2]> for VertexConstructor {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        vertex.position().to_array()
    }
}

/// Pixels of the line from `(x0, y0)` to `(x1, y1)`, both ends included.
fn bresenham((x0, y0): (i32, i32), (x1, y1): (i32, i32)) -> Vec<(i32, i32)> {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let adx = dx.abs();
    let ady = dy.abs();
    let sx = if dx > 0 { 1 } else { -1 };
    let sy = if dy > 0 { 1 } else { -1 };

    let mut points = Vec::with_capacity(adx.max(ady) as usize + 1);
    let mut eps = 0;
    let (mut x, mut y) = (x0, y0);
    if adx > ady {
        while if sx < 0 { x >= x1 } else { x <= x1 } {
            points.push((x, y));
            eps += ady;
            if eps << 1 >= adx {
                y += sy;
                eps -= adx;
            }
            x += sx;
        }
    } else {
        while if sy < 0 { y >= y1 } else { y <= y1 } {
            points.push((x, y));
            eps += adx;
            if eps << 1 >= ady {
                x += sx;
                eps -= ady;
            }
            y += sy;
        }
    }
    points
}

#[allow(clippy::cast_possible_truncation)]
fn pixel(point: &Point2<f64>) -> (i32, i32) {
    (point.x.floor() as i32, point.y.floor() as i32)
}

pub struct Canvas {
    buffer: BrailleBuffer,
}

impl Canvas {
    pub fn new(width: usize, height: usize, use_braille: bool, delimiter: &str) -> Self {
        Self {
            buffer: BrailleBuffer::new(width, height, use_braille, delimiter),
        }
    }

    pub fn width(&self) -> usize {
        self.buffer.width()
    }

    pub fn height(&self) -> usize {
        self.buffer.height()
    }

    pub fn buffer(&self) -> &BrailleBuffer {
        &self.buffer
    }

    pub fn frame(&self) -> String {
        self.buffer.frame()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn text(&mut self, text: &str, x: i32, y: i32, color: u8, center: bool) {
        self.buffer.write_text(text, x, y, color, center);
    }

    /// Sets the background of every cell without an explicit background.
    pub fn set_background(&mut self, color: Option<u8>) {
        self.buffer.set_global_background(color);
    }

    pub fn background(&mut self, x: i32, y: i32, color: u8) {
        self.buffer.set_background(x, y, color);
    }

    pub fn line(&mut self, from: &Point2<f64>, to: &Point2<f64>, color: u8, width: f64) {
        self.thick_line(pixel(from), pixel(to), width, color);
    }

    pub fn polyline(&mut self, points: &[Point2<f64>], color: u8, width: f64) {
        for pair in points.windows(2) {
            self.thick_line(pixel(&pair[0]), pixel(&pair[1]), width, color);
        }
    }

    /// Fills the polygon whose outer ring is `rings[0]`, the remaining rings being holes.
    ///
    /// Holes with fewer than 3 points are skipped. Returns `false` without drawing when the
    /// outer ring has fewer than 3 points or the rings cannot be triangulated.
    pub fn polygon(&mut self, rings: &[Vec<Point2<f64>>], color: u8) -> bool {
        let Some((outer, holes)) = rings.split_first() else {
            return false;
        };
        if outer.len() < 3 {
            return false;
        }

        let mut builder = Path::builder();
        for ring in std::iter::once(outer).chain(holes.iter().filter(|hole| hole.len() >= 3)) {
            #[allow(clippy::cast_possible_truncation)]
            let mut points = ring
                .iter()
                .map(|point| geom::point(point.x as f32, point.y as f32));
            let Some(start) = points.next() else {
                continue;
            };
            builder.begin(start);
            for point in points {
                builder.line_to(point);
            }
            builder.end(true);
        }

        let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
        if let Err(e) = FillTessellator::new().tessellate_path(
            &builder.build(),
            &FillOptions::tolerance(FILL_TOLERANCE).with_fill_rule(FillRule::EvenOdd),
            &mut BuffersBuilder::new(&mut buffers, VertexConstructor),
        ) {
            log::debug!("failed to triangulate polygon: {e:?}");
            return false;
        }

        #[allow(clippy::cast_possible_truncation)]
        let corner = |index: u32| {
            buffers
                .vertices
                .get(index as usize)
                .map(|[x, y]| (x.round() as i32, y.round() as i32))
        };
        for triangle in buffers.indices.chunks_exact(3) {
            if let (Some(a), Some(b), Some(c)) =
                (corner(triangle[0]), corner(triangle[1]), corner(triangle[2]))
            {
                self.filled_triangle(a, b, c, color);
            }
        }
        true
    }

    /// Draws a line `width` pixels wide, following Zingl's anti-aliasing-free thick line
    /// variant of Bresenham's algorithm.
    fn thick_line(&mut self, (mut x0, mut y0): (i32, i32), (x1, y1): (i32, i32), width: f64, color: u8) {
        let width = (width - 1.0).max(0.0);
        if width == 0.0 {
            for (x, y) in bresenham((x0, y0), (x1, y1)) {
                self.buffer.set_pixel(x, y, color);
            }
            return;
        }

        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = (y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;
        let ed = if dx + dy == 0 {
            1.0
        } else {
            f64::from(dx).hypot(f64::from(dy))
        };
        let threshold = ed * (width + 1.0) / 2.0;

        loop {
            self.buffer.set_pixel(x0, y0, color);
            let mut e2 = err;
            let mut x2 = x0;
            if 2 * e2 >= -dx {
                e2 += dy;
                let mut y2 = y0;
                while f64::from(e2) < threshold && (y1 != y2 || dx > dy) {
                    y2 += sy;
                    self.buffer.set_pixel(x0, y2, color);
                    e2 += dx;
                }
                if x0 == x1 {
                    break;
                }
                e2 = err;
                err -= dy;
                x0 += sx;
            }
            if 2 * e2 <= dy {
                e2 = dx - e2;
                while f64::from(e2) < threshold && (x1 != x2 || dx < dy) {
                    x2 += sx;
                    self.buffer.set_pixel(x2, y0, color);
                    e2 += dy;
                }
                if y0 == y1 {
                    break;
                }
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Scan converts a triangle: the outline pixels of all three edges, sorted by row, are
    /// joined by horizontal spans.
    fn filled_triangle(&mut self, a: (i32, i32), b: (i32, i32), c: (i32, i32), color: u8) {
        let height = i32::try_from(self.buffer.height()).unwrap_or(i32::MAX);
        let width = i32::try_from(self.buffer.width()).unwrap_or(i32::MAX);

        let mut points: Vec<(i32, i32)> = bresenham(b, c)
            .into_iter()
            .chain(bresenham(a, c))
            .chain(bresenham(a, b))
            .filter(|(_, y)| (0..height).contains(y))
            .collect();
        points.sort_unstable_by_key(|(x, y)| (*y, *x));

        for (i, (x, y)) in points.iter().enumerate() {
            match points.get(i + 1) {
                Some((next_x, next_y)) if next_y == y => {
                    let left = (*x).max(0);
                    let right = (*next_x).min(width - 1);
                    for x in left..=right {
                        self.buffer.set_pixel(x, *y, color);
                    }
                }
                _ => self.buffer.set_pixel(*x, *y, color),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use super::{bresenham, Canvas};

    fn canvas() -> Canvas {
        Canvas::new(40, 40, true, "\n")
    }

    fn ring(points: &[(f64, f64)]) -> Vec<Point2<f64>> {
        points.iter().map(|(x, y)| Point2::new(*x, *y)).collect()
    }

    #[test]
    fn test_bresenham() {
        assert_eq!(bresenham((0, 0), (3, 1)), vec![(0, 0), (1, 0), (2, 1), (3, 1)]);
        assert_eq!(bresenham((2, 2), (2, 0)), vec![(2, 2), (2, 1), (2, 0)]);
        assert_eq!(bresenham((1, 1), (1, 1)), vec![(1, 1)]);
    }

    #[test]
    fn test_thin_line() {
        let mut canvas = canvas();
        canvas.line(&Point2::new(0.0, 0.0), &Point2::new(9.0, 0.0), 1, 1.0);
        for x in 0..=9 {
            assert!(canvas.buffer().is_set(x, 0));
        }
        assert!(!canvas.buffer().is_set(10, 0));
        assert!(!canvas.buffer().is_set(5, 1));
    }

    #[test]
    fn test_thick_line() {
        let mut canvas = canvas();
        canvas.polyline(
            &[Point2::new(2.0, 10.0), Point2::new(30.0, 10.0)],
            1,
            3.0,
        );
        assert!(canvas.buffer().is_set(2, 10));
        assert!(canvas.buffer().is_set(30, 10));
        assert!(canvas.buffer().is_set(15, 9));
        assert!(!canvas.buffer().is_set(31, 10));

        let mut thin = super::Canvas::new(40, 40, true, "\n");
        thin.polyline(&[Point2::new(2.0, 10.0), Point2::new(30.0, 10.0)], 1, 1.0);
        assert!(!thin.buffer().is_set(15, 9));
    }

    #[test]
    fn test_polygon_with_hole() {
        let mut canvas = canvas();
        let outer = ring(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
        let hole = ring(&[(5.0, 5.0), (15.0, 5.0), (15.0, 15.0), (5.0, 15.0)]);
        assert!(canvas.polygon(&[outer, hole], 2));

        assert!(canvas.buffer().is_set(2, 2));
        assert!(canvas.buffer().is_set(18, 10));
        assert!(!canvas.buffer().is_set(10, 10));
        assert!(!canvas.buffer().is_set(30, 30));
    }

    #[test]
    fn test_polygon_is_clipped_to_buffer() {
        let mut canvas = canvas();
        let outer = ring(&[(-50.0, -50.0), (100.0, -50.0), (100.0, 100.0), (-50.0, 100.0)]);
        assert!(canvas.polygon(&[outer], 2));
        assert!(canvas.buffer().is_set(0, 0));
        assert!(canvas.buffer().is_set(39, 39));
    }

    #[test]
    fn test_degenerate_polygon() {
        let mut canvas = canvas();
        let outer = ring(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0)]);
        assert!(!canvas.polygon(&[ring(&[(0.0, 0.0), (1.0, 1.0)])], 2));
        assert!(!canvas.polygon(&[ring(&[(0.0, 0.0), (1.0, 1.0)]), outer.clone()], 2));
        assert!(!canvas.polygon(&[], 2));
        assert!(!canvas.buffer().is_set(15, 2));

        assert!(canvas.polygon(&[outer], 2));
        assert!(canvas.buffer().is_set(15, 2));
    }

    #[test]
    fn test_collapsed_holes_are_skipped() {
        let mut canvas = canvas();
        let outer = ring(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
        let collapsed = [ring(&[(10.0, 10.0)]), ring(&[(5.0, 5.0), (6.0, 6.0)]), vec![]];
        let rings: Vec<_> = std::iter::once(outer).chain(collapsed).collect();

        assert!(canvas.polygon(&rings, 2));
        assert!(canvas.buffer().is_set(2, 2));
        assert!(canvas.buffer().is_set(10, 10));
        assert!(canvas.buffer().is_set(5, 5));
    }
}
