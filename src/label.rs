//! Axis tick and title labels for the hardware renderer.
//!
//! Each label is drawn into its own square RGBA bitmap and placed in the plot
//! by a model matrix. The bitmap is mapped onto a unit quad, so the text's size
//! in the plot follows from its size relative to the bitmap.

use crate::colormap::Rgb;
use crate::error::{PlotError, Result};
use crate::geometry::{AXIS_EXTENT, Axis};
use crate::ticks::AxisTicks;

use fontdue::{Font, FontSettings};
use glam::{Mat4, Vec3};

/// Edge length of every label bitmap, in pixels.
pub const LABEL_TEXTURE_SIZE: u32 = 256;

/// Glyph size inside the label bitmap.
pub const LABEL_FONT_PX: f32 = 14.0;

/// Environment variable naming a TTF/OTF file to use for labels.
pub const FONT_ENV: &str = "SURFACE_PLOT_FONT";

// ================================================================================
// Placement
// ================================================================================

/// Whether a label marks a tick or names an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Tick,
    Title,
}

/// Horizontal placement of text inside its bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAlign {
    Left,
    Right,
    Centre,
}

/// A label's text and where it goes in the plot.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub text: String,
    /// The axis whose orientation the label follows
    pub axis: Axis,
    pub kind: LabelKind,
    pub position: Vec3,
    pub angle_deg: f32,
}

impl LabelPlacement {
    /// Y labels hug the left edge, titles are centred, other ticks are right-aligned.
    pub fn align(&self) -> LabelAlign {
        match (self.axis, self.kind) {
            (Axis::Y, _) => LabelAlign::Left,
            (_, LabelKind::Title) => LabelAlign::Centre,
            (_, LabelKind::Tick) => LabelAlign::Right,
        }
    }

    /// Transform from the unit label quad into plot space.
    pub fn model_matrix(&self) -> Mat4 {
        let p = self.position;
        let angle = self.angle_deg.to_radians();
        let t = |x: f32, y: f32, z: f32| Mat4::from_translation(Vec3::new(x, y, z));

        match (self.axis, self.kind) {
            (Axis::Y, _) => {
                t(0.0, 0.5, 0.5)
                    * t(p.x + 0.53, p.y + 0.6, p.z - 0.5)
                    * Mat4::from_rotation_x(angle)
                    * t(0.0, -0.5, -0.5)
            }
            (Axis::X, _) => {
                t(0.5, 0.5, 0.0)
                    * t(p.x - 0.5, p.y + 0.47, p.z - 0.5)
                    * Mat4::from_rotation_z(angle)
                    * t(-0.5, -0.5, 0.0)
            }
            (Axis::Z, LabelKind::Title) => {
                t(0.0, 0.5, 0.5)
                    * t(p.x - 0.3, p.y + 0.5, p.z - 0.5)
                    * Mat4::from_rotation_x(angle)
                    * Mat4::from_rotation_z(angle)
                    * t(0.0, -0.5, -0.5)
            }
            (Axis::Z, LabelKind::Tick) => {
                t(0.0, 0.5, 0.5)
                    * t(p.x - 0.53, p.y + 0.5, p.z - 0.5)
                    * Mat4::from_rotation_x(angle)
                    * t(0.0, -0.5, -0.5)
            }
        }
    }
}

/// Axis titles in x, y, z order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisTitles {
    pub x: String,
    pub y: String,
    pub z: String,
}

fn interval(ticks: usize) -> f32 {
    if ticks == 0 {
        0.0
    } else {
        1.0 / ticks as f32
    }
}

/// One placement per tick label and one per axis title.
pub fn axis_labels(ticks: &AxisTicks, titles: &AxisTitles) -> Vec<LabelPlacement> {
    let e = AXIS_EXTENT as f32;
    let mut labels = Vec::with_capacity(ticks.x.len() + ticks.y.len() + ticks.z.len() + 3);
    let mut push = |text: &str, axis, kind, position, angle_deg| {
        labels.push(LabelPlacement {
            text: text.to_string(),
            axis,
            kind,
            position,
            angle_deg,
        });
    };

    let step = interval(ticks.x_ticks());
    for (count, text) in ticks.x.iter().enumerate() {
        let offset = count as f32 * step;
        let position = Vec3::new(-e + offset - 0.02, -e - 1.0, 0.0);
        push(text, Axis::X, LabelKind::Tick, position, 90.0);
    }

    // y labels run from the far end back toward the origin
    let step = interval(ticks.y_ticks());
    for (count, text) in ticks.y.iter().rev().enumerate() {
        let offset = count as f32 * step;
        let position = Vec3::new(e, e - offset - 1.06, 0.0);
        push(text, Axis::Y, LabelKind::Tick, position, 0.0);
    }

    let step = interval(ticks.z_ticks());
    for (count, text) in ticks.z.iter().enumerate() {
        let offset = count as f32 * step;
        let position = Vec3::new(-e, -e - 1.0, offset + 0.03);
        push(text, Axis::Z, LabelKind::Tick, position, 90.0);
    }

    push(
        &titles.x,
        Axis::X,
        LabelKind::Title,
        Vec3::new(0.5, -e - 1.35, 0.0),
        0.0,
    );
    // the y title follows the x axis, turned a quarter
    push(
        &titles.y,
        Axis::X,
        LabelKind::Title,
        Vec3::new(e + 0.2, -0.5, 0.0),
        90.0,
    );
    push(
        &titles.z,
        Axis::Z,
        LabelKind::Title,
        Vec3::new(-e, -e - 1.0, 0.5),
        90.0,
    );

    labels
}

// ================================================================================
// Rasterisation
// ================================================================================

/// A square RGBA8 label image, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBitmap {
    pub size: u32,
    pub pixels: Vec<u8>,
}

impl LabelBitmap {
    pub fn transparent(size: u32) -> Self {
        Self {
            size,
            pixels: vec![0; (size * size * 4) as usize],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }
}

/// Left edge of a run of text `width` pixels wide inside a `size` wide bitmap.
pub fn text_origin(align: LabelAlign, width: f32, size: f32) -> f32 {
    let x = match align {
        LabelAlign::Left => 0.0,
        LabelAlign::Centre => size / 2.0 - width / 2.0,
        LabelAlign::Right => size - width,
    };
    x.max(0.0)
}

/// Draws label text with a system or user-supplied font.
///
/// Without a font every label comes out blank and the plot still renders.
#[derive(Clone, Default)]
pub struct LabelRasterizer {
    font: Option<Font>,
}

impl std::fmt::Debug for LabelRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelRasterizer")
            .field("font", &self.font.as_ref().and_then(Font::name))
            .finish()
    }
}

impl LabelRasterizer {
    /// A rasterizer that draws nothing.
    pub fn blank() -> Self {
        Self { font: None }
    }

    pub fn from_font_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|err| PlotError::Font(err.to_string()))?;
        Ok(Self { font: Some(font) })
    }

    /// Load the font named by [`FONT_ENV`], or the first common system font found.
    pub fn system() -> Self {
        let from_env = std::env::var_os(FONT_ENV).map(std::path::PathBuf::from);
        let candidates = from_env
            .into_iter()
            .chain(system_font_paths().into_iter().map(std::path::PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match Self::from_font_bytes(&bytes) {
                Ok(rasterizer) => {
                    tracing::debug!(path = %path.display(), "loaded label font");
                    return rasterizer;
                }
                Err(err) => tracing::debug!(path = %path.display(), %err, "skipping font"),
            }
        }

        tracing::warn!("no label font found, axis labels will be blank");
        Self::blank()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `text` in `colour` along the top edge of a fresh bitmap.
    pub fn rasterize(&self, text: &str, align: LabelAlign, colour: Rgb) -> LabelBitmap {
        let mut bitmap = LabelBitmap::transparent(LABEL_TEXTURE_SIZE);
        let Some(font) = &self.font else {
            return bitmap;
        };

        let size = LABEL_TEXTURE_SIZE as i32;
        let ascent = font
            .horizontal_line_metrics(LABEL_FONT_PX)
            .map_or(LABEL_FONT_PX, |m| m.ascent);

        let glyphs: Vec<_> = text
            .chars()
            .map(|ch| font.rasterize(ch, LABEL_FONT_PX))
            .collect();
        let width: f32 = glyphs.iter().map(|(m, _)| m.advance_width).sum();

        let mut pen = text_origin(align, width, LABEL_TEXTURE_SIZE as f32);
        for (metrics, coverage) in &glyphs {
            let left = (pen + metrics.xmin as f32).round() as i32;
            let top = (ascent - metrics.ymin as f32 - metrics.height as f32).round() as i32;

            for (row, line) in coverage.chunks_exact(metrics.width.max(1)).enumerate() {
                for (col, &alpha) in line.iter().enumerate() {
                    let (x, y) = (left + col as i32, top + row as i32);
                    if alpha == 0 || x < 0 || y < 0 || x >= size || y >= size {
                        continue;
                    }
                    let offset = ((y * size + x) * 4) as usize;
                    let existing = bitmap.pixels[offset + 3];
                    bitmap.pixels[offset..offset + 4].copy_from_slice(&[
                        colour.red,
                        colour.green,
                        colour.blue,
                        existing.max(alpha),
                    ]);
                }
            }
            pen += metrics.advance_width;
        }

        bitmap
    }
}

fn system_font_paths() -> Vec<String> {
    let mut paths: Vec<String> = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Verdana.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/Library/Fonts/Arial.ttf",
    ]
    .map(String::from)
    .to_vec();

    if let Ok(windows_dir) = std::env::var("WINDIR") {
        paths.push(format!("{windows_dir}\\Fonts\\verdana.ttf"));
        paths.push(format!("{windows_dir}\\Fonts\\arial.ttf"));
    }
    paths
}
