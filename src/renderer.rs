//! # Frame Rendering
//!
//! This module turns the widget tree into pixels on any `embedded-graphics` target, and
//! provides a 1-bit [`FrameBuffer`] with an ASCII preview for development on desktop
//! systems.
//!
//! Drawing is monochrome: panels and buttons are outlined, lines are stroked with their
//! width, labels are centred mono-font text. Hidden widgets hide their whole subtree.

use crate::widgets::{WidgetId, WidgetKind, WidgetTree};
use core::convert::Infallible;
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, RoundedRectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use std::fmt::Write as _;

/// Labels at least this tall get the large font.
const LARGE_FONT_MIN_HEIGHT: u32 = 20;

/// Draw the visible subtree under `root` onto `target`.
pub fn draw_tree<D>(tree: &WidgetTree, root: WidgetId, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let (Some(origin), Some(widget)) = (tree.absolute_origin(root), tree.get(root)) else {
        return Ok(());
    };
    draw_node(tree, root, origin - widget.area.top_left, target)
}

fn draw_node<D>(
    tree: &WidgetTree,
    id: WidgetId,
    parent_origin: Point,
    target: &mut D,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let Some(widget) = tree.get(id) else {
        return Ok(());
    };
    if widget.hidden {
        return Ok(());
    }

    let area = widget.area.translate(parent_origin);
    let outline = PrimitiveStyle::with_stroke(BinaryColor::On, 1);

    match &widget.kind {
        WidgetKind::Container => {}
        WidgetKind::Panel { round: true } => {
            let diameter = area.size.width.min(area.size.height);
            Circle::new(area.top_left, diameter)
                .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 2))
                .draw(target)?;
        }
        WidgetKind::Panel { round: false } | WidgetKind::Button => {
            RoundedRectangle::with_equal_corners(area, Size::new(6, 6))
                .into_styled(outline)
                .draw(target)?;
        }
        WidgetKind::Label { text } => {
            let font = if area.size.height >= LARGE_FONT_MIN_HEIGHT {
                &FONT_10X20
            } else {
                &FONT_6X10
            };
            let layout = TextStyleBuilder::new()
                .alignment(Alignment::Center)
                .baseline(Baseline::Middle)
                .build();
            Text::with_text_style(
                text,
                area.center(),
                MonoTextStyle::new(font, BinaryColor::On),
                layout,
            )
            .draw(target)?;
        }
        WidgetKind::Line { points, width } => {
            Line::new(points[0] + area.top_left, points[1] + area.top_left)
                .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, *width))
                .draw(target)?;
        }
    }

    for child in tree.children(id) {
        draw_node(tree, *child, area.top_left, target)?;
    }
    Ok(())
}

/// In-memory 1-bit framebuffer, one bit per pixel, rows padded to whole bytes.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let bytes_per_row = width.div_ceil(8);
        Self {
            width,
            height,
            bits: vec![0; (bytes_per_row * height) as usize],
        }
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    fn offset(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.width.div_ceil(8) + x / 8) as usize;
        Some((index, 0x80 >> (x % 8)))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if let Some((index, mask)) = self.offset(x, y) {
            if on {
                self.bits[index] |= mask;
            } else {
                self.bits[index] &= !mask;
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        self.offset(x, y)
            .map(|(index, mask)| self.bits[index] & mask != 0)
            .unwrap_or(false)
    }

    /// Number of lit pixels.
    pub fn lit_pixels(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Downsample into characters, one per `cell_w` x `cell_h` block, shaded by coverage.
    pub fn to_ascii(&self, cell_w: u32, cell_h: u32) -> String {
        const SHADES: [char; 4] = [' ', '.', '+', '#'];
        let (cell_w, cell_h) = (cell_w.max(1), cell_h.max(1));
        let mut out = String::new();

        for cy in (0..self.height).step_by(cell_h as usize) {
            for cx in (0..self.width).step_by(cell_w as usize) {
                let mut lit = 0;
                let mut total = 0;
                for y in cy..(cy + cell_h).min(self.height) {
                    for x in cx..(cx + cell_w).min(self.width) {
                        total += 1;
                        lit += self.pixel(x, y) as u32;
                    }
                }
                let shade = if lit == 0 {
                    0
                } else {
                    (1 + lit * 3 / (total + 1)).min(3) as usize
                };
                out.push(SHADES[shade]);
            }
            // Trailing blanks carry no information
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

/// Indented outline of the subtree under `root`, one widget per line.
pub fn describe_tree(tree: &WidgetTree, root: WidgetId) -> String {
    let mut out = String::new();
    let mut pending = vec![(root, 0usize)];

    while let Some((id, depth)) = pending.pop() {
        let Some(widget) = tree.get(id) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        let size = widget.area.size;
        let _ = match &widget.kind {
            WidgetKind::Container => write!(out, "{indent}container {}x{}", size.width, size.height),
            WidgetKind::Panel { round: true } => write!(out, "{indent}face {}x{}", size.width, size.height),
            WidgetKind::Panel { round: false } => write!(out, "{indent}panel {}x{}", size.width, size.height),
            WidgetKind::Button => write!(out, "{indent}button"),
            WidgetKind::Label { text } => write!(out, "{indent}label {text:?}"),
            WidgetKind::Line { points, width } => write!(
                out,
                "{indent}line ({},{})-({},{}) w{width}",
                points[0].x, points[0].y, points[1].x, points[1].y
            ),
        };
        if widget.hidden {
            out.push_str(" [hidden]");
        }
        out.push('\n');

        // Reverse so children come out in creation order
        for child in tree.children(id).iter().rev() {
            pending.push((*child, depth + 1));
        }
    }
    out
}
