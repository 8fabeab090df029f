//! # Retained Widget Tree
//!
//! A small retained-mode UI surface: an arena of widgets addressed by generational handles.
//! It stands in for the host display toolkit so the clock logic can be driven and observed
//! without hardware.
//!
//! ## Handles
//! A [`WidgetId`] is an arena index plus a generation. Destroying a widget bumps the slot's
//! generation, so any handle still held by a pending tick becomes stale instead of dangling.
//! Mutators called with a stale handle do nothing; this is the normal outcome when a rebuild
//! tore the subtree down first.
//!
//! ## Coordinates
//! Every widget has an `area` relative to its parent's top-left corner. Line points are
//! relative to the line widget's own origin.

use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetError {
    /// The handle refers to a widget that has been destroyed
    #[error("stale widget handle {0:?}")]
    Stale(WidgetId),
}

/// Generational handle to a widget in a [`WidgetTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetId {
    index: u32,
    generation: u32,
}

/// What a widget draws.
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetKind {
    /// Invisible grouping node
    Container,
    /// Bordered box; `round` draws it as a circle (clock face, centre dot)
    Panel { round: bool },
    /// Text centred in the widget's area
    Label { text: String },
    /// Two-point polyline with a stroke width
    Line { points: [Point; 2], width: u32 },
    /// Clickable bordered box
    Button,
}

#[derive(Clone, Debug)]
pub struct Widget {
    pub kind: WidgetKind,
    pub area: Rectangle,
    pub hidden: bool,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    dirty: bool,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    widget: Option<Widget>,
}

/// Arena of widgets rooted at a screen-sized root container.
#[derive(Debug)]
pub struct WidgetTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: WidgetId,
    live: usize,
}

impl WidgetTree {
    /// A tree with one root container of `size`.
    pub fn new(size: Size) -> Self {
        let root_widget = Widget {
            kind: WidgetKind::Container,
            area: Rectangle::new(Point::zero(), size),
            hidden: false,
            parent: None,
            children: Vec::new(),
            dirty: true,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                widget: Some(root_widget),
            }],
            free: Vec::new(),
            root: WidgetId {
                index: 0,
                generation: 0,
            },
            live: 1,
        }
    }

    pub fn root(&self) -> WidgetId {
        self.root
    }

    /// Number of live widgets, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_valid(&self, id: WidgetId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.widget.as_ref())
    }

    fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.widget.as_mut())
    }

    /// Add a widget under `parent`.
    pub fn create(
        &mut self,
        parent: WidgetId,
        kind: WidgetKind,
        area: Rectangle,
    ) -> Result<WidgetId, WidgetError> {
        if !self.is_valid(parent) {
            return Err(WidgetError::Stale(parent));
        }

        let widget = Widget {
            kind,
            area,
            hidden: false,
            parent: Some(parent),
            children: Vec::new(),
            dirty: true,
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.widget = Some(widget);
                WidgetId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    widget: Some(widget),
                });
                WidgetId {
                    index,
                    generation: 0,
                }
            }
        };

        self.live += 1;
        if let Some(parent) = self.get_mut(parent) {
            parent.children.push(id);
        }
        Ok(id)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.get(id).map(|w| w.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.get(id).and_then(|w| w.parent)
    }

    /// Destroy every descendant of `id`, keeping `id` itself.
    pub fn clean(&mut self, id: WidgetId) {
        let Some(widget) = self.get_mut(id) else {
            return;
        };
        let mut pending = std::mem::take(&mut widget.children);
        widget.dirty = true;

        while let Some(child) = pending.pop() {
            if let Some(removed) = self.release(child) {
                pending.extend(removed.children);
            }
        }
    }

    /// Destroy `id` and its subtree. The root cannot be deleted.
    pub fn delete(&mut self, id: WidgetId) {
        if id == self.root || !self.is_valid(id) {
            return;
        }
        self.clean(id);
        if let Some(parent) = self.parent(id) {
            if let Some(parent) = self.get_mut(parent) {
                parent.children.retain(|c| *c != id);
                parent.dirty = true;
            }
        }
        self.release(id);
    }

    fn release(&mut self, id: WidgetId) -> Option<Widget> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let widget = slot.widget.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(widget)
    }

    pub fn text(&self, id: WidgetId) -> Option<&str> {
        match &self.get(id)?.kind {
            WidgetKind::Label { text } => Some(text),
            _ => None,
        }
    }

    pub fn points(&self, id: WidgetId) -> Option<[Point; 2]> {
        match self.get(id)?.kind {
            WidgetKind::Line { points, .. } => Some(points),
            _ => None,
        }
    }

    pub fn size(&self, id: WidgetId) -> Option<Size> {
        self.get(id).map(|w| w.area.size)
    }

    /// Replace a label's text. No-op for stale handles and non-labels.
    pub fn set_text(&mut self, id: WidgetId, value: &str) {
        if let Some(widget) = self.get_mut(id) {
            if let WidgetKind::Label { text } = &mut widget.kind {
                if text != value {
                    value.clone_into(text);
                    widget.dirty = true;
                }
            }
        }
    }

    /// Move a line's endpoints. No-op for stale handles and non-lines.
    pub fn set_points(&mut self, id: WidgetId, value: [Point; 2]) {
        if let Some(widget) = self.get_mut(id) {
            if let WidgetKind::Line { points, .. } = &mut widget.kind {
                if *points != value {
                    *points = value;
                    widget.dirty = true;
                }
            }
        }
    }

    pub fn set_hidden(&mut self, id: WidgetId, hidden: bool) {
        if let Some(widget) = self.get_mut(id) {
            if widget.hidden != hidden {
                widget.hidden = hidden;
                widget.dirty = true;
            }
        }
    }

    pub fn is_hidden(&self, id: WidgetId) -> bool {
        self.get(id).map(|w| w.hidden).unwrap_or(true)
    }

    pub fn set_size(&mut self, id: WidgetId, size: Size) {
        if let Some(widget) = self.get_mut(id) {
            widget.area.size = size;
            widget.dirty = true;
        }
    }

    /// Move `id` within its parent.
    pub fn set_position(&mut self, id: WidgetId, top_left: Point) {
        if let Some(widget) = self.get_mut(id) {
            widget.area.top_left = top_left;
            widget.dirty = true;
        }
    }

    /// Mark `id` and all of its ancestors for redraw.
    pub fn invalidate(&mut self, id: WidgetId) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.get_mut(current) {
                Some(widget) => {
                    widget.dirty = true;
                    cursor = widget.parent;
                }
                None => break,
            }
        }
    }

    pub fn is_dirty(&self, id: WidgetId) -> bool {
        self.get(id).map(|w| w.dirty).unwrap_or(false)
    }

    /// Clear all redraw marks, reporting whether any were set.
    pub fn take_dirty(&mut self) -> bool {
        let mut any = false;
        for widget in self.slots.iter_mut().filter_map(|s| s.widget.as_mut()) {
            any |= widget.dirty;
            widget.dirty = false;
        }
        any
    }

    /// Top-left of `id` in root coordinates.
    pub fn absolute_origin(&self, id: WidgetId) -> Option<Point> {
        let mut origin = Point::zero();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let widget = self.get(current)?;
            origin += widget.area.top_left;
            cursor = widget.parent;
        }
        Some(origin)
    }

    /// Number of widgets in the subtree under `id`, excluding `id`.
    pub fn descendant_count(&self, id: WidgetId) -> usize {
        let mut count = 0;
        let mut pending: Vec<WidgetId> = self.children(id).to_vec();
        while let Some(child) = pending.pop() {
            count += 1;
            pending.extend_from_slice(self.children(child));
        }
        count
    }
}

/// Rectangle of `size` centred in a parent of `parent` size.
pub fn centered(parent: Size, size: Size) -> Rectangle {
    let x = (parent.width as i32 - size.width as i32) / 2;
    let y = (parent.height as i32 - size.height as i32) / 2;
    Rectangle::new(Point::new(x, y), size)
}
