//! # Render Builder
//!
//! Builds the widget subtree for exactly one of three visual states and updates it in place
//! between rebuilds.
//!
//! ## States
//! - **Unsynced**: card with a Wi-Fi prompt and a "Connect to Wi-Fi" button
//! - **Analog**: round face, twelve markers, three hands, centre dot, `MM/DD` date
//! - **Digital**: large time label and a date label underneath
//!
//! ## Transitions
//! [`rebuild`] is the only way between states: destroy the container's subtree, re-measure
//! the container, build the target state, then invalidate the new subtree and its ancestors.
//! Same-state ticks go through [`RenderState::refresh`] and never recreate widgets.

use crate::geometry::{
    format_date, format_time, hour_markers, DateStyle, DisplayMetrics, HandGeometry,
};
use crate::widgets::{centered, WidgetError, WidgetId, WidgetKind, WidgetTree};
use crate::RenderKind;
use chrono::NaiveDateTime;
use embedded_graphics::prelude::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use tracing::debug;

/// Title shown when the prompt is first built
pub const TITLE_NOT_SYNCED: &str = "Time Not Synced";
/// Title rewritten by every unsynced refresh tick
pub const MESSAGE_NOT_SYNCED: &str = "No Wi-Fi - Time not synced";
pub const SUBTITLE_CONNECT: &str = "Connect to Wi-Fi to sync time";
pub const BUTTON_CONNECT: &str = "Connect to Wi-Fi";
const WIFI_ICON: &str = "((o))";

/// Line heights for the two label sizes the renderer knows.
const SMALL_TEXT: u32 = 12;
const LARGE_TEXT: u32 = 22;

#[derive(Debug, Clone, PartialEq)]
pub struct UnsyncedView {
    pub card: WidgetId,
    pub status_label: WidgetId,
    pub connect_button: WidgetId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalogView {
    pub face: WidgetId,
    pub face_size: u32,
    pub hour_hand: WidgetId,
    pub minute_hand: WidgetId,
    pub second_hand: WidgetId,
    pub date_label: WidgetId,
    /// Mutated in place on every tick
    pub hands: HandGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigitalView {
    pub time_label: WidgetId,
    pub date_label: WidgetId,
    pub date_style: DateStyle,
}

/// The live visual state and the handles of its widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Unsynced(UnsyncedView),
    Analog(AnalogView),
    Digital(DigitalView),
}

impl RenderState {
    pub fn kind(&self) -> RenderKind {
        match self {
            RenderState::Unsynced(_) => RenderKind::Unsynced,
            RenderState::Analog(_) => RenderKind::Analog,
            RenderState::Digital(_) => RenderKind::Digital,
        }
    }

    /// The connect button of the unsynced prompt, if that is the live state.
    pub fn connect_button(&self) -> Option<WidgetId> {
        match self {
            RenderState::Unsynced(view) => Some(view.connect_button),
            _ => None,
        }
    }

    /// Incremental update of the already-built widgets.
    ///
    /// Every mutation goes through a handle check, so a subtree torn down underneath us
    /// turns this into a no-op.
    pub fn refresh(&mut self, tree: &mut WidgetTree, now: &NaiveDateTime, use_24_hour: bool) {
        match self {
            RenderState::Unsynced(view) => {
                tree.set_text(view.status_label, MESSAGE_NOT_SYNCED);
            }
            RenderState::Analog(view) => {
                if !tree.is_valid(view.face) {
                    return;
                }
                view.hands.update(&now.time());
                let center = view.hands.center;
                tree.set_points(view.hour_hand, view.hands.hour.segment(center));
                tree.set_points(view.minute_hand, view.hands.minute.segment(center));
                tree.set_points(view.second_hand, view.hands.second.segment(center));
                tree.set_text(view.date_label, &format_date(&now.date(), DateStyle::Short));
            }
            RenderState::Digital(view) => {
                tree.set_text(view.time_label, &format_time(&now.time(), use_24_hour));
                tree.set_text(view.date_label, &format_date(&now.date(), view.date_style));
            }
        }
    }
}

/// Tear down whatever is under `container` and build `target` in its place.
///
/// The container is re-measured on every call so a resized host gets a fresh layout.
pub fn rebuild(
    tree: &mut WidgetTree,
    container: WidgetId,
    target: RenderKind,
    now: &NaiveDateTime,
    use_24_hour: bool,
) -> Result<RenderState, WidgetError> {
    let size = tree.size(container).ok_or(WidgetError::Stale(container))?;
    tree.clean(container);
    let metrics = DisplayMetrics::from_size(size);

    let mut state = match target {
        RenderKind::Unsynced => RenderState::Unsynced(build_prompt(tree, container, &metrics)?),
        RenderKind::Analog => RenderState::Analog(build_analog(tree, container, &metrics)?),
        RenderKind::Digital => RenderState::Digital(build_digital(tree, container, &metrics)?),
    };
    state.refresh(tree, now, use_24_hour);

    // Force a redraw of the new subtree and everything above it
    let children = tree.children(container).to_vec();
    for child in children {
        tree.invalidate(child);
    }
    tree.invalidate(container);

    debug!(
        ?target,
        width = metrics.width,
        height = metrics.height,
        compact = metrics.compact,
        widgets = tree.descendant_count(container),
        "Rebuilt clock"
    );
    Ok(state)
}

fn label(text: &str) -> WidgetKind {
    WidgetKind::Label {
        text: text.to_string(),
    }
}

fn build_prompt(
    tree: &mut WidgetTree,
    container: WidgetId,
    metrics: &DisplayMetrics,
) -> Result<UnsyncedView, WidgetError> {
    let (pad, gap, button_height) = if metrics.compact {
        (12, 8, 28)
    } else {
        (20, 12, 36)
    };
    let card_width = metrics.width * 9 / 10;
    let inner_width = card_width.saturating_sub(2 * pad);
    let card_height =
        pad + LARGE_TEXT + gap + SMALL_TEXT + 4 + SMALL_TEXT + gap + button_height + pad;

    let card = tree.create(
        container,
        WidgetKind::Panel { round: false },
        centered(
            Size::new(metrics.width, metrics.height),
            Size::new(card_width, card_height),
        ),
    )?;

    let mut y = pad as i32;
    let mut row = |height: u32, width: u32| {
        let x = (card_width as i32 - width as i32) / 2;
        let area = Rectangle::new(Point::new(x, y), Size::new(width, height));
        y += height as i32;
        area
    };

    tree.create(card, label(WIFI_ICON), row(LARGE_TEXT, inner_width))?;
    let _ = row(gap, 0);
    let status_label = tree.create(card, label(TITLE_NOT_SYNCED), row(SMALL_TEXT, inner_width))?;
    let _ = row(4, 0);
    tree.create(card, label(SUBTITLE_CONNECT), row(SMALL_TEXT, inner_width))?;
    let _ = row(gap, 0);
    let connect_button = tree.create(
        card,
        WidgetKind::Button,
        row(button_height, card_width * 8 / 10),
    )?;
    let button_size = tree
        .size(connect_button)
        .ok_or(WidgetError::Stale(connect_button))?;
    tree.create(
        connect_button,
        label(BUTTON_CONNECT),
        Rectangle::new(Point::zero(), button_size),
    )?;

    Ok(UnsyncedView {
        card,
        status_label,
        connect_button,
    })
}

fn build_analog(
    tree: &mut WidgetTree,
    container: WidgetId,
    metrics: &DisplayMetrics,
) -> Result<AnalogView, WidgetError> {
    let face_size = metrics.face_size();
    let face_area = Size::new(face_size, face_size);
    let local = Rectangle::new(Point::zero(), face_area);

    let face = tree.create(
        container,
        WidgetKind::Panel { round: true },
        centered(Size::new(metrics.width, metrics.height), face_area),
    )?;

    for marker in hour_markers(face_size, metrics.compact) {
        tree.create(
            face,
            WidgetKind::Line {
                points: [marker.inner, marker.outer],
                width: marker.width,
            },
            local,
        )?;
    }

    let hands = HandGeometry::new(face_size);
    let center = hands.center;
    let mut hand = |segment: [Point; 2], width: u32| {
        tree.create(
            face,
            WidgetKind::Line {
                points: segment,
                width,
            },
            local,
        )
    };
    let (hour_width, minute_width) = if metrics.compact { (4, 3) } else { (6, 4) };
    let hour_hand = hand(hands.hour.segment(center), hour_width)?;
    let minute_hand = hand(hands.minute.segment(center), minute_width)?;
    let second_hand = hand(hands.second.segment(center), 2)?;

    let dot = if metrics.compact { 8 } else { 12 };
    tree.create(
        face,
        WidgetKind::Panel { round: true },
        centered(face_area, Size::new(dot, dot)),
    )?;

    // Below the centre so the hands rarely cover it
    let date_top = face_size as i32 - 15 - SMALL_TEXT as i32;
    let date_label = tree.create(
        face,
        label(""),
        Rectangle::new(Point::new(0, date_top), Size::new(face_size, SMALL_TEXT)),
    )?;

    Ok(AnalogView {
        face,
        face_size,
        hour_hand,
        minute_hand,
        second_hand,
        date_label,
        hands,
    })
}

fn build_digital(
    tree: &mut WidgetTree,
    container: WidgetId,
    metrics: &DisplayMetrics,
) -> Result<DigitalView, WidgetError> {
    let (lift, gap) = if metrics.compact { (25, 12) } else { (35, 16) };
    let time_height = LARGE_TEXT * 2;
    let center_y = metrics.height as i32 / 2;

    let time_top = center_y - lift - time_height as i32 / 2;
    let time_label = tree.create(
        container,
        label(""),
        Rectangle::new(
            Point::new(0, time_top),
            Size::new(metrics.width, time_height),
        ),
    )?;

    let date_top = time_top + time_height as i32 + gap;
    let date_label = tree.create(
        container,
        label(""),
        Rectangle::new(
            Point::new(0, date_top),
            Size::new(metrics.width, LARGE_TEXT),
        ),
    )?;

    Ok(DigitalView {
        time_label,
        date_label,
        date_style: DateStyle::for_digital(metrics.compact),
    })
}
