//! # Clock Geometry and Text Formatting
//!
//! Pure functions from a wall-clock reading and a face size to hand endpoints (analog) or
//! formatted strings (digital). Nothing here touches widgets.
//!
//! ## Angles
//! Angles are in degrees, measured clockwise from screen "east" (y grows downwards), with a
//! `-90` offset so that zero on the dial sits at twelve o'clock:
//! ```text
//! angle = value / max * 360 - 90
//! hour  = ((hour % 12) + minute / 60) * 30 - 90
//! ```
//!
//! ## Hand Lengths
//! Fixed fractions of the face diameter: hour 0.25, minute 0.35, second 0.40. Lengths and the
//! centre are derived from the face size at each rebuild; within one rebuild only the tips move.

use chrono::{NaiveDate, Timelike};
use embedded_graphics::prelude::{Point, Size};

/// Containers narrower or shorter than this are laid out compactly.
pub const COMPACT_MAX_WIDTH: u32 = 240;
pub const COMPACT_MAX_HEIGHT: u32 = 180;

/// Smallest analog face in compact and regular layouts.
pub const MIN_FACE_COMPACT: u32 = 120;
pub const MIN_FACE_REGULAR: u32 = 200;

/// Hand length as a fraction of the face diameter.
pub const HOUR_HAND_RATIO: f32 = 0.25;
pub const MINUTE_HAND_RATIO: f32 = 0.35;
pub const SECOND_HAND_RATIO: f32 = 0.40;

/// Size of the container the clock renders into, sampled at rebuild time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    /// True for small hosts (e.g. 240x135 keyboard displays)
    pub compact: bool,
}

impl DisplayMetrics {
    pub fn from_size(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
            compact: size.width < COMPACT_MAX_WIDTH || size.height < COMPACT_MAX_HEIGHT,
        }
    }

    /// Diameter of the analog face: the largest that leaves margins, but never below the
    /// layout minimum.
    pub fn face_size(&self) -> u32 {
        let fit = ((self.width as f32 * 0.85) as u32).min((self.height as f32 * 0.75) as u32);
        let floor = if self.compact {
            MIN_FACE_COMPACT
        } else {
            MIN_FACE_REGULAR
        };
        fit.max(floor)
    }
}

/// Generic dial angle for `value` out of `max`.
pub fn hand_angle(value: f32, max: f32) -> f32 {
    value / max * 360.0 - 90.0
}

/// Hour hand angle, folding in the fraction of the hour already elapsed.
pub fn hour_angle(hour: u32, minute: u32) -> f32 {
    ((hour % 12) as f32 + minute as f32 / 60.0) * 30.0 - 90.0
}

pub fn minute_angle(minute: u32) -> f32 {
    hand_angle(minute as f32, 60.0)
}

pub fn second_angle(second: u32) -> f32 {
    hand_angle(second as f32, 60.0)
}

/// Point `length` pixels from `center` along `angle_deg`.
///
/// Offsets are truncated towards zero like the integer coordinates of the display.
pub fn endpoint(center: Point, length: i32, angle_deg: f32) -> Point {
    let rad = angle_deg.to_radians();
    let dx = (length as f32 * rad.cos()) as i32;
    let dy = (length as f32 * rad.sin()) as i32;
    Point::new(center.x + dx, center.y + dy)
}

/// One hand: a fixed length and the tip it currently points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hand {
    pub length: i32,
    pub tip: Point,
}

impl Hand {
    fn new(center: Point, length: i32) -> Self {
        // Parked at twelve until the first update
        Self {
            length,
            tip: Point::new(center.x, center.y - length),
        }
    }

    fn point_at(&mut self, center: Point, angle_deg: f32) {
        self.tip = endpoint(center, self.length, angle_deg);
    }

    /// The (center, tip) segment in face-local coordinates.
    pub fn segment(&self, center: Point) -> [Point; 2] {
        [center, self.tip]
    }
}

/// Hour, minute and second hands of one face, in face-local pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandGeometry {
    pub center: Point,
    pub hour: Hand,
    pub minute: Hand,
    pub second: Hand,
}

impl HandGeometry {
    /// Lengths and centre for a face of `face_size` pixels.
    pub fn new(face_size: u32) -> Self {
        let half = (face_size / 2) as i32;
        let center = Point::new(half, half);
        let length = |ratio: f32| (face_size as f32 * ratio) as i32;
        Self {
            center,
            hour: Hand::new(center, length(HOUR_HAND_RATIO)),
            minute: Hand::new(center, length(MINUTE_HAND_RATIO)),
            second: Hand::new(center, length(SECOND_HAND_RATIO)),
        }
    }

    /// Move the tips to `time` in place.
    pub fn update<T: Timelike>(&mut self, time: &T) {
        let center = self.center;
        self.hour
            .point_at(center, hour_angle(time.hour(), time.minute()));
        self.minute.point_at(center, minute_angle(time.minute()));
        self.second.point_at(center, second_angle(time.second()));
    }
}

/// A tick mark on the dial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub inner: Point,
    pub outer: Point,
    pub width: u32,
}

/// Twelve hour markers, emphasised at 12, 3, 6 and 9.
pub fn hour_markers(face_size: u32, compact: bool) -> Vec<Marker> {
    let half = (face_size / 2) as i32;
    let center = Point::new(half, half);
    let r_outer = half - 4;

    (0..12u32)
        .map(|i| {
            let major = i % 3 == 0;
            let length = if major {
                (face_size / 8) as i32
            } else {
                (face_size / 14) as i32
            };
            let width = match (major, compact) {
                (true, true) => 3,
                (true, false) => 4,
                (false, true) => 1,
                (false, false) => 2,
            };
            let angle = hand_angle(i as f32, 12.0);
            Marker {
                inner: endpoint(center, r_outer - length, angle),
                outer: endpoint(center, r_outer, angle),
                width,
            }
        })
        .collect()
}

/// Time text: `HH:MM:SS` or `hh:mm:ss AM/PM`.
pub fn format_time<T: Timelike>(time: &T, use_24_hour: bool) -> String {
    if use_24_hour {
        format!(
            "{:02}:{:02}:{:02}",
            time.hour(),
            time.minute(),
            time.second()
        )
    } else {
        let (pm, hour12) = time.hour12();
        format!(
            "{:02}:{:02}:{:02} {}",
            hour12,
            time.minute(),
            time.second(),
            if pm { "PM" } else { "AM" }
        )
    }
}

/// Layouts for the date label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateStyle {
    /// `MM/DD`, the analog face slot
    Short,
    /// `MM/DD/YYYY`, compact digital
    Numeric,
    /// `Weekday, Month DD, YYYY`, regular digital
    Long,
}

impl DateStyle {
    pub fn for_digital(compact: bool) -> Self {
        if compact {
            DateStyle::Numeric
        } else {
            DateStyle::Long
        }
    }
}

pub fn format_date(date: &NaiveDate, style: DateStyle) -> String {
    let pattern = match style {
        DateStyle::Short => "%m/%d",
        DateStyle::Numeric => "%m/%d/%Y",
        DateStyle::Long => "%A, %B %d, %Y",
    };
    date.format(pattern).to_string()
}
