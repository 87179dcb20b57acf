use crate::types::{Card, CardId, Point};

/// Axis-aligned box on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        // Normalise negative sizes so left <= right and top <= bottom.
        let (left, right) = ordered(origin.x, origin.x + width);
        let (top, bottom) = ordered(origin.y, origin.y + height);
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn of_card(card: &Card) -> Self {
        Rect::new(card.position, card.dimensions.width, card.dimensions.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Closest point on the border of this box.
    ///
    /// Outside the box this is the clamped point. Inside, the pointer is
    /// pushed to whichever side is nearer: vertical edges when the horizontal
    /// gap is no larger than the vertical one, horizontal edges otherwise.
    pub fn nearest_border_point(&self, p: Point) -> Point {
        if !self.contains(p) {
            return Point::new(
                p.x.clamp(self.left, self.right),
                p.y.clamp(self.top, self.bottom),
            );
        }

        let to_left = (p.x - self.left).abs();
        let to_right = (p.x - self.right).abs();
        let to_top = (p.y - self.top).abs();
        let to_bottom = (p.y - self.bottom).abs();

        if to_left.min(to_right) <= to_top.min(to_bottom) {
            let x = if to_left <= to_right {
                self.left
            } else {
                self.right
            };
            Point::new(x, p.y.clamp(self.top, self.bottom))
        } else {
            let y = if to_top <= to_bottom {
                self.top
            } else {
                self.bottom
            };
            Point::new(p.x.clamp(self.left, self.right), y)
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One of the four fixed attachment points on a card border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

impl Anchor {
    pub const ALL: [Anchor; 4] = [Anchor::Top, Anchor::Bottom, Anchor::Left, Anchor::Right];

    /// Absolute position of this anchor on `rect` (the midpoint of the side).
    pub fn point_on(self, rect: &Rect) -> Point {
        let center = rect.center();
        match self {
            Anchor::Top => Point::new(center.x, rect.top),
            Anchor::Bottom => Point::new(center.x, rect.bottom),
            Anchor::Left => Point::new(rect.left, center.y),
            Anchor::Right => Point::new(rect.right, center.y),
        }
    }
}

/// Result of snapping a pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct Snap {
    /// The point to use: on a card edge when `target` is set, else the pointer.
    pub point: Point,
    /// Card whose edge the point landed on. Only informational: nothing keeps
    /// the point attached to this card afterwards.
    pub target: Option<CardId>,
    pub distance: f64,
}

/// Snap `pointer` onto the nearest card edge within `radius`.
///
/// Every candidate box is measured; the strictly closest border point wins
/// and ties keep the earliest candidate. If the best distance is not below
/// `radius` the raw pointer is returned.
pub fn snap_to_edges<'a, I>(pointer: Point, candidates: I, radius: f64) -> Snap
where
    I: IntoIterator<Item = (&'a CardId, Rect)>,
{
    let mut best: Option<(&CardId, Point, f64)> = None;

    for (id, rect) in candidates {
        let candidate = rect.nearest_border_point(pointer);
        let distance = pointer.distance_to(candidate);
        let closer = match best {
            Some((_, _, best_distance)) => distance < best_distance,
            None => true,
        };
        if closer {
            best = Some((id, candidate, distance));
        }
    }

    match best {
        Some((id, point, distance)) if distance < radius => Snap {
            point,
            target: Some(id.clone()),
            distance,
        },
        _ => Snap {
            point: pointer,
            target: None,
            distance: 0.0,
        },
    }
}
