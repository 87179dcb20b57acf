use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Card identifier, assigned by the server.
pub type CardId = String;
/// Connection identifier, unique within its owning card.
pub type ConnectionId = String;

/// A point on the canvas. Used both for absolute coordinates and for offsets
/// relative to a card's position; which one is meant is fixed by the field
/// holding it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// A directional link drawn from a card.
///
/// The start is anchored to the owning card through `start_offset`, which is
/// relative to the card's position, so the start follows the card when it
/// moves. `end_point` is an absolute canvas coordinate and does not follow
/// any card, even if it was snapped onto one when drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub start_offset: Point,
    pub end_point: Point,
}

impl Connection {
    /// Absolute start coordinate for an owner at `owner_position`.
    pub fn start_point(&self, owner_position: Point) -> Point {
        owner_position + self.start_offset
    }
}

/// Addresses one connection through the card that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRef {
    pub card_id: CardId,
    pub connection_id: ConnectionId,
}

impl ConnectionRef {
    pub fn new(card_id: impl Into<CardId>, connection_id: impl Into<ConnectionId>) -> Self {
        ConnectionRef {
            card_id: card_id.into(),
            connection_id: connection_id.into(),
        }
    }
}

/// A note on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub position: Point,
    pub dimensions: Size,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub folded: bool,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Card {
    pub fn new(id: impl Into<CardId>, position: Point, dimensions: Size) -> Self {
        Card {
            id: id.into(),
            title: String::new(),
            content: String::new(),
            position,
            dimensions,
            tag: String::new(),
            folded: false,
            connections: Vec::new(),
        }
    }

    pub fn connection(&self, connection_id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == connection_id)
    }

    pub fn connection_mut(&mut self, connection_id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == connection_id)
    }
}

/// A partial card update. Unset fields leave the card untouched.
///
/// Merging is field-wise: a field set in the newer patch replaces the older
/// value whole, including structured fields like `position`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folded: Option<bool>,
}

macro_rules! for_each_patch_field {
    ($m:ident) => {
        $m!(title);
        $m!(content);
        $m!(position);
        $m!(dimensions);
        $m!(tag);
        $m!(folded);
    };
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        CardPatch {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        CardPatch {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn position(position: Point) -> Self {
        CardPatch {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn dimensions(dimensions: Size) -> Self {
        CardPatch {
            dimensions: Some(dimensions),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CardPatch::default()
    }

    /// Fold `newer` into `self`; fields set in `newer` win.
    pub fn merge(&mut self, newer: CardPatch) {
        macro_rules! take_newer {
            ($f:ident) => {
                if newer.$f.is_some() {
                    self.$f = newer.$f;
                }
            };
        }
        for_each_patch_field!(take_newer);
    }

    /// Fold `older` underneath `self`; only fields unset in `self` are filled.
    pub fn merge_under(&mut self, older: CardPatch) {
        macro_rules! fill_unset {
            ($f:ident) => {
                if self.$f.is_none() {
                    self.$f = older.$f;
                }
            };
        }
        for_each_patch_field!(fill_unset);
    }

    pub fn apply_to(&self, card: &mut Card) {
        macro_rules! apply {
            ($f:ident) => {
                if let Some(v) = &self.$f {
                    card.$f = v.clone();
                }
            };
        }
        for_each_patch_field!(apply);
    }
}

/// Partial connection update. The server receives only the changed end.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_point: Option<Point>,
}

impl ConnectionPatch {
    pub fn apply_to(&self, connection: &mut Connection) {
        if let Some(offset) = self.start_offset {
            connection.start_offset = offset;
        }
        if let Some(end) = self.end_point {
            connection.end_point = end;
        }
    }
}

/// One entry of an outgoing batch: the merged changes for a single card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: CardId,
    pub changes: CardPatch,
}
