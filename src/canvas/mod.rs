pub mod editor;
pub mod geometry;
pub mod position_sync;
pub mod session;

pub use editor::{ConnectionEditor, EditorEffect, EditorMode, HandleEnd, PointerTarget, Preview};
pub use geometry::{snap_to_edges, Anchor, Rect, Snap};
pub use position_sync::{segments_for, CardPositionSync, ConnectionSegment};
pub use session::CanvasSession;
