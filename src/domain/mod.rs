//! Domain layer - Pure pipeline logic: ladder, segment naming, events, DASH.

pub mod dash;
pub mod events;
pub mod ladder;
pub mod segments;
