//! Inline addressing: points, pins, step coordinates and selections.

#[allow(clippy::module_inception)]
mod pin;
mod point;
mod selection;
pub mod steps;

pub use pin::{enclosing_text_block, Pin};
pub use point::Point;
pub use selection::{BlockSelection, Direction, PinnedSelection, SelectionState};
pub use steps::{insert_inp, leaves_of, remove_inp, split_inp, total_steps, InlineLeaf, StepMap};
