//! Helpers shared by the renderers.

mod dot;

pub(crate) use dot::escape_dot;
