//! Ground-up loss inputs

mod items;

pub use items::{build_gul_inputs, Coverage, GulInputs, GulItem};
