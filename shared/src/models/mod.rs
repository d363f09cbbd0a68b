//! Domain models for plot, batch and photo verification

mod batch;
mod photo;
mod plot;

pub use batch::*;
pub use photo::*;
pub use plot::*;
