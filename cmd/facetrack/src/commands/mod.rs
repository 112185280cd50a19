//! Command implementations for the facetrack CLI.

mod gallery;
mod util;

pub use gallery::{list, retrain, EnrollArgs, MatchArgs, PruneArgs};
