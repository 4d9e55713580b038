pub mod restaurant;
pub mod stats;
pub mod visit;
