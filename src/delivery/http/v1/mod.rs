pub mod extract;
pub mod middleware;
pub mod restaurants;
pub mod stats;
pub mod visits;
pub mod wheel;
