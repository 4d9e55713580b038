pub mod contracts;
pub mod error;
pub mod jwt;
pub mod restaurants;
#[cfg(test)]
mod scenarios;
pub mod stats;
pub mod visits;
pub mod wheel;
