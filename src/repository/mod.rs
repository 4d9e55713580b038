pub mod errors;
#[cfg(test)]
pub mod memory;
pub mod postgres;
