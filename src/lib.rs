pub mod demo;
pub mod env;
pub mod resource;
pub mod sim;
pub mod stats;

#[cfg(test)]
mod test;
