pub mod controller;
pub mod core;

#[cfg(test)]
mod tests;
