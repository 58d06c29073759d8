pub mod agent;
pub mod api;
pub mod assets;
pub mod controllers;
pub mod util;

#[cfg(test)]
pub mod test_utils;
