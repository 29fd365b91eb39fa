pub mod json;
pub mod threads;
