// Built-in components

pub mod transform;

pub use transform::{LocalPosition, LocalRotation};
