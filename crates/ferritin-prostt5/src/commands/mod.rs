pub mod devices;
pub mod predict;
