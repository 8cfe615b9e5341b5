pub mod app;
pub mod camera;
pub mod config;
pub mod decision;
pub mod infer;
pub mod render;
pub mod transform;
