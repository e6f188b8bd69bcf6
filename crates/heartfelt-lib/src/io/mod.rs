pub mod frame;
pub mod text;
