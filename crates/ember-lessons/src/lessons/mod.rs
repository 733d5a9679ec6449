pub mod glfw;
pub mod maths;
pub mod stb;
pub mod triangle;
