pub mod core;
pub mod reliable;
mod util;
