pub mod data;
pub mod io;
pub mod printing;

pub use data::{path_display, Config, API_URL_ENV, DEFAULT_API_URL};
pub use io::ConfigError;
