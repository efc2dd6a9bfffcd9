pub mod html;
pub mod logging;
pub mod syntax;
