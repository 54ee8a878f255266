mod emails;
mod health_check;

pub use emails::*;
pub use health_check::*;
