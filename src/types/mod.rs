pub mod fund;
pub mod history;
pub mod market;
pub mod signal;

pub use fund::*;
pub use history::*;
pub use market::*;
pub use signal::*;
