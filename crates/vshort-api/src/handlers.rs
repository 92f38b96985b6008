//! Request handlers.

pub mod analyze;
pub mod connection;
pub mod health;
pub mod history;
pub mod jobs;
pub mod process;
pub mod scan;
pub mod uploads;

pub use analyze::*;
pub use connection::*;
pub use health::*;
pub use history::*;
pub use jobs::*;
pub use process::*;
pub use scan::*;
pub use uploads::*;
