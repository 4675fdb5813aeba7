pub mod browser;

pub use browser::{ChromiumSession, ChromiumSessionFactory};
