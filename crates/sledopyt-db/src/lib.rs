pub mod formdb;

pub use formdb::{default_sources, FormDatabase};
