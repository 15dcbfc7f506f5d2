pub mod controller;

pub use controller::{Persistent, StoreOptions, StoreState, exists};
