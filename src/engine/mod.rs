//! Engine module containing the orchestration core and its collaborators

pub mod cards;
pub mod clients;
pub mod core;
pub mod history;
pub mod profiles;

pub use cards::*;
pub use clients::*;
pub use core::*;
pub use history::*;
pub use profiles::*;
