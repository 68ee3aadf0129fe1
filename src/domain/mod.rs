pub mod book;
pub mod borrowing;
pub mod commands;
pub mod errors;
pub mod events;
pub mod fees;
pub mod payment;
pub mod value_objects;

pub use book::*;
pub use borrowing::*;
pub use errors::*;
pub use events::*;
pub use payment::*;
pub use value_objects::*;
