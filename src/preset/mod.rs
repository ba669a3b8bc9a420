pub mod applier;
pub use applier::*;
pub mod table;
pub use table::*;
pub mod types;
pub use types::*;
