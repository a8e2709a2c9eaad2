pub mod run;
pub mod runs;
pub mod status;

pub use run::*;
pub use runs::*;
pub use status::*;
