mod error;
mod gcs;
mod traits;
mod walk;

pub use error::*;
pub use gcs::*;
pub use traits::*;
pub use walk::*;
