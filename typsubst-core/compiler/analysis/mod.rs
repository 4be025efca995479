pub mod substitution;
pub mod substitutor;
pub mod variance;

pub use substitution::{MapId, SubstitutionMap};
pub use substitutor::Substitutor;
pub use variance::{merge, Merge, ProjectionKind, Variance};
