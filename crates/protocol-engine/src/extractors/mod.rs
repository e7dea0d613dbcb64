pub mod entities;
pub mod numeric;

pub use entities::EntityExtractor;
pub use numeric::{extract_numeric_tokens, NumericToken};
