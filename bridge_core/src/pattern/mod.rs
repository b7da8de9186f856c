mod catalog;
mod defaults;

pub use catalog::{CompiledPattern, PatternCatalog, PatternDefinition, PatternGroup};
pub use defaults::classic_patterns;
