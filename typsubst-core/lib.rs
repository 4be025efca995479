//! Typsubst - variance-aware substitution of generic type parameters
//!
//! Replaces type parameters inside generic types with use-site projected
//! arguments, combining declaration-site and use-site variance and
//! propagating nullability.

// Compiler modules
pub mod compiler {
    pub mod types;
    pub mod analysis;
    pub mod errors;
    pub mod frontend;
}

// Infrastructure (batching, caching, logging, metrics)
pub mod infrastructure;

pub use compiler::{
    types::{builtins, ClassDecl, Projection, Type, TypeContext, TypeHead, TypeParamId, TypeParameter, TypeRenderer},
    analysis::{merge, MapId, Merge, ProjectionKind, SubstitutionMap, Substitutor, Variance},
    errors::{ConfigError, ModelError, ParseError, VarianceConflict},
    frontend::{
        fixture_context, parse_binding, parse_declarations, parse_projection, parse_substitution, parse_type,
        Config,
    },
};

pub use infrastructure::{
    init_dev_logging, init_logging, init_prod_logging, BatchSubstitutor, LogConfig, LogFormat, LogOutput,
    SubstitutionCache, SubstitutionMetrics,
};
