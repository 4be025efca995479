pub mod config;
pub mod parser;

pub use config::Config;
pub use parser::{parse_binding, parse_declarations, parse_projection, parse_substitution, parse_type};

use crate::compiler::errors::ParseError;
use crate::compiler::types::TypeContext;

/// Declarations the CLI falls back to when no `--decls` file is given.
pub const FIXTURE_DECLARATIONS: &str = "\
class C<T>
class Out<out T>
class In<in T>
class P<T, R>
class Rec<T>
params T, R
";

/// A fresh context holding the builtins plus [`FIXTURE_DECLARATIONS`].
pub fn fixture_context() -> Result<TypeContext, ParseError> {
    let ctx = TypeContext::new();
    parse_declarations(&ctx, FIXTURE_DECLARATIONS)?;
    Ok(ctx)
}
