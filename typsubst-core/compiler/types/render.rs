//! Short-name rendering for diagnostics and tests.

use super::{Projection, Type};
use crate::compiler::analysis::variance::Variance;
use std::fmt::{self, Write};

/// Renders types as `Name<out Arg, *>?`.
///
/// A projection keyword equal to the slot's declared variance is omitted
/// unless `show_redundant_variance` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeRenderer {
    pub show_redundant_variance: bool,
}

impl TypeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        Self { show_redundant_variance: true }
    }

    pub fn render(&self, ty: &Type) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_type(&mut out, ty);
        out
    }

    /// Render a projection sitting in a slot with the given declared variance.
    pub fn render_projection(&self, projection: &Projection, declared: Variance) -> String {
        let mut out = String::new();
        let _ = self.write_projection(&mut out, projection, declared);
        out
    }

    fn write_type<W: Write>(&self, out: &mut W, ty: &Type) -> fmt::Result {
        out.write_str(ty.head().name())?;
        if !ty.arguments().is_empty() {
            out.write_char('<')?;
            for (index, argument) in ty.arguments().iter().enumerate() {
                if index > 0 {
                    out.write_str(", ")?;
                }
                self.write_projection(out, argument, ty.head().declared_variance(index))?;
            }
            out.write_char('>')?;
        }
        if ty.is_nullable() {
            out.write_char('?')?;
        }
        Ok(())
    }

    fn write_projection<W: Write>(&self, out: &mut W, projection: &Projection, declared: Variance) -> fmt::Result {
        match projection {
            Projection::Star => out.write_char('*'),
            Projection::Type { variance, ty } => {
                let redundant = *variance == declared;
                if !variance.is_invariant() && (self.show_redundant_variance || !redundant) {
                    out.write_str(variance.keyword())?;
                    out.write_char(' ')?;
                }
                self.write_type(out, ty)
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TypeRenderer::default().write_type(f, self)
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TypeRenderer::default().write_projection(f, self, Variance::Invariant)
    }
}
