//! Applies a substitution map to a type.
//!
//! The walk follows the argument tree of the input type only; replacements
//! are inserted as-is and never revisited, so a single pass always
//! terminates. Chained substitution means running a second substitutor over
//! the result.

use crate::compiler::analysis::substitution::SubstitutionMap;
use crate::compiler::analysis::variance::{self, Merge, ProjectionKind, Variance};
use crate::compiler::errors::VarianceConflict;
use crate::compiler::types::{Projection, Type, TypeParameter};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct Substitutor {
    map: SubstitutionMap,
}

impl Substitutor {
    pub fn new(map: SubstitutionMap) -> Self {
        Self { map }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn map(&self) -> &SubstitutionMap {
        &self.map
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Substitute `ty`, used in a position of the given `ambient` variance.
    ///
    /// The top level behaves like an argument slot with no declared variance:
    /// `T` in an `in` position cannot take an `out` replacement, and in an
    /// `out` position an `in` replacement widens to `Any?`.
    pub fn substitute(&self, ty: &Type, ambient: Variance) -> Result<Type, VarianceConflict> {
        let projection = Projection::new(ambient, ty.clone());
        match self.substitute_projection(&projection, Variance::Invariant)? {
            Projection::Type { ty, .. } => Ok(ty),
            // Only a `*` replacement gets here; its best type is the top type.
            Projection::Star => Ok(Type::nullable_any()),
        }
    }

    /// Substitute one argument sitting in a slot with `declared` variance.
    pub fn substitute_projection(
        &self,
        projection: &Projection,
        declared: Variance,
    ) -> Result<Projection, VarianceConflict> {
        let (use_site, payload) = match projection {
            Projection::Star => return Ok(Projection::Star),
            Projection::Type { variance, ty } => (*variance, ty),
        };

        if let Some(param) = payload.as_parameter() {
            return match self.map.get(param.id()) {
                Some(replacement) => self.replace(param, use_site, payload, replacement, declared),
                None => Ok(projection.clone()),
            };
        }

        let substituted = self.substitute_arguments(payload)?;
        Ok(Projection::new(use_site, substituted))
    }

    fn replace(
        &self,
        param: &Arc<TypeParameter>,
        use_site: Variance,
        original: &Type,
        replacement: &Projection,
        declared: Variance,
    ) -> Result<Projection, VarianceConflict> {
        let replacement_kind = ProjectionKind::of(replacement);
        match variance::merge(declared, ProjectionKind::Kind(use_site), replacement_kind) {
            Merge::Star => {
                debug!(
                    parameter = param.name(),
                    %declared,
                    %use_site,
                    replacement = %replacement,
                    "projection degraded to star"
                );
                Ok(Projection::Star)
            }
            Merge::Conflict => {
                let replacement_variance = replacement.variance().unwrap_or_default();
                debug!(
                    parameter = param.name(),
                    %use_site,
                    replacement = %replacement,
                    "variance conflict"
                );
                Err(VarianceConflict::new(param.name(), use_site, replacement_variance))
            }
            Merge::Concrete { variance, widen_to_top } => {
                // A concrete merge only comes out of a non-star replacement.
                let Some(replacement_ty) = replacement.ty() else {
                    return Ok(Projection::Star);
                };
                let ty = if widen_to_top {
                    Type::nullable_any()
                } else {
                    replacement_ty.clone()
                };
                let nullable = ty.is_nullable() || original.is_nullable() || replacement_ty.is_nullable();
                trace!(parameter = param.name(), %variance, widen_to_top, "substituted type parameter");
                Ok(Projection::new(variance, ty.with_nullable(nullable)))
            }
        }
    }

    /// Rebuild `ty` with each argument substituted. Returns `ty` itself when
    /// nothing changed, sharing its argument list.
    pub fn substitute_arguments(&self, ty: &Type) -> Result<Type, VarianceConflict> {
        if ty.arguments().is_empty() {
            return Ok(ty.clone());
        }

        let mut changed = false;
        let mut arguments = Vec::with_capacity(ty.arguments().len());
        for (index, argument) in ty.arguments().iter().enumerate() {
            let declared = ty.head().declared_variance(index);
            let substituted = self.substitute_projection(argument, declared)?;
            changed |= substituted != *argument;
            arguments.push(substituted);
        }

        if changed {
            Ok(ty.with_arguments(arguments))
        } else {
            Ok(ty.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{builtins, ClassDecl};

    struct Fixture {
        c: Arc<ClassDecl>,
        out: Arc<ClassDecl>,
        contra: Arc<ClassDecl>,
        t: Arc<TypeParameter>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                c: ClassDecl::with_parameters("C", [("X", Variance::Invariant)]),
                out: ClassDecl::with_parameters("Out", [("X", Variance::Out)]),
                contra: ClassDecl::with_parameters("In", [("X", Variance::In)]),
                t: TypeParameter::new("T", Variance::Invariant),
            }
        }

        fn t(&self) -> Type {
            Type::parameter(&self.t)
        }

        fn apply(&self, decl: &Arc<ClassDecl>, argument: Projection) -> Type {
            Type::class(decl, vec![argument]).unwrap()
        }

        fn with(&self, replacement: Projection) -> Substitutor {
            Substitutor::new(SubstitutionMap::new([(self.t.id(), replacement)]))
        }
    }

    fn string() -> Type {
        Type::simple(&builtins().string)
    }

    #[test]
    fn test_top_level_parameter() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::invariant(string()));
        assert_eq!(sub.substitute(&fx.t(), Variance::Invariant).unwrap(), string());
        assert_eq!(
            sub.substitute(&fx.t().nullable(), Variance::Invariant).unwrap(),
            string().nullable()
        );
    }

    #[test]
    fn test_ambient_variance_at_top_level() {
        let fx = Fixture::new();
        let out_string = fx.with(Projection::out(string()));
        assert_eq!(out_string.substitute(&fx.t(), Variance::Invariant).unwrap(), string());
        assert!(out_string.substitute(&fx.t(), Variance::In).is_err());

        let in_string = fx.with(Projection::contra(string()));
        assert_eq!(
            in_string.substitute(&fx.t(), Variance::Out).unwrap(),
            Type::nullable_any()
        );
    }

    #[test]
    fn test_star_replacement_at_top_level() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::Star);
        assert_eq!(sub.substitute(&fx.t(), Variance::Invariant).unwrap(), Type::nullable_any());
        let ty = fx.apply(&fx.c, Projection::invariant(fx.t()));
        assert_eq!(
            sub.substitute(&ty, Variance::Invariant).unwrap(),
            fx.apply(&fx.c, Projection::Star)
        );
    }

    #[test]
    fn test_conflict_reports_parameter() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::out(string()));
        let ty = fx.apply(&fx.c, Projection::contra(fx.t()));
        let conflict = sub.substitute(&ty, Variance::Invariant).unwrap_err();
        assert_eq!(conflict, VarianceConflict::new("T", Variance::In, Variance::Out));
    }

    #[test]
    fn test_declared_slot_keeps_variance_internally() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::out(string()));
        let result = sub
            .substitute(&fx.apply(&fx.out, Projection::invariant(fx.t())), Variance::Invariant)
            .unwrap();
        assert_eq!(result.arguments()[0].variance(), Some(Variance::Out));
        assert_eq!(result, fx.apply(&fx.out, Projection::invariant(string())));
    }

    #[test]
    fn test_declared_contra_slot_degrades_to_star() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::out(string()));
        let result = sub
            .substitute(&fx.apply(&fx.contra, Projection::invariant(fx.t())), Variance::Invariant)
            .unwrap();
        assert_eq!(result, fx.apply(&fx.contra, Projection::Star));
    }

    #[test]
    fn test_unchanged_type_shares_arguments() {
        let fx = Fixture::new();
        let sub = fx.with(Projection::invariant(string()));
        let ty = fx.apply(&fx.c, Projection::invariant(Type::simple(&builtins().int)));
        let result = sub.substitute(&ty, Variance::Invariant).unwrap();
        assert!(std::ptr::eq(result.arguments(), ty.arguments()));
    }

    #[test]
    fn test_unmapped_parameter_is_left_alone() {
        let fx = Fixture::new();
        let other = TypeParameter::new("R", Variance::Invariant);
        let sub = fx.with(Projection::invariant(string()));
        let ty = fx.apply(&fx.c, Projection::out(Type::parameter(&other)));
        assert_eq!(sub.substitute(&ty, Variance::Invariant).unwrap(), ty);
    }

    #[test]
    fn test_empty_substitutor() {
        let fx = Fixture::new();
        let sub = Substitutor::empty();
        assert!(sub.is_empty());
        assert_eq!(sub.substitute(&fx.t(), Variance::In).unwrap(), fx.t());
    }
}
