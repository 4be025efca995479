//! Read-only mapping from type parameter handles to replacement projections.

use crate::compiler::types::{Projection, Type, TypeParamId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a map instance. Clones share it since they share content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u64);

#[derive(Debug, Clone)]
pub struct SubstitutionMap {
    id: MapId,
    entries: HashMap<TypeParamId, Projection>,
}

impl SubstitutionMap {
    /// Build a map from `(parameter, replacement)` pairs. A later pair for the
    /// same parameter replaces an earlier one.
    pub fn new(pairs: impl IntoIterator<Item = (TypeParamId, Projection)>) -> Self {
        Self {
            id: MapId(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)),
            entries: pairs.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Map each declared parameter of `ty`'s class to the matching argument,
    /// e.g. `List<out String>` gives `{E: out String}`.
    ///
    /// Non-class types produce an empty map.
    pub fn for_type(ty: &Type) -> Self {
        match ty.as_class() {
            Some(decl) => Self::new(
                decl.parameters()
                    .iter()
                    .zip(ty.arguments().iter())
                    .map(|(param, argument)| (param.id(), argument.clone())),
            ),
            None => Self::empty(),
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn get(&self, param: TypeParamId) -> Option<&Projection> {
        self.entries.get(&param)
    }

    pub fn contains(&self, param: TypeParamId) -> bool {
        self.entries.contains_key(&param)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeParamId, &Projection)> {
        self.entries.iter().map(|(id, projection)| (*id, projection))
    }

    /// True when no parameter bound here occurs in `ty`, so substituting
    /// `ty` again with this map returns it unchanged.
    pub fn is_fixed_point(&self, ty: &Type) -> bool {
        !ty.mentions_any(self)
    }
}

impl FromIterator<(TypeParamId, Projection)> for SubstitutionMap {
    fn from_iter<I: IntoIterator<Item = (TypeParamId, Projection)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Default for SubstitutionMap {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::analysis::variance::Variance;
    use crate::compiler::types::{builtins, ClassDecl, TypeParameter};

    #[test]
    fn test_lookup_and_miss() {
        let t = TypeParameter::new("T", Variance::Invariant);
        let r = TypeParameter::new("R", Variance::Invariant);
        let string = Projection::invariant(Type::simple(&builtins().string));
        let map = SubstitutionMap::new([(t.id(), string.clone())]);

        assert_eq!(map.get(t.id()), Some(&string));
        assert!(map.get(r.id()).is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_later_pair_wins() {
        let t = TypeParameter::new("T", Variance::Invariant);
        let int = Projection::invariant(Type::simple(&builtins().int));
        let string = Projection::out(Type::simple(&builtins().string));
        let map: SubstitutionMap = vec![(t.id(), int), (t.id(), string.clone())].into_iter().collect();
        assert_eq!(map.get(t.id()), Some(&string));
    }

    #[test]
    fn test_distinct_maps_have_distinct_ids() {
        let a = SubstitutionMap::empty();
        let b = SubstitutionMap::empty();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_map_for_class_type() {
        let list = ClassDecl::with_parameters("List", [("E", Variance::Out)]);
        let string = Projection::invariant(Type::simple(&builtins().string));
        let ty = Type::class(&list, vec![string.clone()]).unwrap();
        let map = SubstitutionMap::for_type(&ty);
        assert_eq!(map.get(list.parameters()[0].id()), Some(&string));

        let e = Type::parameter(&list.parameters()[0]);
        assert!(!map.is_fixed_point(&e));
        assert!(map.is_fixed_point(&ty));
    }
}
