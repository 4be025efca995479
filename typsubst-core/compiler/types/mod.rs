//! Type model: declarations, type parameters, projections and types.
//!
//! All values are immutable once built. Argument lists are shared through
//! `Arc`, so rebuilding a type only allocates along the path that changed.

pub mod render;

pub use render::TypeRenderer;

use crate::compiler::analysis::substitution::SubstitutionMap;
use crate::compiler::analysis::variance::Variance;
use crate::compiler::errors::{find_similar_names, ModelError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(0);
static NEXT_PARAM_ID: AtomicU32 = AtomicU32::new(0);

/// Opaque handle for one generic slot of one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeParamId(u32);

/// Opaque handle for a class declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl TypeParamId {
    fn fresh() -> Self {
        Self(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl ClassId {
    fn fresh() -> Self {
        Self(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct TypeParameter {
    id: TypeParamId,
    name: String,
    variance: Variance,
}

impl TypeParameter {
    pub fn new(name: impl Into<String>, variance: Variance) -> Arc<Self> {
        Arc::new(Self {
            id: TypeParamId::fresh(),
            name: name.into(),
            variance,
        })
    }

    pub fn id(&self) -> TypeParamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaration-site variance of this slot.
    pub fn variance(&self) -> Variance {
        self.variance
    }
}

impl PartialEq for TypeParameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeParameter {}

#[derive(Debug)]
pub struct ClassDecl {
    id: ClassId,
    name: String,
    parameters: Vec<Arc<TypeParameter>>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>, parameters: Vec<Arc<TypeParameter>>) -> Arc<Self> {
        Arc::new(Self {
            id: ClassId::fresh(),
            name: name.into(),
            parameters,
        })
    }

    /// Shorthand for a declaration whose parameters are only known by name and variance.
    pub fn with_parameters<'a>(
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = (&'a str, Variance)>,
    ) -> Arc<Self> {
        let parameters = parameters
            .into_iter()
            .map(|(name, variance)| TypeParameter::new(name, variance))
            .collect();
        Self::new(name, parameters)
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Arc<TypeParameter>] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Declared variance of slot `index`; out-of-range slots read as invariant.
    pub fn declared_variance(&self, index: usize) -> Variance {
        self.parameters
            .get(index)
            .map(|p| p.variance())
            .unwrap_or_default()
    }
}

impl PartialEq for ClassDecl {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassDecl {}

/// What a type is built from: a class constructor or a bare type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeHead {
    Class(Arc<ClassDecl>),
    Parameter(Arc<TypeParameter>),
}

impl TypeHead {
    pub fn name(&self) -> &str {
        match self {
            Self::Class(decl) => decl.name(),
            Self::Parameter(param) => param.name(),
        }
    }

    pub fn declared_variance(&self, index: usize) -> Variance {
        match self {
            Self::Class(decl) => decl.declared_variance(index),
            Self::Parameter(_) => Variance::Invariant,
        }
    }

    fn hash_identity<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Class(decl) => {
                0u8.hash(state);
                decl.id().hash(state);
            }
            Self::Parameter(param) => {
                1u8.hash(state);
                param.id().hash(state);
            }
        }
    }
}

/// A type argument: `*`, or a type with a use-site variance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Star,
    Type { variance: Variance, ty: Type },
}

impl Projection {
    pub fn new(variance: Variance, ty: Type) -> Self {
        Self::Type { variance, ty }
    }

    pub fn invariant(ty: Type) -> Self {
        Self::new(Variance::Invariant, ty)
    }

    pub fn out(ty: Type) -> Self {
        Self::new(Variance::Out, ty)
    }

    pub fn contra(ty: Type) -> Self {
        Self::new(Variance::In, ty)
    }

    pub fn is_star(&self) -> bool {
        matches!(self, Self::Star)
    }

    /// Payload type; `None` for `*`.
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Self::Star => None,
            Self::Type { ty, .. } => Some(ty),
        }
    }

    /// Use-site variance; `None` for `*`.
    pub fn variance(&self) -> Option<Variance> {
        match self {
            Self::Star => None,
            Self::Type { variance, .. } => Some(*variance),
        }
    }

    /// Equality at a slot with the given declared variance.
    fn slot_eq(&self, other: &Self, declared: Variance) -> bool {
        match (self, other) {
            (Self::Star, Self::Star) => true,
            (Self::Type { variance: a, ty: ta }, Self::Type { variance: b, ty: tb }) => {
                a.effective_at(declared) == b.effective_at(declared) && ta == tb
            }
            _ => false,
        }
    }

    fn slot_hash<H: Hasher>(&self, declared: Variance, state: &mut H) {
        match self {
            Self::Star => 0u8.hash(state),
            Self::Type { variance, ty } => {
                1u8.hash(state);
                variance.effective_at(declared).hash(state);
                ty.hash(state);
            }
        }
    }
}

/// `(head, arguments, nullable)`. The argument count matches the head's arity.
#[derive(Debug, Clone)]
pub struct Type {
    head: TypeHead,
    arguments: Arc<[Projection]>,
    nullable: bool,
}

impl Type {
    /// Checked constructor for a class type.
    pub fn class(decl: &Arc<ClassDecl>, arguments: Vec<Projection>) -> Result<Self, ModelError> {
        if arguments.len() != decl.arity() {
            return Err(ModelError::ArityMismatch {
                class: decl.name().to_string(),
                expected: decl.arity(),
                found: arguments.len(),
            });
        }
        Ok(Self {
            head: TypeHead::Class(decl.clone()),
            arguments: arguments.into(),
            nullable: false,
        })
    }

    /// The class type with `*` in every slot (no arguments for a parameterless class).
    pub fn simple(decl: &Arc<ClassDecl>) -> Self {
        Self {
            head: TypeHead::Class(decl.clone()),
            arguments: vec![Projection::Star; decl.arity()].into(),
            nullable: false,
        }
    }

    /// A direct reference to a type parameter.
    pub fn parameter(param: &Arc<TypeParameter>) -> Self {
        Self {
            head: TypeHead::Parameter(param.clone()),
            arguments: Vec::<Projection>::new().into(),
            nullable: false,
        }
    }

    /// The universal nullable top type, `Any?`.
    pub fn nullable_any() -> Self {
        Self::simple(&builtins().any).nullable()
    }

    pub fn nothing() -> Self {
        Self::simple(&builtins().nothing)
    }

    pub fn head(&self) -> &TypeHead {
        &self.head
    }

    pub fn arguments(&self) -> &[Projection] {
        &self.arguments
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn nullable(self) -> Self {
        self.with_nullable(true)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn as_parameter(&self) -> Option<&Arc<TypeParameter>> {
        match &self.head {
            TypeHead::Parameter(param) => Some(param),
            TypeHead::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassDecl>> {
        match &self.head {
            TypeHead::Class(decl) => Some(decl),
            TypeHead::Parameter(_) => None,
        }
    }

    pub fn is_parameter(&self) -> bool {
        self.as_parameter().is_some()
    }

    /// Same head and nullability, new arguments. Arity is the caller's concern.
    pub(crate) fn with_arguments(&self, arguments: Vec<Projection>) -> Self {
        Self {
            head: self.head.clone(),
            arguments: arguments.into(),
            nullable: self.nullable,
        }
    }

    /// Type parameters occurring anywhere in this type, in first-seen order.
    pub fn free_parameters(&self) -> Vec<TypeParamId> {
        let mut found = Vec::new();
        self.collect_parameters(&mut found);
        found
    }

    fn collect_parameters(&self, found: &mut Vec<TypeParamId>) {
        if let Some(param) = self.as_parameter() {
            if !found.contains(&param.id()) {
                found.push(param.id());
            }
        }
        for ty in self.arguments.iter().filter_map(Projection::ty) {
            ty.collect_parameters(found);
        }
    }

    /// Whether any parameter bound by `map` occurs in this type.
    pub fn mentions_any(&self, map: &SubstitutionMap) -> bool {
        if let Some(param) = self.as_parameter() {
            if map.contains(param.id()) {
                return true;
            }
        }
        self.arguments
            .iter()
            .filter_map(Projection::ty)
            .any(|ty| ty.mentions_any(map))
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        if self.nullable != other.nullable
            || self.head != other.head
            || self.arguments.len() != other.arguments.len()
        {
            return false;
        }
        if Arc::ptr_eq(&self.arguments, &other.arguments) {
            return true;
        }
        self.arguments
            .iter()
            .zip(other.arguments.iter())
            .enumerate()
            .all(|(index, (a, b))| a.slot_eq(b, self.head.declared_variance(index)))
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.head.hash_identity(state);
        self.nullable.hash(state);
        for (index, argument) in self.arguments.iter().enumerate() {
            argument.slot_hash(self.head.declared_variance(index), state);
        }
    }
}

/// Built-in classes shared by every context.
pub struct Builtins {
    pub any: Arc<ClassDecl>,
    pub nothing: Arc<ClassDecl>,
    pub unit: Arc<ClassDecl>,
    pub boolean: Arc<ClassDecl>,
    pub int: Arc<ClassDecl>,
    pub long: Arc<ClassDecl>,
    pub double: Arc<ClassDecl>,
    pub char: Arc<ClassDecl>,
    pub string: Arc<ClassDecl>,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(|| Builtins {
    any: ClassDecl::new("Any", Vec::new()),
    nothing: ClassDecl::new("Nothing", Vec::new()),
    unit: ClassDecl::new("Unit", Vec::new()),
    boolean: ClassDecl::new("Boolean", Vec::new()),
    int: ClassDecl::new("Int", Vec::new()),
    long: ClassDecl::new("Long", Vec::new()),
    double: ClassDecl::new("Double", Vec::new()),
    char: ClassDecl::new("Char", Vec::new()),
    string: ClassDecl::new("String", Vec::new()),
});

pub fn builtins() -> &'static Builtins {
    &BUILTINS
}

impl Builtins {
    pub fn all(&self) -> [&Arc<ClassDecl>; 9] {
        [
            &self.any,
            &self.nothing,
            &self.unit,
            &self.boolean,
            &self.int,
            &self.long,
            &self.double,
            &self.char,
            &self.string,
        ]
    }
}

/// Named declarations visible to the notation reader.
///
/// Holds class declarations and the free type parameters that type
/// expressions may mention. Safe to share between threads: lookups are
/// lock-free and declarations are serialized, so a name is admitted once.
pub struct TypeContext {
    classes: DashMap<String, Arc<ClassDecl>>,
    parameters: DashMap<String, Arc<TypeParameter>>,
    declaring: Mutex<()>,
}

impl TypeContext {
    pub fn new() -> Self {
        let ctx = Self {
            classes: DashMap::new(),
            parameters: DashMap::new(),
            declaring: Mutex::new(()),
        };
        for decl in builtins().all() {
            ctx.classes.insert(decl.name().to_string(), decl.clone());
        }
        ctx
    }

    pub fn declare_class<'a>(
        &self,
        name: &str,
        parameters: impl IntoIterator<Item = (&'a str, Variance)>,
    ) -> Result<Arc<ClassDecl>, ModelError> {
        let _declaring = self.declaring.lock();
        if self.parameters.contains_key(name) {
            return Err(ModelError::DuplicateDeclaration { name: name.to_string() });
        }
        match self.classes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ModelError::DuplicateDeclaration { name: name.to_string() }),
            Entry::Vacant(slot) => {
                let decl = ClassDecl::with_parameters(name, parameters);
                slot.insert(decl.clone());
                Ok(decl)
            }
        }
    }

    /// Bring a free type parameter into scope for type expressions.
    pub fn declare_parameter(&self, name: &str) -> Result<Arc<TypeParameter>, ModelError> {
        let _declaring = self.declaring.lock();
        if self.classes.contains_key(name) {
            return Err(ModelError::DuplicateDeclaration { name: name.to_string() });
        }
        match self.parameters.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ModelError::DuplicateDeclaration { name: name.to_string() }),
            Entry::Vacant(slot) => {
                let param = TypeParameter::new(name, Variance::Invariant);
                slot.insert(param.clone());
                Ok(param)
            }
        }
    }

    pub fn class(&self, name: &str) -> Option<Arc<ClassDecl>> {
        self.classes.get(name).map(|r| r.value().clone())
    }

    pub fn parameter(&self, name: &str) -> Option<Arc<TypeParameter>> {
        self.parameters.get(name).map(|r| r.value().clone())
    }

    pub fn require_parameter(&self, name: &str) -> Result<Arc<TypeParameter>, ModelError> {
        self.parameter(name).ok_or_else(|| ModelError::UnknownParameter {
            name: name.to_string(),
            suggestions: find_similar_names(name, &self.parameter_names(), 2),
        })
    }

    /// Parameters shadow classes of the same name.
    pub fn resolve(&self, name: &str) -> Result<TypeHead, ModelError> {
        if let Some(param) = self.parameter(name) {
            return Ok(TypeHead::Parameter(param));
        }
        if let Some(decl) = self.class(name) {
            return Ok(TypeHead::Class(decl));
        }
        let mut candidates = self.class_names();
        candidates.extend(self.parameter_names());
        Err(ModelError::UnknownClass {
            name: name.to_string(),
            suggestions: find_similar_names(name, &candidates, 2),
        })
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parameters.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(ty: &Type) -> u64 {
        let mut hasher = DefaultHasher::new();
        ty.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_arity_is_checked() {
        let pair = ClassDecl::with_parameters("P", [("T", Variance::Invariant), ("R", Variance::Invariant)]);
        let int = Type::simple(&builtins().int);
        let err = Type::class(&pair, vec![Projection::invariant(int)]).unwrap_err();
        assert_eq!(
            err,
            ModelError::ArityMismatch { class: "P".to_string(), expected: 2, found: 1 }
        );
    }

    #[test]
    fn test_redundant_projection_compares_equal() {
        let out = ClassDecl::with_parameters("Out", [("T", Variance::Out)]);
        let string = Type::simple(&builtins().string);
        let plain = Type::class(&out, vec![Projection::invariant(string.clone())]).unwrap();
        let annotated = Type::class(&out, vec![Projection::out(string.clone())]).unwrap();
        assert_eq!(plain, annotated);
        assert_eq!(hash_of(&plain), hash_of(&annotated));

        let contra = Type::class(&out, vec![Projection::contra(string)]).unwrap();
        assert_ne!(plain, contra);
    }

    #[test]
    fn test_invariant_slot_distinguishes_projections() {
        let c = ClassDecl::with_parameters("C", [("T", Variance::Invariant)]);
        let string = Type::simple(&builtins().string);
        let plain = Type::class(&c, vec![Projection::invariant(string.clone())]).unwrap();
        let annotated = Type::class(&c, vec![Projection::out(string)]).unwrap();
        assert_ne!(plain, annotated);
    }

    #[test]
    fn test_parameter_identity_is_by_handle() {
        let a = TypeParameter::new("T", Variance::Invariant);
        let b = TypeParameter::new("T", Variance::Invariant);
        assert_ne!(Type::parameter(&a), Type::parameter(&b));
        assert_eq!(Type::parameter(&a), Type::parameter(&a));
    }

    #[test]
    fn test_free_parameters() {
        let pair = ClassDecl::with_parameters("P", [("A", Variance::Invariant), ("B", Variance::Invariant)]);
        let t = TypeParameter::new("T", Variance::Invariant);
        let r = TypeParameter::new("R", Variance::Invariant);
        let inner = Type::class(
            &pair,
            vec![Projection::invariant(Type::parameter(&t)), Projection::invariant(Type::parameter(&r))],
        )
        .unwrap();
        let outer = Type::class(
            &pair,
            vec![Projection::invariant(Type::parameter(&t)), Projection::out(inner)],
        )
        .unwrap();
        assert_eq!(outer.free_parameters(), vec![t.id(), r.id()]);
    }

    #[test]
    fn test_context_resolution() {
        let ctx = TypeContext::new();
        ctx.declare_class("Box", [("T", Variance::Out)]).unwrap();
        let t = ctx.declare_parameter("T").unwrap();

        assert!(matches!(ctx.resolve("Box"), Ok(TypeHead::Class(_))));
        assert!(matches!(ctx.resolve("T"), Ok(TypeHead::Parameter(p)) if p.id() == t.id()));
        assert!(matches!(ctx.resolve("String"), Ok(TypeHead::Class(_))));

        match ctx.resolve("Bx") {
            Err(ModelError::UnknownClass { suggestions, .. }) => {
                assert!(suggestions.contains(&"Box".to_string()));
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_declaration() {
        let ctx = TypeContext::new();
        assert!(matches!(
            ctx.declare_class("Int", Vec::<(&str, Variance)>::new()),
            Err(ModelError::DuplicateDeclaration { .. })
        ));
        ctx.declare_parameter("T").unwrap();
        assert!(ctx.declare_parameter("T").is_err());
    }

    #[test]
    fn test_concurrent_declarations_admit_one() {
        for _ in 0..50 {
            let ctx = TypeContext::new();
            let admitted: usize = std::thread::scope(|scope| {
                let workers: Vec<_> = (0..8)
                    .map(|i| {
                        let ctx = &ctx;
                        scope.spawn(move || {
                            if i % 2 == 0 {
                                ctx.declare_class("Shared", [("T", Variance::Invariant)]).is_ok()
                            } else {
                                ctx.declare_parameter("Shared").is_ok()
                            }
                        })
                    })
                    .collect();
                workers.into_iter().map(|w| w.join().unwrap() as usize).sum()
            });
            assert_eq!(admitted, 1);
            assert!(ctx.class("Shared").is_some() != ctx.parameter("Shared").is_some());
        }
    }

    #[test]
    fn test_top_type() {
        let top = Type::nullable_any();
        assert!(top.is_nullable());
        assert_eq!(top.as_class().map(|d| d.name()), Some("Any"));
        assert!(top.arguments().is_empty());
    }
}
