//! End-to-end substitution cases over the builtin declarations:
//! `C<T>`, `Out<out T>`, `In<in T>`, `P<T, R>`, `Rec<T>` and free `T`, `R`.

use typsubst::{
    fixture_context, parse_substitution, parse_type, Substitutor, Type, TypeContext, TypeRenderer, Variance,
    VarianceConflict,
};

struct Case {
    ctx: TypeContext,
}

impl Case {
    fn new() -> Self {
        Self { ctx: fixture_context().unwrap() }
    }

    fn substitute(&self, ty: &str, bindings: &[&str]) -> Result<Type, VarianceConflict> {
        let ty = parse_type(&self.ctx, ty).unwrap();
        let map = parse_substitution(&self.ctx, bindings).unwrap();
        Substitutor::new(map).substitute(&ty, Variance::Invariant)
    }

    fn check(&self, ty: &str, bindings: &[&str], expected: &str) {
        let result = self.substitute(ty, bindings).unwrap();
        assert_eq!(result.to_string(), expected, "{} with {:?}", ty, bindings);
        assert_eq!(result, parse_type(&self.ctx, expected).unwrap());
    }
}

#[test]
fn test_no_occurrence() {
    Case::new().check("C<Int>", &["T=String"], "C<Int>");
}

#[test]
fn test_simple_replacement() {
    Case::new().check("C<T>", &["T=String"], "C<String>");
}

#[test]
fn test_replacement_projection_is_kept() {
    let case = Case::new();
    case.check("C<T>", &["T=out String"], "C<out String>");
    case.check("C<T>", &["T=in String"], "C<in String>");
}

#[test]
fn test_use_site_projection_is_kept() {
    let case = Case::new();
    case.check("C<out T>", &["T=String"], "C<out String>");
    case.check("C<in T>", &["T=String"], "C<in String>");
}

#[test]
fn test_matching_projections() {
    let case = Case::new();
    case.check("C<out T>", &["T=out String"], "C<out String>");
    case.check("C<in T>", &["T=in String"], "C<in String>");
}

#[test]
fn test_in_position_rejects_out_replacement() {
    let case = Case::new();
    let conflict = case.substitute("C<in T>", &["T=out String"]).unwrap_err();
    assert_eq!(conflict.parameter, "T");
    assert_eq!(conflict.use_site, Variance::In);
    assert_eq!(conflict.replacement, Variance::Out);
}

#[test]
fn test_out_position_widens_in_replacement() {
    Case::new().check("C<out T>", &["T=in String"], "C<out Any?>");
}

#[test]
fn test_declared_variance_matches_replacement() {
    let case = Case::new();
    case.check("Out<T>", &["T=out String"], "Out<String>");
    case.check("In<T>", &["T=in String"], "In<String>");
}

#[test]
fn test_declared_variance_contradicts_replacement() {
    let case = Case::new();
    case.check("In<T>", &["T=out String"], "In<*>");
    case.check("Out<T>", &["T=in String"], "Out<*>");
}

#[test]
fn test_use_site_keyword_contradicts_declaration() {
    let case = Case::new();
    case.check("Out<in T>", &["T=String"], "Out<*>");
    case.check("In<out T>", &["T=String"], "In<*>");
}

#[test]
fn test_two_parameters() {
    Case::new().check("P<T, R>", &["T=Int", "R=String"], "P<Int, String>");
}

#[test]
fn test_deep_nesting() {
    Case::new().check(
        "C<P<T, P<T, R>>>",
        &["T=Int", "R=String"],
        "C<P<Int, P<Int, String>>>",
    );
}

#[test]
fn test_top_level_nullability() {
    let case = Case::new();
    case.check("T", &["T=String"], "String");
    case.check("T?", &["T=String"], "String?");
    case.check("T", &["T=String?"], "String?");
    case.check("T?", &["T=String?"], "String?");
}

#[test]
fn test_nothing_is_untouched() {
    Case::new().check("Nothing", &["T=String"], "Nothing");
}

#[test]
fn test_argument_nullability() {
    let case = Case::new();
    case.check("C<T?>", &["T=String"], "C<String?>");
    case.check("C<T>", &["T=String?"], "C<String?>");
    case.check("C<T?>", &["T=out String"], "C<out String?>");
    case.check("C<out T>", &["T=String?"], "C<out String?>");
    case.check("Out<T?>", &["T=out String"], "Out<String?>");
    case.check("In<T>", &["T=in String?"], "In<String?>");
}

#[test]
fn test_star_arguments_are_inert() {
    let case = Case::new();
    case.check("Rec<*>", &["T=String"], "Rec<*>");
    case.check("Out<*>", &["T=String"], "Out<*>");
}

#[test]
fn test_star_replacement() {
    let case = Case::new();
    case.check("C<out T>", &["T=*"], "C<*>");
    case.check("T", &["T=*"], "Any?");
}

#[test]
fn test_conflict_deep_inside_fails_whole_type() {
    let case = Case::new();
    assert!(case.substitute("P<Int, C<C<in T>>>", &["T=out String"]).is_err());
}

#[test]
fn test_ambient_variance() {
    let case = Case::new();
    let t = parse_type(&case.ctx, "T").unwrap();
    let sub = Substitutor::new(parse_substitution(&case.ctx, ["T=out String"]).unwrap());
    assert!(sub.substitute(&t, Variance::In).is_err());
    assert_eq!(sub.substitute(&t, Variance::Out).unwrap().to_string(), "String");
}

#[test]
fn test_redundant_variance_is_carried() {
    let case = Case::new();
    let result = case.substitute("Out<T>", &["T=out String"]).unwrap();
    assert_eq!(TypeRenderer::verbose().render(&result), "Out<out String>");
    assert_eq!(TypeRenderer::new().render(&result), "Out<String>");
}

#[test]
fn test_chained_substitution() {
    let case = Case::new();
    let first = case.substitute("P<T, R>", &["T=C<R>"]).unwrap();
    assert_eq!(first.to_string(), "P<C<R>, R>");

    let second = Substitutor::new(parse_substitution(&case.ctx, ["R=Int"]).unwrap());
    assert_eq!(
        second.substitute(&first, Variance::Invariant).unwrap().to_string(),
        "P<C<Int>, Int>"
    );
}
