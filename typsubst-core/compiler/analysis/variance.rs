use crate::compiler::types::Projection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variance {
    #[default]
    Invariant, // exact: read and write
    Out,       // producer only: C<out T> reads T
    In,        // consumer only: C<in T> accepts T
}

impl Variance {
    /// Source keyword; empty for invariant.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Invariant => "",
            Self::Out => "out",
            Self::In => "in",
        }
    }

    pub fn is_invariant(self) -> bool {
        self == Self::Invariant
    }

    /// The variance a use site actually has once the slot's declared variance
    /// is taken into account: `Out<String>` behaves like `Out<out String>`.
    pub fn effective_at(self, declared: Variance) -> Variance {
        if self.is_invariant() {
            declared
        } else {
            self
        }
    }
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invariant => write!(f, "invariant"),
            other => write!(f, "{}", other.keyword()),
        }
    }
}

impl FromStr for Variance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "invariant" | "none" => Ok(Self::Invariant),
            "out" => Ok(Self::Out),
            "in" => Ok(Self::In),
            other => Err(format!("unknown variance '{}' (expected out, in or invariant)", other)),
        }
    }
}

/// Projection kind as seen by the lattice: either a variance or `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Star,
    Kind(Variance),
}

impl ProjectionKind {
    pub fn of(projection: &Projection) -> Self {
        match projection {
            Projection::Star => Self::Star,
            Projection::Type { variance, .. } => Self::Kind(*variance),
        }
    }
}

/// Outcome of merging the three variance sources at one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Keep a concrete argument with this variance. When `widen_to_top` is set
    /// the payload is replaced by `Any?`.
    Concrete { variance: Variance, widen_to_top: bool },
    /// The position degrades to `*`.
    Star,
    /// No sound argument exists; the enclosing substitution fails.
    Conflict,
}

impl Merge {
    fn concrete(variance: Variance) -> Self {
        Self::Concrete { variance, widen_to_top: false }
    }
}

/// Combine the declared variance of a parameter slot, the projection written
/// at the use site and the projection carried by the replacement.
///
/// The rules are applied in order:
///
/// 1. a `*` use site or a `*` replacement yields `*`;
/// 2. an invariant use site takes the replacement's variance;
/// 3. an invariant replacement keeps the use-site variance;
/// 4. equal variances survive unchanged;
/// 5. `out` use site with `in` replacement: `*` if the slot declares a
///    variance, otherwise `out Any?`;
/// 6. `in` use site with `out` replacement: `*` if the slot declares a
///    variance, otherwise a conflict;
/// 7. a concrete result that contradicts a declared slot variance becomes `*`.
///
/// Rules 5 and 6 differ: an `out` position can be widened to the top type,
/// an `in` position has no such fallback.
pub fn merge(declared: Variance, use_site: ProjectionKind, replacement: ProjectionKind) -> Merge {
    use Variance::*;

    let (use_site, replacement) = match (use_site, replacement) {
        (ProjectionKind::Star, _) | (_, ProjectionKind::Star) => return Merge::Star,
        (ProjectionKind::Kind(u), ProjectionKind::Kind(r)) => (u, r),
    };

    let merged = match (use_site, replacement) {
        (Invariant, r) => Merge::concrete(r),
        (u, Invariant) => Merge::concrete(u),
        (Out, Out) => Merge::concrete(Out),
        (In, In) => Merge::concrete(In),
        (Out, In) if !declared.is_invariant() => Merge::Star,
        (Out, In) => Merge::Concrete { variance: Out, widen_to_top: true },
        (In, Out) if !declared.is_invariant() => Merge::Star,
        (In, Out) => Merge::Conflict,
    };

    absorb_declared(declared, merged)
}

fn absorb_declared(declared: Variance, merged: Merge) -> Merge {
    match merged {
        Merge::Concrete { variance, .. }
            if !declared.is_invariant() && !variance.is_invariant() && variance != declared =>
        {
            Merge::Star
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Variance::*;

    fn kind(v: Variance) -> ProjectionKind {
        ProjectionKind::Kind(v)
    }

    #[test]
    fn test_star_use_site_wins() {
        for declared in [Invariant, Out, In] {
            for replacement in [Invariant, Out, In] {
                assert_eq!(merge(declared, ProjectionKind::Star, kind(replacement)), Merge::Star);
            }
        }
    }

    #[test]
    fn test_star_replacement() {
        assert_eq!(merge(Invariant, kind(Out), ProjectionKind::Star), Merge::Star);
    }

    #[test]
    fn test_single_source_survives() {
        assert_eq!(merge(Invariant, kind(Invariant), kind(Out)), Merge::concrete(Out));
        assert_eq!(merge(Invariant, kind(Invariant), kind(In)), Merge::concrete(In));
        assert_eq!(merge(Invariant, kind(Out), kind(Invariant)), Merge::concrete(Out));
        assert_eq!(merge(Invariant, kind(In), kind(Invariant)), Merge::concrete(In));
        assert_eq!(merge(Invariant, kind(Out), kind(Out)), Merge::concrete(Out));
        assert_eq!(merge(Invariant, kind(In), kind(In)), Merge::concrete(In));
    }

    #[test]
    fn test_out_in_widens_when_invariant() {
        assert_eq!(
            merge(Invariant, kind(Out), kind(In)),
            Merge::Concrete { variance: Out, widen_to_top: true }
        );
    }

    #[test]
    fn test_in_out_conflicts_when_invariant() {
        assert_eq!(merge(Invariant, kind(In), kind(Out)), Merge::Conflict);
    }

    #[test]
    fn test_declared_variance_degrades_to_star() {
        assert_eq!(merge(Out, kind(Out), kind(In)), Merge::Star);
        assert_eq!(merge(In, kind(In), kind(Out)), Merge::Star);
        assert_eq!(merge(In, kind(Invariant), kind(Out)), Merge::Star);
        assert_eq!(merge(Out, kind(Invariant), kind(In)), Merge::Star);
    }

    #[test]
    fn test_declared_variance_absorbs_matching_projection() {
        assert_eq!(merge(Out, kind(Invariant), kind(Out)), Merge::concrete(Out));
        assert_eq!(merge(In, kind(Invariant), kind(In)), Merge::concrete(In));
        assert_eq!(merge(Out, kind(Invariant), kind(Invariant)), Merge::concrete(Invariant));
    }

    #[test]
    fn test_effective_variance() {
        assert_eq!(Invariant.effective_at(Out), Out);
        assert_eq!(In.effective_at(Out), In);
        assert_eq!(Invariant.effective_at(Invariant), Invariant);
    }

    #[test]
    fn test_parse_variance() {
        assert_eq!("out".parse::<Variance>(), Ok(Out));
        assert_eq!("in".parse::<Variance>(), Ok(In));
        assert_eq!("invariant".parse::<Variance>(), Ok(Invariant));
        assert!("sideways".parse::<Variance>().is_err());
    }
}
