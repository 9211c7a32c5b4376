// The Clarity type universe (§3.1) plus the inference-support machinery the
// checker drives it with: a scope environment, a Robinson-style unifier, and
// the canonical Option/Result union cache.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectName(pub String);

/// The closed effect catalog (§4.3.7). The built-in registry may extend it.
pub const BUILTIN_EFFECTS: &[&str] = &["DB", "Network", "Time", "Random", "Log", "FileSystem", "Test"];

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int64,
    Float64,
    Bool,
    String,
    Bytes,
    Timestamp,
    Unit,

    List(Box<Type>),
    /// Semantically a `Union` with variants `Some/None`; kept as its own
    /// variant so the checker's ad-hoc constructor resolution (§4.3.3) and
    /// pattern exhaustiveness (§4.3.8) can special-case it cheaply, while
    /// `as_union` still lets codegen treat it uniformly with user unions.
    Option(Box<Type>),
    Result(Box<Type>, Box<Type>),
    Map(Box<Type>, Box<Type>),

    Record(Rc<RecordType>),
    Union(Rc<UnionType>),

    Function {
        params: Vec<Type>,
        param_names: Option<Vec<String>>,
        return_type: Box<Type>,
        effects: Vec<String>,
    },

    Var(usize),

    /// Propagates through failed inference so cascading errors are
    /// suppressed. Equal to every type (§3.1).
    Error,
}

pub use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub variants: Vec<UnionVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl UnionType {
    pub fn tag_of(&self, variant_name: &str) -> Option<u32> {
        self.variants.iter().position(|v| v.name == variant_name).map(|i| i as u32)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int64 => write!(f, "Int64"),
            Type::Float64 => write!(f, "Float64"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Bytes => write!(f, "Bytes"),
            Type::Timestamp => write!(f, "Timestamp"),
            Type::Unit => write!(f, "Unit"),
            Type::List(inner) => write!(f, "List<{}>", inner),
            Type::Option(inner) => write!(f, "Option<{}>", inner),
            Type::Result(ok, err) => write!(f, "Result<{}, {}>", ok, err),
            Type::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
            Type::Record(r) => write!(f, "{}", r.name),
            Type::Union(u) => write!(f, "{}", u.name),
            Type::Function { params, return_type, .. } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", return_type)
            }
            Type::Var(id) => write!(f, "τ{}", id),
            Type::Error => write!(f, "<error>"),
        }
    }
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int64 | Type::Float64)
    }

    /// Equality for unification/exhaustiveness purposes: `Error` matches
    /// anything so a single prior failure doesn't cascade into unrelated
    /// diagnostics (§3.1, §7).
    pub fn unifies_trivially_with(&self, other: &Type) -> bool {
        matches!(self, Type::Error) || matches!(other, Type::Error)
    }

    pub fn as_union(&self) -> Option<Rc<UnionType>> {
        match self {
            Type::Union(u) => Some(u.clone()),
            Type::Option(inner) => Some(Rc::new(UnionType {
                name: format!("Option<{}>", inner),
                variants: vec![
                    UnionVariant { name: "Some".into(), fields: vec![("0".into(), (**inner).clone())] },
                    UnionVariant { name: "None".into(), fields: vec![] },
                ],
            })),
            Type::Result(ok, err) => Some(Rc::new(UnionType {
                name: format!("Result<{}, {}>", ok, err),
                variants: vec![
                    UnionVariant { name: "Ok".into(), fields: vec![("0".into(), (**ok).clone())] },
                    UnionVariant { name: "Err".into(), fields: vec![("0".into(), (**err).clone())] },
                ],
            })),
            _ => None,
        }
    }

    pub fn free_vars(&self) -> HashSet<usize> {
        match self {
            Type::Var(id) => [*id].into_iter().collect(),
            Type::List(inner) | Type::Option(inner) => inner.free_vars(),
            Type::Result(a, b) | Type::Map(a, b) => {
                let mut s = a.free_vars();
                s.extend(b.free_vars());
                s
            }
            Type::Function { params, return_type, .. } => {
                let mut s = HashSet::new();
                for p in params {
                    s.extend(p.free_vars());
                }
                s.extend(return_type.free_vars());
                s
            }
            _ => HashSet::new(),
        }
    }
}

/// Keyed by the stringified inner type(s) so two references to e.g.
/// `Option<Int64>` resolve to the same in-memory `Rc<UnionType>` (§3.1
/// invariant, §4.3.3, §4.4.3).
#[derive(Default)]
pub struct UnionCache {
    options: RefCell<HashMap<String, Rc<UnionType>>>,
    results: RefCell<HashMap<String, Rc<UnionType>>>,
}

impl UnionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(&self, inner: &Type) -> Rc<UnionType> {
        let key = inner.to_string();
        let mut map = self.options.borrow_mut();
        map.entry(key)
            .or_insert_with(|| {
                Rc::new(UnionType {
                    name: format!("Option<{}>", inner),
                    variants: vec![
                        UnionVariant { name: "Some".into(), fields: vec![("0".into(), inner.clone())] },
                        UnionVariant { name: "None".into(), fields: vec![] },
                    ],
                })
            })
            .clone()
    }

    pub fn result(&self, ok: &Type, err: &Type) -> Rc<UnionType> {
        let key = format!("{}|{}", ok, err);
        let mut map = self.results.borrow_mut();
        map.entry(key)
            .or_insert_with(|| {
                Rc::new(UnionType {
                    name: format!("Result<{}, {}>", ok, err),
                    variants: vec![
                        UnionVariant { name: "Ok".into(), fields: vec![("0".into(), ok.clone())] },
                        UnionVariant { name: "Err".into(), fields: vec![("0".into(), err.clone())] },
                    ],
                })
            })
            .clone()
    }
}

/// A lexical environment: a stack of value scopes (§3.3).
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    scopes: Vec<HashMap<String, Binding>>,
    next_var_id: usize,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv { scopes: vec![HashMap::new()], next_var_id: 0 }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: Type, mutable: bool) {
        self.scopes.last_mut().unwrap().insert(name.into(), Binding { ty, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn fresh_var(&mut self) -> Type {
        let id = self.next_var_id;
        self.next_var_id += 1;
        Type::Var(id)
    }
}

/// A substitution built up during unification (§4.3.2).
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: HashMap<usize, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: usize, ty: Type) {
        self.map.insert(var, ty);
    }

    pub fn apply(&self, ty: &Type) -> Type {
        self.apply_depth(ty, 0)
    }

    fn apply_depth(&self, ty: &Type, depth: usize) -> Type {
        if depth > 100 {
            return ty.clone();
        }
        match ty {
            Type::Var(id) => match self.map.get(id) {
                Some(Type::Var(other)) if other == id => ty.clone(),
                Some(sub) => self.apply_depth(sub, depth + 1),
                None => ty.clone(),
            },
            Type::List(inner) => Type::List(Box::new(self.apply_depth(inner, depth + 1))),
            Type::Option(inner) => Type::Option(Box::new(self.apply_depth(inner, depth + 1))),
            Type::Result(a, b) => Type::Result(
                Box::new(self.apply_depth(a, depth + 1)),
                Box::new(self.apply_depth(b, depth + 1)),
            ),
            Type::Map(k, v) => Type::Map(
                Box::new(self.apply_depth(k, depth + 1)),
                Box::new(self.apply_depth(v, depth + 1)),
            ),
            Type::Function { params, param_names, return_type, effects } => Type::Function {
                params: params.iter().map(|p| self.apply_depth(p, depth + 1)).collect(),
                param_names: param_names.clone(),
                return_type: Box::new(self.apply_depth(return_type, depth + 1)),
                effects: effects.clone(),
            },
            _ => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_cache_shares_identity_by_inner_type() {
        let cache = UnionCache::new();
        let a = cache.option(&Type::Int64);
        let b = cache.option(&Type::Int64);
        assert!(Rc::ptr_eq(&a, &b));
        let c = cache.option(&Type::String);
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn substitution_applies_through_composite_types() {
        let mut subst = Substitution::new();
        subst.insert(0, Type::Int64);
        let ty = Type::List(Box::new(Type::Var(0)));
        assert_eq!(subst.apply(&ty), Type::List(Box::new(Type::Int64)));
    }

    #[test]
    fn error_sentinel_unifies_with_everything() {
        assert!(Type::Error.unifies_trivially_with(&Type::Int64));
        assert!(Type::Bool.unifies_trivially_with(&Type::Error));
        assert!(!Type::Bool.unifies_trivially_with(&Type::Int64));
    }

    #[test]
    fn option_as_union_has_some_none_tags() {
        let opt = Type::Option(Box::new(Type::Int64));
        let u = opt.as_union().unwrap();
        assert_eq!(u.tag_of("Some"), Some(0));
        assert_eq!(u.tag_of("None"), Some(1));
    }
}
