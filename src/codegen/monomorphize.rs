// Specialization bookkeeping (§4.4.3): every call to a generic function
// with a distinct concrete type-argument tuple gets its own wasm function,
// named by mangling the argument types into the original name so two
// instantiations never collide.

use crate::types::Type;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct Monomorphizer {
    cache: RefCell<HashMap<(String, Vec<String>), String>>,
    queue: RefCell<Vec<(String, String, Vec<Type>)>>,
}

impl Monomorphizer {
    pub fn new() -> Self {
        Monomorphizer { cache: RefCell::new(HashMap::new()), queue: RefCell::new(Vec::new()) }
    }

    pub fn mangle(name: &str, args: &[Type]) -> String {
        if args.is_empty() {
            return name.to_string();
        }
        let parts: Vec<String> = args.iter().map(|t| sanitize(&t.to_string())).collect();
        format!("{}__{}", name, parts.join("_"))
    }

    /// Returns the mangled name for this `(generic_name, args)` instantiation,
    /// enqueueing the specialization for codegen the first time it's seen.
    pub fn specialize(&self, generic_name: &str, args: &[Type]) -> String {
        let key = (generic_name.to_string(), args.iter().map(|t| t.to_string()).collect());
        if let Some(existing) = self.cache.borrow().get(&key) {
            return existing.clone();
        }
        let mangled = Self::mangle(generic_name, args);
        self.cache.borrow_mut().insert(key, mangled.clone());
        self.queue.borrow_mut().push((generic_name.to_string(), mangled.clone(), args.to_vec()));
        mangled
    }

    /// Drains every specialization queued since the last call. Generating
    /// one instantiation's body can itself reference another generic call,
    /// so the driver loop keeps draining until this comes back empty.
    pub fn drain(&self) -> Vec<(String, String, Vec<Type>)> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

impl Default for Monomorphizer {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(s: &str) -> String {
    s.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_args_reuse_the_same_mangled_name_without_requeueing() {
        let m = Monomorphizer::new();
        let a = m.specialize("identity", &[Type::Int64]);
        let b = m.specialize("identity", &[Type::Int64]);
        assert_eq!(a, b);
        assert_eq!(m.drain().len(), 1);
        assert!(m.drain().is_empty());
    }

    #[test]
    fn different_args_mangle_to_different_names() {
        let m = Monomorphizer::new();
        let a = m.specialize("identity", &[Type::Int64]);
        let b = m.specialize("identity", &[Type::String]);
        assert_ne!(a, b);
    }
}
