use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Type-erased family parameter.
///
/// Anything `Eq + Hash + Debug + 'static` is a parameter; two parameters are
/// equal only if they have the same concrete type and compare equal.
pub trait Param: Any + fmt::Debug {
    fn eq_dyn(&self, other: &dyn Param) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
    fn as_any(&self) -> &dyn Any;
}

impl<P: Any + fmt::Debug + Eq + Hash> Param for P {
    fn eq_dyn(&self, other: &dyn Param) -> bool {
        other.as_any().downcast_ref::<P>() == Some(self)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<P>().hash(&mut state);
        self.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Identity of a provider node: its name plus, for family members, the parameter.
#[derive(Clone)]
pub struct ProviderKey {
    name: &'static str,
    param: Option<Rc<dyn Param>>,
}

impl ProviderKey {
    pub fn new(name: &'static str) -> Self {
        Self { name, param: None }
    }

    pub fn with_param<P: Param>(name: &'static str, param: P) -> Self {
        Self {
            name,
            param: Some(Rc::new(param)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_family_member(&self) -> bool {
        self.param.is_some()
    }

    /// The family parameter, if this key has one of type `P`.
    pub fn param<P: 'static>(&self) -> Option<&P> {
        self.param.as_deref()?.as_any().downcast_ref::<P>()
    }
}

impl PartialEq for ProviderKey {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.param.as_deref(), other.param.as_deref()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_dyn(b),
            _ => false,
        }
    }
}

impl Eq for ProviderKey {}

impl Hash for ProviderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        if let Some(p) = self.param.as_deref() {
            p.hash_dyn(state);
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param.as_deref() {
            Some(p) => write!(f, "{}({:?})", self.name, p),
            None => f.write_str(self.name),
        }
    }
}

impl fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderKey({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_family_keys_compare_by_param() {
        let a = ProviderKey::with_param("unit_timers", "U1".to_string());
        let b = ProviderKey::with_param("unit_timers", "U1".to_string());
        let c = ProviderKey::with_param("unit_timers", "U2".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ProviderKey::new("unit_timers"));
    }

    #[test]
    fn test_param_types_do_not_collide() {
        let as_u32 = ProviderKey::with_param("album_by_id", 7u32);
        let as_u64 = ProviderKey::with_param("album_by_id", 7u64);
        assert_ne!(as_u32, as_u64);

        let mut set = HashSet::new();
        set.insert(as_u32.clone());
        set.insert(as_u64);
        set.insert(as_u32.clone());
        assert_eq!(set.len(), 2);
        assert_eq!(as_u32.param::<u32>(), Some(&7));
        assert_eq!(as_u32.param::<u64>(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProviderKey::new("all_albums").to_string(), "all_albums");
        assert_eq!(
            ProviderKey::with_param("album_by_id", 3u32).to_string(),
            "album_by_id(3)"
        );
    }
}
