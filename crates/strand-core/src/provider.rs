use std::fmt::{self, Debug};
use std::future::Future;
use std::hash::Hash;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::{ProviderKey, Ref};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Synchronous, memoized computation.
    Computed,
    /// Asynchronous computation with Loading/Data/Error state.
    Future,
    /// Mutable cell seeded by an initializer.
    State,
}

/// Anything the container can address by key.
pub trait ProviderRef {
    fn key(&self) -> &ProviderKey;
    fn kind(&self) -> ProviderKind;
}

pub(crate) type ComputeFn<T> = Rc<dyn Fn(&Ref) -> T>;
pub(crate) type FutureFn<T> = Rc<dyn Fn(Ref) -> LocalBoxFuture<'static, anyhow::Result<T>>>;

/// Synchronous provider. The value is memoized until a watched dependency changes.
pub struct Provider<T> {
    key: ProviderKey,
    pub(crate) compute: ComputeFn<T>,
}

impl<T: 'static> Provider<T> {
    pub fn new(name: &'static str, compute: impl Fn(&Ref) -> T + 'static) -> Self {
        Self {
            key: ProviderKey::new(name),
            compute: Rc::new(compute),
        }
    }
}

/// Mutable state cell. `init` runs on first read and again after invalidation.
pub struct StateProvider<T> {
    key: ProviderKey,
    pub(crate) init: ComputeFn<T>,
}

impl<T: 'static> StateProvider<T> {
    pub fn new(name: &'static str, init: impl Fn(&Ref) -> T + 'static) -> Self {
        Self {
            key: ProviderKey::new(name),
            init: Rc::new(init),
        }
    }
}

/// Asynchronous provider. Concurrent readers share one in-flight computation.
pub struct FutureProvider<T> {
    key: ProviderKey,
    pub(crate) compute: FutureFn<T>,
}

impl<T: 'static> FutureProvider<T> {
    pub fn new<F, Fut>(name: &'static str, compute: F) -> Self
    where
        F: Fn(Ref) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
    {
        Self {
            key: ProviderKey::new(name),
            compute: Rc::new(move |r: Ref| -> LocalBoxFuture<'static, anyhow::Result<T>> {
                compute(r).boxed_local()
            }),
        }
    }
}

/// One synchronous provider per parameter value.
pub struct ProviderFamily<P, T> {
    name: &'static str,
    compute: Rc<dyn Fn(&Ref, &P) -> T>,
}

impl<P, T> ProviderFamily<P, T>
where
    P: Clone + Eq + Hash + Debug + 'static,
    T: 'static,
{
    pub fn new(name: &'static str, compute: impl Fn(&Ref, &P) -> T + 'static) -> Self {
        Self {
            name,
            compute: Rc::new(compute),
        }
    }

    pub fn of(&self, param: P) -> Provider<T> {
        let compute = self.compute.clone();
        Provider {
            key: ProviderKey::with_param(self.name, param.clone()),
            compute: Rc::new(move |r: &Ref| compute(r, &param)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One asynchronous provider per parameter value.
pub struct FutureProviderFamily<P, T> {
    name: &'static str,
    compute: Rc<dyn Fn(Ref, P) -> LocalBoxFuture<'static, anyhow::Result<T>>>,
}

impl<P, T> FutureProviderFamily<P, T>
where
    P: Clone + Eq + Hash + Debug + 'static,
    T: 'static,
{
    pub fn new<F, Fut>(name: &'static str, compute: F) -> Self
    where
        F: Fn(Ref, P) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
    {
        Self {
            name,
            compute: Rc::new(
                move |r: Ref, p: P| -> LocalBoxFuture<'static, anyhow::Result<T>> {
                    compute(r, p).boxed_local()
                },
            ),
        }
    }

    pub fn of(&self, param: P) -> FutureProvider<T> {
        let compute = self.compute.clone();
        FutureProvider {
            key: ProviderKey::with_param(self.name, param.clone()),
            compute: Rc::new(move |r: Ref| compute(r, param.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

macro_rules! impl_provider_ref {
    ($ty:ident, $field:ident, $kind:expr) => {
        impl<T> ProviderRef for $ty<T> {
            fn key(&self) -> &ProviderKey {
                &self.key
            }
            fn kind(&self) -> ProviderKind {
                $kind
            }
        }

        impl<T> Clone for $ty<T> {
            fn clone(&self) -> Self {
                Self {
                    key: self.key.clone(),
                    $field: self.$field.clone(),
                }
            }
        }

        impl<T> Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self.key)
            }
        }
    };
}

impl_provider_ref!(Provider, compute, ProviderKind::Computed);
impl_provider_ref!(StateProvider, init, ProviderKind::State);
impl_provider_ref!(FutureProvider, compute, ProviderKind::Future);

impl<P, T> Clone for ProviderFamily<P, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            compute: self.compute.clone(),
        }
    }
}

impl<P, T> Clone for FutureProviderFamily<P, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            compute: self.compute.clone(),
        }
    }
}

/// What an invalidation or disposal applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidationTarget {
    /// One provider, or one member of a family.
    Provider(ProviderKey),
    /// Every live member of the named family.
    Family(&'static str),
}

impl<T> From<&Provider<T>> for InvalidationTarget {
    fn from(p: &Provider<T>) -> Self {
        Self::Provider(p.key.clone())
    }
}

impl<T> From<&StateProvider<T>> for InvalidationTarget {
    fn from(p: &StateProvider<T>) -> Self {
        Self::Provider(p.key.clone())
    }
}

impl<T> From<&FutureProvider<T>> for InvalidationTarget {
    fn from(p: &FutureProvider<T>) -> Self {
        Self::Provider(p.key.clone())
    }
}

impl<P, T> From<&ProviderFamily<P, T>> for InvalidationTarget {
    fn from(f: &ProviderFamily<P, T>) -> Self {
        Self::Family(f.name)
    }
}

impl<P, T> From<&FutureProviderFamily<P, T>> for InvalidationTarget {
    fn from(f: &FutureProviderFamily<P, T>) -> Self {
        Self::Family(f.name)
    }
}
