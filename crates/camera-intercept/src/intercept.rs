//! Generic method interception.
//!
//! A binding wraps one (class, method) target with optional pre- and
//! post-call hooks. The pre hook may replace arguments or pre-supply a
//! result/error, in which case the real method never runs; the post hook
//! may replace the result or raise an error. Installation is idempotent
//! per target. Dispatch never holds the registry lock across hook or real
//! code, so hooks are free to block.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult<R> = std::result::Result<R, HookError>;

/// Identifies an interception target.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MethodKey {
    pub class: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

/// One in-flight call through a wrapper. Hooks mutate `args` and may
/// settle the outcome early.
pub struct Call<A, R> {
    pub args: A,
    outcome: Option<HookResult<R>>,
}

impl<A, R> Call<A, R> {
    fn new(args: A) -> Self {
        Self {
            args,
            outcome: None,
        }
    }

    /// Settle the call with a result. From a pre hook this skips the real
    /// method; from a post hook this replaces whatever the real method
    /// returned.
    pub fn supply(&mut self, result: R) {
        self.outcome = Some(Ok(result));
    }

    /// Settle the call with an error.
    pub fn raise<E: Into<HookError>>(&mut self, err: E) {
        self.outcome = Some(Err(err.into()));
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&HookResult<R>> {
        self.outcome.as_ref()
    }
}

type HookFn<A, R> = Arc<dyn Fn(&mut Call<A, R>) + Send + Sync>;

/// The real implementation a wrapper guards. Borrows the (possibly
/// hook-replaced) arguments.
pub type RealFn<A, R> = Arc<dyn Fn(&A) -> HookResult<R> + Send + Sync>;

pub struct Hooks<A, R> {
    pre: Option<HookFn<A, R>>,
    post: Option<HookFn<A, R>>,
}

impl<A, R> Default for Hooks<A, R> {
    fn default() -> Self {
        Self {
            pre: None,
            post: None,
        }
    }
}

impl<A, R> Clone for Hooks<A, R> {
    fn clone(&self) -> Self {
        Self {
            pre: self.pre.clone(),
            post: self.post.clone(),
        }
    }
}

impl<A, R> Hooks<A, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre(mut self, hook: impl Fn(&mut Call<A, R>) + Send + Sync + 'static) -> Self {
        self.pre = Some(Arc::new(hook));
        self
    }

    pub fn post(mut self, hook: impl Fn(&mut Call<A, R>) + Send + Sync + 'static) -> Self {
        self.post = Some(Arc::new(hook));
        self
    }
}

/// An installed binding: the real method plus its hooks.
pub struct Wrapped<A, R> {
    key: MethodKey,
    real: RealFn<A, R>,
    hooks: Hooks<A, R>,
}

impl<A, R> Wrapped<A, R> {
    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    /// The wrapper dispatch path: pre hook, real method unless an outcome
    /// was pre-supplied, post hook.
    pub fn invoke(&self, args: A) -> HookResult<R> {
        let mut call = Call::new(args);
        if let Some(pre) = &self.hooks.pre {
            pre(&mut call);
        }
        if !call.has_outcome() {
            let out = (self.real)(&call.args);
            call.outcome = Some(out);
        }
        if let Some(post) = &self.hooks.post {
            post(&mut call);
        }
        match call.outcome {
            Some(out) => out,
            None => Err(format!("{} settled without an outcome", self.key).into()),
        }
    }

    /// Re-entrant path: hook code calling back into the wrapped method
    /// goes straight to the real implementation, never the wrapper.
    pub fn call_real(&self, args: &A) -> HookResult<R> {
        (self.real)(args)
    }
}

/// Installed bindings keyed by target. The lock only guards the map;
/// wrappers are handed out as `Arc`s and dispatched lock-free.
#[derive(Default)]
pub struct InterceptRegistry {
    bindings: Mutex<HashMap<MethodKey, Arc<dyn Any + Send + Sync>>>,
}

impl InterceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MethodKey, Arc<dyn Any + Send + Sync>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a wrapper for `key`. Idempotent: a second install for the
    /// same target returns the wrapper already in place and changes
    /// nothing.
    pub fn bind<A, R>(
        &self,
        key: MethodKey,
        real: RealFn<A, R>,
        hooks: Hooks<A, R>,
    ) -> Arc<Wrapped<A, R>>
    where
        A: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let mut bindings = self.lock();
        if let Some(existing) = bindings.get(&key) {
            if let Ok(wrapped) = Arc::clone(existing).downcast::<Wrapped<A, R>>() {
                debug!(%key, "binding already installed");
                return wrapped;
            }
            warn!(%key, "existing binding has a different signature; replacing");
        }
        let wrapped = Arc::new(Wrapped {
            key: key.clone(),
            real,
            hooks,
        });
        bindings.insert(key, wrapped.clone());
        wrapped
    }

    pub fn lookup<A, R>(&self, key: &MethodKey) -> Option<Arc<Wrapped<A, R>>>
    where
        A: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let bindings = self.lock();
        let entry = bindings.get(key)?;
        Arc::clone(entry).downcast::<Wrapped<A, R>>().ok()
    }

    pub fn is_bound(&self, key: &MethodKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn unbind(&self, key: &MethodKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn unbind_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    fn upper_real(calls: Arc<AtomicUsize>) -> RealFn<String, String> {
        Arc::new(move |args: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(args.to_uppercase())
        })
    }

    #[test]
    fn plain_binding_invokes_real_method() {
        let registry = InterceptRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let wrapped = registry.bind(
            MethodKey::new("Camera", "open"),
            upper_real(calls.clone()),
            Hooks::new(),
        );
        assert_eq!(wrapped.invoke("back".to_string()).unwrap(), "BACK");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pre_hook_replaces_arguments() {
        let registry = InterceptRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let wrapped = registry.bind(
            MethodKey::new("Camera", "open"),
            upper_real(calls.clone()),
            Hooks::new().pre(|call: &mut Call<String, String>| {
                call.args = "front".to_string();
            }),
        );
        assert_eq!(wrapped.invoke("back".to_string()).unwrap(), "FRONT");
    }

    #[test]
    fn pre_supplied_result_skips_real_method_but_not_post() {
        let registry = InterceptRegistry::new();
        let real_calls = Arc::new(AtomicUsize::new(0));
        let post_calls = Arc::new(AtomicUsize::new(0));
        let post_seen = post_calls.clone();
        let wrapped = registry.bind(
            MethodKey::new("Camera", "open"),
            upper_real(real_calls.clone()),
            Hooks::new()
                .pre(|call: &mut Call<String, String>| call.supply("supplied".to_string()))
                .post(move |_call| {
                    post_seen.fetch_add(1, Ordering::SeqCst);
                }),
        );
        assert_eq!(wrapped.invoke("x".to_string()).unwrap(), "supplied");
        assert_eq!(real_calls.load(Ordering::SeqCst), 0);
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn post_hook_can_replace_result_or_raise() {
        let registry = InterceptRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let wrapped = registry.bind(
            MethodKey::new("Camera", "open"),
            upper_real(calls.clone()),
            Hooks::new().post(|call: &mut Call<String, String>| {
                if matches!(call.outcome(), Some(Ok(r)) if r.as_str() == "BOOM") {
                    call.raise("rejected");
                } else {
                    call.supply("rewritten".to_string());
                }
            }),
        );
        assert_eq!(wrapped.invoke("ok".to_string()).unwrap(), "rewritten");
        assert!(wrapped.invoke("boom".to_string()).is_err());
    }

    #[test]
    fn double_install_keeps_exactly_one_wrapper() {
        let registry = InterceptRegistry::new();
        let pre_calls = Arc::new(AtomicUsize::new(0));
        let post_calls = Arc::new(AtomicUsize::new(0));
        let key = MethodKey::new("Camera", "set_preview_sink");

        let pre_seen = pre_calls.clone();
        let post_seen = post_calls.clone();
        let first = registry.bind(
            key.clone(),
            upper_real(Arc::new(AtomicUsize::new(0))),
            Hooks::new()
                .pre(move |_call: &mut Call<String, String>| {
                    pre_seen.fetch_add(1, Ordering::SeqCst);
                })
                .post(move |_call| {
                    post_seen.fetch_add(1, Ordering::SeqCst);
                }),
        );

        // Second install for the same target is a no-op returning the
        // wrapper already in place.
        let second = registry.bind(
            key.clone(),
            upper_real(Arc::new(AtomicUsize::new(0))),
            Hooks::<String, String>::new()
                .pre(|_call| panic!("second install's hooks must never run")),
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        second.invoke("frame".to_string()).unwrap();
        assert_eq!(pre_calls.load(Ordering::SeqCst), 1);
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_hook_calls_real_method_directly() {
        static WRAPPED: OnceLock<Arc<Wrapped<String, String>>> = OnceLock::new();
        let registry = InterceptRegistry::new();
        let pre_calls = Arc::new(AtomicUsize::new(0));
        let pre_seen = pre_calls.clone();
        let wrapped = registry.bind(
            MethodKey::new("Camera", "open"),
            Arc::new(|args: &String| Ok(args.clone())),
            Hooks::new().pre(move |call: &mut Call<String, String>| {
                pre_seen.fetch_add(1, Ordering::SeqCst);
                // Re-entering from hook code must hit the real method,
                // not recurse into the wrapper.
                if let Some(wrapped) = WRAPPED.get() {
                    let nested = wrapped.call_real(&"nested".to_string());
                    assert_eq!(nested.unwrap(), "nested");
                }
                let _ = call;
            }),
        );
        WRAPPED.set(wrapped.clone()).ok();

        assert_eq!(wrapped.invoke("outer".to_string()).unwrap(), "outer");
        // One wrapper traversal only.
        assert_eq!(pre_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unbind_all_clears_bindings() {
        let registry = InterceptRegistry::new();
        registry.bind(
            MethodKey::new("A", "m"),
            upper_real(Arc::new(AtomicUsize::new(0))),
            Hooks::new(),
        );
        registry.bind(
            MethodKey::new("B", "m"),
            upper_real(Arc::new(AtomicUsize::new(0))),
            Hooks::new(),
        );
        assert_eq!(registry.len(), 2);
        registry.unbind_all();
        assert!(registry.is_empty());
        assert!(!registry.is_bound(&MethodKey::new("A", "m")));
    }
}
