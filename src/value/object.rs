use std::{
    any::Any,
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Opaque reference to a managed object owned by the embedding runtime.
///
/// The threading layer never looks inside; it only stores, clones and compares
/// these by identity. Two references are equal when they point at the same
/// allocation.
#[derive(Clone)]
#[repr(transparent)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).downcast_ref()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectRef({:p})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = ObjectRef::new(7_u32);
        let b = ObjectRef::new(7_u32);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_downcast() {
        let obj = ObjectRef::new(String::from("worker"));
        assert_eq!(obj.downcast_ref::<String>().map(String::as_str), Some("worker"));
        assert!(obj.downcast_ref::<u32>().is_none());
    }
}
