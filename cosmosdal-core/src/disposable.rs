//! Scoped acquisition of clients and managers.

use std::{
    fmt,
    ops::{Deref, DerefMut},
};
use tracing::trace;

/// Owns a value for a scope and releases it when the scope ends.
///
/// The value is dropped on every exit path, including early returns through `?`. Releasing does
/// not contact the store.
///
/// ```ignore
/// let manager = Disposable::new(DatabaseManager::new(&client));
/// manager.create("my_db").await?;
/// // `manager` is released here.
/// ```
pub struct Disposable<T> {
    inner: Option<T>,
}

impl<T> Disposable<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    /// Releases ownership of the wrapped value without disposing of it.
    pub fn into_inner(mut self) -> T {
        match self.inner.take() {
            Some(inner) => inner,
            None => unreachable!("a disposable holds its value until dropped"),
        }
    }

    /// Runs `f` with the wrapped value and disposes of it afterwards.
    pub fn scope<F, R>(self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut this = self;
        f(&mut this)
    }
}

impl<T> Deref for Disposable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            Some(inner) => inner,
            None => unreachable!("a disposable holds its value until dropped"),
        }
    }
}

impl<T> DerefMut for Disposable<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Some(inner) => inner,
            None => unreachable!("a disposable holds its value until dropped"),
        }
    }
}

impl<T> Drop for Disposable<T> {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            trace!(target: "cosmosdal::disposable", kind = std::any::type_name::<T>(), "released");
        }
    }
}

impl<T> From<T> for Disposable<T> {
    fn from(inner: T) -> Self {
        Self::new(inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Disposable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Disposable").field(&self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    struct Tracked(Rc<Cell<u32>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn fails_early(resource: Disposable<Tracked>) -> Result<(), &'static str> {
        let _resource = resource;
        Err::<(), _>("boom")?;
        Ok(())
    }

    #[test]
    fn test_released_on_every_exit_path() {
        let drops = Rc::new(Cell::new(0));

        {
            let _resource = Disposable::new(Tracked(drops.clone()));
        }
        assert_eq!(drops.get(), 1);

        assert!(fails_early(Disposable::new(Tracked(drops.clone()))).is_err());
        assert_eq!(drops.get(), 2);

        let seen = Disposable::new(Tracked(drops.clone())).scope(|t| Rc::strong_count(&t.0));
        assert_eq!(seen, 2);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn test_into_inner_hands_back_ownership() {
        let drops = Rc::new(Cell::new(0));

        let tracked = Disposable::new(Tracked(drops.clone())).into_inner();
        assert_eq!(drops.get(), 0);

        drop(tracked);
        assert_eq!(drops.get(), 1);
    }
}
