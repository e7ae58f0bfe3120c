//! Constructors and invokes registered in the node settings.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::key::ModuleKey;
use crate::lifecycle::{Hook, Lifecycle};
use peerlink_types::prelude::*;

/// A constructed module value
pub type Value = Arc<dyn Any + Send + Sync>;

type CtorFn = Box<dyn FnOnce(&mut Scope<'_>) -> PlResult<Value> + Send>;
type InvokeFn = Box<dyn FnOnce(&mut Scope<'_>) -> PlResult<()> + Send>;

/// Constructor of one module, with the keys it depends on
pub struct Provider {
	pub(crate) deps: Vec<ModuleKey>,
	pub(crate) ctor: CtorFn,
}

impl Provider {
	pub fn new<T, F>(deps: impl IntoIterator<Item = ModuleKey>, ctor: F) -> Self
	where
		T: Send + Sync + 'static,
		F: FnOnce(&mut Scope<'_>) -> PlResult<T> + Send + 'static,
	{
		Self {
			deps: deps.into_iter().collect(),
			ctor: Box::new(move |scope: &mut Scope<'_>| Ok(Arc::new(ctor(scope)?) as Value)),
		}
	}

	/// A module that is already constructed
	pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
		Self::new([], move |_| Ok(value))
	}

	pub fn deps(&self) -> &[ModuleKey] {
		&self.deps
	}
}

/// Work run in a numbered slot once every module is constructed
pub struct Invoke {
	pub(crate) deps: Vec<ModuleKey>,
	pub(crate) run: InvokeFn,
}

impl Invoke {
	pub fn new<F>(deps: impl IntoIterator<Item = ModuleKey>, run: F) -> Self
	where
		F: FnOnce(&mut Scope<'_>) -> PlResult<()> + Send + 'static,
	{
		Self { deps: deps.into_iter().collect(), run: Box::new(run) }
	}

	pub fn deps(&self) -> &[ModuleKey] {
		&self.deps
	}
}

/// What a constructor or invoke sees: its declared dependencies and the
/// lifecycle it may append hooks to
pub struct Scope<'a> {
	owner: String,
	deps: &'a [ModuleKey],
	values: &'a HashMap<ModuleKey, Value>,
	lifecycle: &'a mut Lifecycle,
}

impl<'a> Scope<'a> {
	pub(crate) fn new(
		owner: String,
		deps: &'a [ModuleKey],
		values: &'a HashMap<ModuleKey, Value>,
		lifecycle: &'a mut Lifecycle,
	) -> Self {
		Self { owner, deps, values, lifecycle }
	}

	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Value of a declared dependency
	pub fn get<T: Clone + 'static>(&self, key: &ModuleKey) -> PlResult<T> {
		if !self.deps.contains(key) {
			return Err(Error::UndeclaredDependency {
				key: key.to_string(),
				requested_by: self.owner.clone(),
			});
		}
		let value = self.values.get(key).ok_or_else(|| Error::UnresolvedDependency {
			key: key.to_string(),
			required_by: self.owner.clone(),
		})?;
		value.downcast_ref::<T>().cloned().ok_or_else(|| Error::TypeMismatch(key.to_string()))
	}

	pub fn append_hook(&mut self, hook: Hook) {
		self.lifecycle.append(hook);
	}
}

// vim: ts=4
