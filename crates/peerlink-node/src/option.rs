//! Node options: deferred mutations of [`Settings`].
//!
//! Options compose left to right. Registering the same key twice keeps the
//! last registration, `unset` removes whatever was registered before it, and
//! conditional options are evaluated against the settings as they stand when
//! the option is reached.

use crate::key::{InvokeKey, ModuleKey, Target};
use crate::provider::{Invoke, Provider};
use crate::settings::Settings;
use peerlink_types::prelude::*;
use peerlink_types::types::NodeType;

type ApplyFn = Box<dyn FnOnce(&mut Settings) -> PlResult<()> + Send>;

pub struct NodeOption(ApplyFn);

impl NodeOption {
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce(&mut Settings) -> PlResult<()> + Send + 'static,
	{
		Self(Box::new(f))
	}

	pub fn apply(self, settings: &mut Settings) -> PlResult<()> {
		(self.0)(settings)
	}
}

/// Apply options in order, stopping at the first failure
pub fn options(opts: impl IntoIterator<Item = NodeOption>) -> NodeOption {
	let opts: Vec<NodeOption> = opts.into_iter().collect();
	NodeOption::new(move |settings| {
		for opt in opts {
			opt.apply(settings)?;
		}
		Ok(())
	})
}

/// Option that always fails with `err`
pub fn error(err: Error) -> NodeOption {
	NodeOption::new(move |_| Err(err))
}

/// Include `opts` only if `cond` holds. The condition is fixed when the option
/// is created.
pub fn when(cond: bool, opts: impl IntoIterator<Item = NodeOption>) -> NodeOption {
	if cond { options(opts) } else { options([]) }
}

/// Include `opts` only if `pred` holds for the settings at the point this
/// option is applied
pub fn apply_if<P>(pred: P, opts: impl IntoIterator<Item = NodeOption>) -> NodeOption
where
	P: FnOnce(&Settings) -> bool + Send + 'static,
{
	let opts = options(opts);
	NodeOption::new(move |settings| if pred(settings) { opts.apply(settings) } else { Ok(()) })
}

/// Register (or replace) the constructor for `key`
pub fn override_module(key: ModuleKey, provider: Provider) -> NodeOption {
	NodeOption::new(move |settings| {
		if settings.modules.insert(key.clone(), provider).is_some() {
			debug!(%key, "module replaced");
		}
		Ok(())
	})
}

/// Fill (or replace) an invoke slot
pub fn override_invoke(slot: InvokeKey, invoke: Invoke) -> NodeOption {
	NodeOption::new(move |settings| {
		settings.invokes[slot.index()] = Some(invoke);
		Ok(())
	})
}

/// Remove a module or clear an invoke slot. Unsetting something that was
/// never registered is not an error.
pub fn unset(target: impl Into<Target>) -> NodeOption {
	let target = target.into();
	NodeOption::new(move |settings| {
		match target {
			Target::Module(key) => {
				settings.modules.remove(&key);
			}
			Target::Invoke(slot) => settings.invokes[slot.index()] = None,
		}
		Ok(())
	})
}

/// Predicate for [`apply_if`]: the node being built is of type `node_type`
pub fn is_type(node_type: NodeType) -> impl FnOnce(&Settings) -> bool + Send + 'static {
	move |settings| settings.node_type == node_type
}


// vim: ts=4
