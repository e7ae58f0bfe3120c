//! Dependency graph over the registered modules.
//!
//! Resolution checks that every declared dependency is registered and orders
//! the modules so each one comes after its dependencies. Construction then
//! runs the constructors in that order and the invokes in slot order.

use std::collections::{BTreeSet, HashMap};

use crate::key::{InvokeKey, ModuleKey};
use crate::lifecycle::Lifecycle;
use crate::provider::{Invoke, Provider, Scope, Value};
use crate::settings::Settings;
use peerlink_types::prelude::*;

pub struct Graph {
	modules: HashMap<ModuleKey, Provider>,
	invokes: Vec<(InvokeKey, Invoke)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
	Visiting,
	Done,
}

impl Graph {
	pub fn new(settings: Settings) -> Self {
		let invokes = InvokeKey::ALL
			.into_iter()
			.zip(settings.invokes)
			.filter_map(|(slot, invoke)| invoke.map(|invoke| (slot, invoke)))
			.collect();
		Self { modules: settings.modules, invokes }
	}

	/// Construction order of the registered modules
	pub fn resolve(&self) -> PlResult<Vec<ModuleKey>> {
		for (key, provider) in &self.modules {
			self.check_registered(provider.deps(), key.to_string())?;
		}
		for (slot, invoke) in &self.invokes {
			self.check_registered(invoke.deps(), slot.to_string())?;
		}

		// sorted roots keep the order stable between runs
		let roots: BTreeSet<&ModuleKey> = self.modules.keys().collect();
		let mut marks = HashMap::with_capacity(self.modules.len());
		let mut path = Vec::new();
		let mut order = Vec::with_capacity(self.modules.len());
		for key in roots {
			self.visit(key, &mut marks, &mut path, &mut order)?;
		}
		Ok(order)
	}

	fn check_registered(&self, deps: &[ModuleKey], owner: String) -> PlResult<()> {
		match deps.iter().find(|dep| !self.modules.contains_key(dep)) {
			Some(missing) => {
				Err(Error::UnresolvedDependency { key: missing.to_string(), required_by: owner })
			}
			None => Ok(()),
		}
	}

	fn visit(
		&self,
		key: &ModuleKey,
		marks: &mut HashMap<ModuleKey, Mark>,
		path: &mut Vec<ModuleKey>,
		order: &mut Vec<ModuleKey>,
	) -> PlResult<()> {
		match marks.get(key) {
			Some(Mark::Done) => return Ok(()),
			Some(Mark::Visiting) => {
				let start = path.iter().position(|k| k == key).unwrap_or(0);
				let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
				cycle.push(key.to_string());
				return Err(Error::DependencyCycle(cycle));
			}
			None => {}
		}

		marks.insert(key.clone(), Mark::Visiting);
		path.push(key.clone());
		if let Some(provider) = self.modules.get(key) {
			for dep in provider.deps() {
				self.visit(dep, marks, path, order)?;
			}
		}
		path.pop();
		marks.insert(key.clone(), Mark::Done);
		order.push(key.clone());
		Ok(())
	}

	/// Construct every module in `order`, then run the invokes. Start and stop
	/// hooks registered along the way land in `lifecycle`.
	pub fn build(
		mut self,
		order: &[ModuleKey],
		lifecycle: &mut Lifecycle,
	) -> PlResult<HashMap<ModuleKey, Value>> {
		let mut values = HashMap::with_capacity(order.len());

		for key in order {
			let Some(provider) = self.modules.remove(key) else {
				return Err(Error::Internal(format!("module {} vanished from the graph", key)));
			};
			let mut scope = Scope::new(key.to_string(), &provider.deps, &values, lifecycle);
			let value = (provider.ctor)(&mut scope).inspect_err(|err| {
				warn!(module = %key, %err, "constructor failed");
			})?;
			values.insert(key.clone(), value);
		}

		for (slot, invoke) in self.invokes {
			debug!(invoke = %slot, "running invoke");
			let mut scope = Scope::new(slot.to_string(), &invoke.deps, &values, lifecycle);
			(invoke.run)(&mut scope).inspect_err(|err| {
				warn!(invoke = %slot, %err, "invoke failed");
			})?;
		}

		Ok(values)
	}
}


// vim: ts=4
