//! A scripted stand-in for the external UI-component framework.
//!
//! [`ViewProbe`] plays both sides of the seam: it acts as the component
//! "class" (base data merged under incoming data on construction, like any
//! component framework would) and as the application's handle to the live
//! instance (reads, writes that fire change observers, instrumentation
//! counters).

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use routesync::{DataMap, ObserveOptions, RouteHandler, View, ViewContext, ViewObserver};
use serde_json::Value;

/// Builds a `DataMap` from a `json!` object literal.
pub fn data(value: Value) -> DataMap {
	match value {
		Value::Object(map) => map,
		other => panic!("expected object, got {other}"),
	}
}

#[derive(Default)]
struct ProbeState {
	base: DataMap,
	values: DataMap,
	observers: Vec<(Vec<String>, ViewObserver)>,
	observed_keys: Vec<String>,
	last_init_data: Option<DataMap>,
	created: usize,
	torn_down: usize,
}

/// Shared handle to the scripted view framework.
#[derive(Clone, Default)]
pub struct ViewProbe {
	state: Arc<Mutex<ProbeState>>,
}

impl ViewProbe {
	/// A probe whose component carries the given default data.
	pub fn with_base(base: Value) -> Self {
		Self {
			state: Arc::new(Mutex::new(ProbeState {
				base: data(base),
				..ProbeState::default()
			})),
		}
	}

	fn lock(&self) -> MutexGuard<'_, ProbeState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// A view-route handler constructing instances of this component.
	pub fn handler(&self) -> RouteHandler {
		let probe = self.clone();
		RouteHandler::view(move |ctx: ViewContext| {
			{
				let mut state = probe.lock();
				let mut values = state.base.clone();
				for (key, value) in ctx.data.clone() {
					values.insert(key, value);
				}
				state.values = values;
				state.observers.clear();
				state.last_init_data = Some(ctx.data);
				state.created += 1;
			}
			Box::new(ProbeView {
				probe: probe.clone(),
			}) as Box<dyn View>
		})
	}

	/// Reads a live value (application side).
	pub fn get(&self, key: &str) -> Value {
		self.lock().values.get(key).cloned().unwrap_or(Value::Null)
	}

	/// Writes a live value (application side), firing observers of the key
	/// when the value actually changes.
	pub fn set(&self, key: &str, value: Value) {
		write_value(self, key, value);
	}

	/// How many times the component was constructed.
	pub fn created(&self) -> usize {
		self.lock().created
	}

	/// How many times an instance was torn down.
	pub fn torn_down(&self) -> usize {
		self.lock().torn_down
	}

	/// The space-joined key lists passed to `observe`, in order.
	pub fn observed_keys(&self) -> Vec<String> {
		self.lock().observed_keys.clone()
	}

	/// The merged data of the most recent construction.
	pub fn last_init_data(&self) -> Option<DataMap> {
		self.lock().last_init_data.clone()
	}
}

/// Updates a value and fires matching observers outside the probe lock,
/// the way a component framework delivers change notifications.
fn write_value(probe: &ViewProbe, key: &str, value: Value) {
	let to_fire: Vec<ViewObserver> = {
		let mut state = probe.lock();
		let changed = state.values.get(key) != Some(&value);
		state.values.insert(key.to_string(), value);

		if !changed {
			return;
		}

		state
			.observers
			.iter()
			.filter(|(keys, _)| keys.iter().any(|k| k == key))
			.map(|(_, observer)| Arc::clone(observer))
			.collect()
	};

	for observer in to_fire {
		observer();
	}
}

struct ProbeView {
	probe: ViewProbe,
}

impl View for ProbeView {
	fn get(&self, key: &str) -> Value {
		self.probe.get(key)
	}

	fn set(&mut self, key: &str, value: Value) {
		write_value(&self.probe, key, value);
	}

	fn observe(&mut self, keys: &str, observer: ViewObserver, options: ObserveOptions) {
		{
			let mut state = self.probe.lock();
			state.observed_keys.push(keys.to_string());
			state
				.observers
				.push((keys.split(' ').map(str::to_string).collect(), Arc::clone(&observer)));
		}
		if options.init {
			observer();
		}
	}

	fn teardown(&mut self) {
		self.probe.lock().torn_down += 1;
	}
}
