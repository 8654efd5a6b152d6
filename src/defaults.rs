//! Defaults resolver — expands `defaults` references before graph
//! construction.
//!
//! `defaults` is a macro-expansion mechanism, not a dependency relation:
//! the referenced modules' properties are merged into the declaring
//! module and the `defaults` property itself is discarded, so it never
//! becomes a graph edge.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{BGraphError, BuildDiagnostic, Result};
use crate::parser::ModuleDeclaration;
use crate::value::{Properties, PropertyValue};

const DEFAULTS_KEY: &str = "defaults";

/// Resolve every `defaults` chain across the tree to a fixed point.
///
/// Fails only on a cyclic chain. A reference to a module that does not
/// exist is skipped and reported as a diagnostic.
pub fn resolve_defaults(
    modules: Vec<ModuleDeclaration>,
) -> Result<(Vec<ModuleDeclaration>, Vec<BuildDiagnostic>)> {
    let mut names: HashMap<String, usize> = HashMap::new();
    for (idx, module) in modules.iter().enumerate() {
        if let Some(name) = module.name() {
            // First declaration wins here; duplicates are rejected
            // fatally by the graph builder.
            names.entry(name.to_string()).or_insert(idx);
        }
    }

    let mut resolver = Resolver {
        modules: &modules,
        names,
        state: vec![State::Unvisited; modules.len()],
        resolved: vec![None; modules.len()],
        stack: Vec::new(),
        diagnostics: Vec::new(),
    };

    for idx in 0..modules.len() {
        resolver.resolve(idx)?;
    }

    let Resolver {
        resolved,
        diagnostics,
        ..
    } = resolver;

    let merged = modules
        .into_iter()
        .zip(resolved)
        .map(|(mut module, properties)| {
            if let Some(properties) = properties {
                module.properties = properties;
            }
            module
        })
        .collect();

    Ok((merged, diagnostics))
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Unvisited,
    InProgress,
    Done,
}

struct Resolver<'a> {
    modules: &'a [ModuleDeclaration],
    names: HashMap<String, usize>,
    state: Vec<State>,
    resolved: Vec<Option<Properties>>,
    stack: Vec<String>,
    diagnostics: Vec<BuildDiagnostic>,
}

impl<'a> Resolver<'a> {
    /// Compute the fully merged property bag of one module, resolving
    /// its `defaults` chain first (memoized).
    fn resolve(&mut self, idx: usize) -> Result<Properties> {
        let module = &self.modules[idx];
        let name = module.name().unwrap_or("<unnamed>").to_string();

        match self.state[idx] {
            State::Done => {
                return Ok(self.resolved[idx]
                    .clone()
                    .unwrap_or_else(|| module.properties.clone()))
            }
            State::InProgress => {
                let mut cycle: Vec<String> = self
                    .stack
                    .iter()
                    .skip_while(|n| **n != name)
                    .cloned()
                    .collect();
                cycle.push(name);
                return Err(BGraphError::DefaultsCycle(cycle));
            }
            State::Unvisited => {}
        }

        self.state[idx] = State::InProgress;
        self.stack.push(name.clone());

        let mut properties = module.properties.clone();
        if let Some(defaults) = properties.remove(DEFAULTS_KEY) {
            // References merge in declaration order: a later reference
            // layers over an earlier one, and the declaring module's own
            // properties layer over them all.
            let mut base: Option<Properties> = None;
            for reference in defaults.string_items() {
                let Some(&default_idx) = self.names.get(reference) else {
                    debug!(module = %name, reference, "skipping unresolved defaults");
                    self.diagnostics.push(BuildDiagnostic::UnresolvedDefaults {
                        module: name.clone(),
                        reference: reference.to_string(),
                    });
                    continue;
                };
                let default_properties = self.resolve(default_idx)?;
                base = Some(match base {
                    Some(prior) => merge_properties(&prior, &default_properties),
                    None => default_properties,
                });
            }
            if let Some(base) = base {
                properties = merge_properties(&base, &properties);
            }
        }
        self.stack.pop();
        self.state[idx] = State::Done;
        self.resolved[idx] = Some(properties.clone());
        Ok(properties)
    }
}

/// Merge a declaring module's properties over a defaults bag.
///
/// Scalars prefer the declaring side; lists concatenate defaults-first;
/// blocks merge key-wise with the same rule, recursively.
fn merge_properties(default: &Properties, own: &Properties) -> Properties {
    let mut merged = default.clone();
    for (key, value) in own.iter() {
        merge_key(&mut merged, key, value);
    }
    merged
}

fn merge_key(into: &mut Properties, key: &str, value: &PropertyValue) {
    let Some(existing) = into.get(key) else {
        into.insert(key, value.clone());
        return;
    };
    match (existing, value) {
        (PropertyValue::List(base), PropertyValue::List(add)) => {
            let mut items = base.clone();
            items.extend(add.iter().cloned());
            into.insert(key, PropertyValue::List(items));
        }
        (PropertyValue::Block(base), PropertyValue::Block(add)) => {
            let mut inner = base.clone();
            for (k, v) in add.iter() {
                merge_key(&mut inner, k, v);
            }
            into.insert(key, PropertyValue::Block(inner));
        }
        _ => into.insert(key, value.clone()),
    }
}
