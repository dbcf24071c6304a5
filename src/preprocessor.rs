//! The tagged-template literal preprocessor (§4.8), explicitly out of deep
//! scope: splices values marked "literal" into the adjacent template
//! strings ahead of compilation, so a `dynamic*` template call can still
//! reuse the ordinary (non-dynamic) template cache and compiler path.
//!
//! Grounded on `dyn-cache`'s identity-keyed `Cache` for "compute once per
//! distinct key, reuse thereafter" -- here the key is the originating
//! strings array's identity plus the positions/contents of its literal
//! values, since two calls at the same call site can still splice different
//! literals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One interpolated value in a `dynamic*` template call: either spliced
/// directly into the surrounding markup text, or left as an ordinary bind
/// handed to the compiled template.
pub enum DynamicValue {
    Literal(String),
    Bound(crate::value::Value),
}

/// The result of expansion: a new strings array (owned, since splicing can
/// change string boundaries) and the binds that remain for the template.
pub struct Expanded {
    pub strings: Vec<String>,
    pub binds: Vec<crate::value::Value>,
}

fn expand(strings: &[&'static str], values: Vec<DynamicValue>) -> Expanded {
    let mut out_strings = vec![strings[0].to_string()];
    let mut binds = Vec::new();
    for (value, next_str) in values.into_iter().zip(strings[1..].iter()) {
        match value {
            DynamicValue::Literal(text) => {
                let last = out_strings.last_mut().unwrap();
                last.push_str(&text);
                last.push_str(next_str);
            }
            DynamicValue::Bound(v) => {
                binds.push(v);
                out_strings.push(next_str.to_string());
            }
        }
    }
    Expanded { strings: out_strings, binds }
}

#[derive(Eq, PartialEq, Hash, Clone)]
struct ExpansionKey {
    strings_ptr: usize,
    literal_positions: Vec<(usize, String)>,
}

fn key_for(strings: &'static [&'static str], values: &[DynamicValue]) -> ExpansionKey {
    let literal_positions = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match v {
            DynamicValue::Literal(text) => Some((i, text.clone())),
            DynamicValue::Bound(_) => None,
        })
        .collect();
    ExpansionKey { strings_ptr: strings.as_ptr() as usize, literal_positions }
}

/// Caches expansion results per `(strings identity, literal positions and
/// contents)`, so repeated calls at the same call site with the same
/// literal splice reuse the same expanded strings array (and therefore the
/// same compiled template, once handed to [`crate::template::TemplateCache`]).
#[derive(Default)]
pub struct PreprocessorCache {
    entries: RefCell<HashMap<ExpansionKey, Rc<Vec<String>>>>,
}

impl PreprocessorCache {
    pub fn new() -> Self {
        PreprocessorCache { entries: RefCell::new(HashMap::new()) }
    }

    /// Expand `values` against `strings`, returning the cached strings array
    /// (if an identical splice was seen before at this call site) alongside
    /// the non-literal binds, which are never cached since they carry live
    /// values.
    pub fn expand(&self, strings: &'static [&'static str], values: Vec<DynamicValue>) -> (Rc<Vec<String>>, Vec<crate::value::Value>) {
        let key = key_for(strings, &values);
        if let Some(cached) = self.entries.borrow().get(&key) {
            let binds = values
                .into_iter()
                .filter_map(|v| match v {
                    DynamicValue::Bound(b) => Some(b),
                    DynamicValue::Literal(_) => None,
                })
                .collect();
            return (cached.clone(), binds);
        }
        let Expanded { strings: expanded, binds } = expand(strings, values);
        let expanded = Rc::new(expanded);
        self.entries.borrow_mut().insert(key, expanded.clone());
        (expanded, binds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn splices_literal_values_into_adjacent_strings() {
        static STRINGS: &[&str] = &["<div class=\"", "\">", "</div>"];
        let cache = PreprocessorCache::new();
        let (expanded, binds) = cache.expand(
            STRINGS,
            vec![DynamicValue::Literal("card".into()), DynamicValue::Bound(Value::str("hi"))],
        );
        assert_eq!(expanded.as_slice(), ["<div class=\"card\">", "</div>"]);
        assert_eq!(binds.len(), 1);
    }
}
