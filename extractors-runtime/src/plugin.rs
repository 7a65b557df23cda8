//! In-process extractor plugins.
//!
//! A [`Module`] is a named tree of callables. Binding a call expression to a
//! callable happens once, up front: the symbol path must start with the
//! module's own dotted name, and every remaining segment must name a
//! submodule except the last, which must name a function.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use extractors_runtime::plugin::{InvokeResult, Module, PluginTable};
//! use serde_json::json;
//!
//! fn run(args: &[String], _kwargs: &BTreeMap<String, String>) -> InvokeResult {
//!     Ok(json!({ "path": args[0] }))
//! }
//!
//! let table = PluginTable::new().with(Module::new("demo").function("run", run));
//! let module = table.module("demo").unwrap();
//! let f = module.bind("demo", &["demo".into(), "run".into()]).unwrap();
//! assert_eq!(f.invoke(&["a.txt".into()], &BTreeMap::new()).unwrap(), json!({"path": "a.txt"}));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub type InvokeResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// The single capability an in-process extractor exposes.
pub trait Extractor: Send + Sync {
    fn invoke(&self, args: &[String], kwargs: &BTreeMap<String, String>) -> InvokeResult;
}

impl<F> Extractor for F
where
    F: Fn(&[String], &BTreeMap<String, String>) -> InvokeResult + Send + Sync,
{
    fn invoke(&self, args: &[String], kwargs: &BTreeMap<String, String>) -> InvokeResult {
        self(args, kwargs)
    }
}

#[derive(Clone)]
pub enum Member {
    Function(Arc<dyn Extractor>),
    Module(Module),
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Function(_) => f.write_str("Function"),
            Member::Module(m) => f.debug_tuple("Module").field(&m.name).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The symbol path does not start with the module name.
    Mismatch,
    /// A segment is absent, or the final one is not callable.
    Unresolved,
}

#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    members: BTreeMap<String, Member>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(mut self, name: impl Into<String>, f: impl Extractor + 'static) -> Self {
        self.members.insert(name.into(), Member::Function(Arc::new(f)));
        self
    }

    pub fn submodule(mut self, module: Module) -> Self {
        self.members.insert(module.name.clone(), Member::Module(module));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Bind `path` to a callable. `dotted` is the name this module was
    /// imported under (e.g. `pkg.sub` for a submodule of `pkg`).
    pub fn bind(&self, dotted: &str, path: &[String]) -> Result<Arc<dyn Extractor>, BindError> {
        let prefix: Vec<&str> = dotted.split('.').collect();
        let matches = path.len() >= prefix.len()
            && prefix.iter().zip(path).all(|(p, segment)| *p == segment.as_str());
        if !matches {
            return Err(BindError::Mismatch);
        }

        let rest = &path[prefix.len()..];
        let Some((last, parents)) = rest.split_last() else {
            return Err(BindError::Unresolved);
        };
        let mut current = self;
        for segment in parents {
            match current.members.get(segment) {
                Some(Member::Module(m)) => current = m,
                _ => return Err(BindError::Unresolved),
            }
        }
        match current.members.get(last) {
            Some(Member::Function(f)) => Ok(Arc::clone(f)),
            _ => Err(BindError::Unresolved),
        }
    }
}

/// Modules available without spawning an interpreter.
#[derive(Debug, Clone, Default)]
pub struct PluginTable {
    modules: BTreeMap<String, Module>,
}

impl PluginTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn with(mut self, module: Module) -> Self {
        self.register(module);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up a module by dotted import name, walking submodules.
    pub fn module(&self, dotted: &str) -> Option<&Module> {
        let mut segments = dotted.split('.');
        let mut current = self.modules.get(segments.next()?)?;
        for segment in segments {
            match current.members.get(segment) {
                Some(Member::Module(m)) => current = m,
                _ => return None,
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(str::to_string).collect()
    }

    fn constant(v: Value) -> impl Extractor {
        move |_: &[String], _: &BTreeMap<String, String>| -> InvokeResult { Ok(v.clone()) }
    }

    fn table() -> PluginTable {
        PluginTable::new().with(
            Module::new("pkg")
                .function("top", constant(json!(1)))
                .submodule(Module::new("sub").function("deep", constant(json!(2)))),
        )
    }

    #[test]
    fn binds_nested_functions() {
        let table = table();
        let pkg = table.module("pkg").unwrap();
        let deep = pkg.bind("pkg", &path("pkg.sub.deep")).unwrap();
        assert_eq!(deep.invoke(&[], &BTreeMap::new()).unwrap(), json!(2));
    }

    #[test]
    fn submodule_import_name_is_a_prefix() {
        let table = table();
        let sub = table.module("pkg.sub").unwrap();
        assert!(sub.bind("pkg.sub", &path("pkg.sub.deep")).is_ok());
        assert_eq!(sub.bind("pkg.sub", &path("pkg.deep")).err(), Some(BindError::Mismatch));
    }

    #[test]
    fn mismatch_and_unresolved() {
        let table = table();
        let pkg = table.module("pkg").unwrap();
        assert_eq!(pkg.bind("pkg", &path("other.top")).err(), Some(BindError::Mismatch));
        assert_eq!(pkg.bind("pkg", &path("pkg.missing")).err(), Some(BindError::Unresolved));
        assert_eq!(pkg.bind("pkg", &path("pkg.sub")).err(), Some(BindError::Unresolved));
        assert_eq!(pkg.bind("pkg", &path("pkg")).err(), Some(BindError::Unresolved));
    }

    #[test]
    fn unknown_module_is_none() {
        assert!(table().module("nope").is_none());
        assert!(table().module("pkg.top").is_none());
    }
}
