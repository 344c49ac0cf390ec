use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::builtins;
use super::ExpressionError;

pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, ExpressionError> + Send + Sync>;
pub type TestFn = Arc<dyn Fn(&Value, &[Value]) -> Result<bool, ExpressionError> + Send + Sync>;

/// Named filters (`value | name(args)`) and tests (`value is name(args)`) available
/// to expressions.
///
/// `Environment::default()` carries the built-in set; callers register extra entries
/// before handing the environment to a [`Renderer`](super::Renderer). `default`,
/// `defined` and `undefined` are evaluated by the interpreter itself because they
/// must observe undefined inputs.
#[derive(Clone)]
pub struct Environment {
    filters: HashMap<String, FilterFn>,
    tests: HashMap<String, TestFn>,
}

impl Default for Environment {
    fn default() -> Self {
        let mut env = Self::empty();
        builtins::register_filters(&mut env);
        builtins::register_tests(&mut env);
        env
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("filters", &self.filter_names())
            .field("tests", &self.test_names())
            .finish()
    }
}

impl Environment {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
            tests: HashMap::new(),
        }
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn register_test<F>(&mut self, name: impl Into<String>, test: F)
    where
        F: Fn(&Value, &[Value]) -> Result<bool, ExpressionError> + Send + Sync + 'static,
    {
        self.tests.insert(name.into(), Arc::new(test));
    }

    pub fn filter(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn test(&self, name: &str) -> Option<&TestFn> {
        self.tests.get(name)
    }

    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.push("default");
        names.sort_unstable();
        names
    }

    pub fn test_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tests.keys().map(String::as_str).collect();
        names.extend(["defined", "undefined"]);
        names.sort_unstable();
        names
    }
}
