//! Rhai-backed expression evaluator.
//!
//! The engine is **created once** and shared by every request. Expressions
//! are compiled to an AST on first use and kept in a copy-on-write cache, so
//! the request path only performs an atomic load and a fresh scope.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ RhaiEvaluator (created once per generation) │
//! │   ├── engine: Engine (sandboxed)            │
//! │   └── ast_cache: ArcSwap<HashMap<.., AST>>  │
//! └─────────────────────────────────────────────┘
//!              │
//!              ▼ evaluate(expression, bindings)
//! ┌─────────────────────────────────────────────┐
//! │ Per-request:                                │
//! │   1. Load cached AST (lock-free)            │
//! │   2. Build Scope from bindings              │
//! │   3. Evaluate, convert result to JSON       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Helper Functions
//!
//! - `has_auth_method(facts, method)` - Check a satisfied authentication method
//! - `session_fact(facts, name)` - Read a session fact, or unit
//! - `ends_with_scope(value, scope)` - Check a `value@scope` string

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rhai::{AST, Dynamic, Engine, Map, Scope};
use serde_json::Value;

use crate::config::ScriptConfig;
use crate::script::{ExpressionEvaluator, ScriptBindings, ScriptError};

/// Sandboxed Rhai evaluator.
pub struct RhaiEvaluator {
    engine: Engine,
    ast_cache: ArcSwap<HashMap<String, Arc<AST>>>,
    enabled: bool,
}

impl RhaiEvaluator {
    /// Create an evaluator with the given sandbox limits.
    #[must_use]
    pub fn new(config: &ScriptConfig) -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        engine.disable_symbol("eval");

        // Script output goes to the log, never to stdout.
        engine.on_print(|text| tracing::debug!(target: "attrel::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "attrel::script", source = ?source, position = %pos, "{text}");
        });

        Self::register_helpers(&mut engine);

        Self {
            engine,
            ast_cache: ArcSwap::from_pointee(HashMap::new()),
            enabled: config.enabled,
        }
    }

    /// Number of compiled expressions held in the cache.
    #[must_use]
    pub fn cached_expressions(&self) -> usize {
        self.ast_cache.load().len()
    }

    fn get_or_compile(&self, expression: &str) -> Result<Arc<AST>, ScriptError> {
        if let Some(ast) = self.ast_cache.load().get(expression) {
            return Ok(Arc::clone(ast));
        }

        let ast = Arc::new(
            self.engine
                .compile_expression(expression)
                .map_err(|e| ScriptError::Compile(e.to_string()))?,
        );

        self.ast_cache.rcu(|cache| {
            let mut next = HashMap::clone(cache);
            next.insert(expression.to_string(), Arc::clone(&ast));
            next
        });

        Ok(ast)
    }

    fn register_helpers(engine: &mut Engine) {
        engine.register_fn("has_auth_method", |facts: Map, method: &str| -> bool {
            facts
                .get("authenticationMethods")
                .and_then(|m| m.clone().try_cast::<rhai::Array>())
                .map(|methods| {
                    methods
                        .iter()
                        .any(|m| m.clone().into_string().ok().as_deref() == Some(method))
                })
                .unwrap_or(false)
        });

        engine.register_fn("session_fact", |facts: Map, name: &str| -> Dynamic {
            facts
                .get("session")
                .and_then(|s| s.clone().try_cast::<Map>())
                .and_then(|s| s.get(name).cloned())
                .unwrap_or(Dynamic::UNIT)
        });

        engine.register_fn("ends_with_scope", |value: &str, scope: &str| -> bool {
            value
                .rsplit_once('@')
                .is_some_and(|(_, s)| s.eq_ignore_ascii_case(scope))
        });
    }

    fn populate_scope(bindings: &ScriptBindings<'_>) -> Result<Scope<'static>, ScriptError> {
        let mut scope = Scope::new();

        scope.push("principal", optional_string(bindings.facts.principal()));
        scope.push("requester", optional_string(bindings.facts.requester()));
        scope.push("responder", optional_string(bindings.facts.responder()));
        scope.push("facts", to_dynamic(bindings.facts)?);
        scope.push(
            "custom",
            match bindings.custom {
                Some(custom) => to_dynamic(custom)?,
                None => Dynamic::UNIT,
            },
        );

        if let Some(attribute) = bindings.attribute {
            scope.push("attribute_id", attribute.id().to_string());
        }
        if let Some(value) = bindings.value {
            scope.push("value", optional_string(value.display_value()));
            scope.push("scope", optional_string(value.scope()));
        }

        Ok(scope)
    }
}

impl ExpressionEvaluator for RhaiEvaluator {
    fn check(&self, expression: &str) -> Result<(), ScriptError> {
        if !self.enabled {
            return Err(ScriptError::Disabled);
        }
        self.get_or_compile(expression).map(|_| ())
    }

    fn evaluate(
        &self,
        expression: &str,
        bindings: &ScriptBindings<'_>,
    ) -> Result<Value, ScriptError> {
        if !self.enabled {
            return Err(ScriptError::Disabled);
        }

        let ast = self.get_or_compile(expression)?;
        let mut scope = Self::populate_scope(bindings)?;

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ScriptError::Execution(e.to_string()))?;

        rhai::serde::from_dynamic::<Value>(&result)
            .map_err(|e| ScriptError::Execution(format!("unsupported result: {e}")))
    }
}

impl std::fmt::Debug for RhaiEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiEvaluator")
            .field("enabled", &self.enabled)
            .field("cached_expressions", &self.cached_expressions())
            .finish()
    }
}

fn optional_string(value: Option<&str>) -> Dynamic {
    value.map_or(Dynamic::UNIT, |v| Dynamic::from(v.to_string()))
}

fn to_dynamic<T: serde::Serialize>(value: &T) -> Result<Dynamic, ScriptError> {
    rhai::serde::to_dynamic(value).map_err(|e| ScriptError::Execution(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrel_core::{Attribute, AttributeValue, RequestFacts};

    fn evaluator() -> RhaiEvaluator {
        RhaiEvaluator::new(&ScriptConfig::default())
    }

    fn facts() -> RequestFacts {
        RequestFacts::builder()
            .principal("jdoe")
            .requester("https://sp.example.org")
            .authentication_method("mfa")
            .session_fact("tenant", "blue")
            .build()
    }

    fn bindings(facts: &RequestFacts) -> ScriptBindings<'_> {
        ScriptBindings {
            facts,
            custom: None,
            attribute: None,
            value: None,
        }
    }

    #[test]
    fn test_principal_binding() {
        let facts = facts();
        let result = evaluator()
            .evaluate(r#"principal == "jdoe""#, &bindings(&facts))
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_helpers() {
        let facts = facts();
        let eval = evaluator();
        assert_eq!(
            eval.evaluate(r#"has_auth_method(facts, "mfa")"#, &bindings(&facts))
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval.evaluate(r#"session_fact(facts, "tenant") == "blue""#, &bindings(&facts))
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_value_bindings() {
        let facts = facts();
        let attr = Attribute::new("affiliation").unwrap();
        let value = AttributeValue::scoped("staff", "example.org");
        let bindings = ScriptBindings {
            facts: &facts,
            custom: None,
            attribute: Some(&attr),
            value: Some(&value),
        };
        let result = evaluator()
            .evaluate(
                r#"attribute_id == "affiliation" && value == "staff" && scope == "example.org""#,
                &bindings,
            )
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_custom_binding() {
        let facts = facts();
        let custom = serde_json::json!({"allowed": ["https://sp.example.org"]});
        let bindings = ScriptBindings {
            facts: &facts,
            custom: Some(&custom),
            attribute: None,
            value: None,
        };
        let result = evaluator()
            .evaluate("custom.allowed[0] == requester", &bindings)
            .unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_print_and_debug_are_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let facts = facts();
        tracing::subscriber::with_default(subscriber, || {
            let eval = evaluator();
            let printed = eval
                .evaluate(r#"print("printed " + principal)"#, &bindings(&facts))
                .unwrap();
            assert_eq!(printed, Value::Null);
            eval.evaluate(r#"debug("debugged")"#, &bindings(&facts))
                .unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("printed jdoe"), "{output}");
        assert!(output.contains("debugged"), "{output}");
        assert!(output.contains("attrel::script"), "{output}");
    }

    #[test]
    fn test_compile_error() {
        let err = evaluator().check("principal ==").unwrap_err();
        assert!(matches!(err, ScriptError::Compile(_)));
    }

    #[test]
    fn test_ast_cache() {
        let facts = facts();
        let eval = evaluator();
        eval.evaluate("true", &bindings(&facts)).unwrap();
        eval.evaluate("true", &bindings(&facts)).unwrap();
        assert_eq!(eval.cached_expressions(), 1);
    }

    #[test]
    fn test_disabled() {
        let config = ScriptConfig {
            enabled: false,
            ..Default::default()
        };
        let facts = facts();
        let eval = RhaiEvaluator::new(&config);
        assert_eq!(eval.check("true"), Err(ScriptError::Disabled));
        assert_eq!(
            eval.evaluate("true", &bindings(&facts)),
            Err(ScriptError::Disabled)
        );
    }
}
