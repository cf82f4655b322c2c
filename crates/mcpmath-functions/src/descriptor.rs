use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::fmt;
use std::sync::Arc;

use crate::context::InvocationContext;
use crate::error::{ArgumentError, FunctionError};

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    Boolean,
    String,
    Array,
    Any,
}

impl ParamKind {
    /// JSON Schema `type` keyword, `None` for [`ParamKind::Any`].
    pub fn json_type(&self) -> Option<&'static str> {
        match self {
            ParamKind::Integer => Some("integer"),
            ParamKind::Number => Some("number"),
            ParamKind::Boolean => Some("boolean"),
            ParamKind::String => Some("string"),
            ParamKind::Array => Some("array"),
            ParamKind::Any => None,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Integer => "an integer",
            ParamKind::Number => "a number",
            ParamKind::Boolean => "a boolean",
            ParamKind::String => "a string",
            ParamKind::Array => "an array",
            ParamKind::Any => "any value",
        }
    }

    /// Converts `value` to this kind's canonical form.
    ///
    /// Integers accept integral floats and numeric strings, numbers accept
    /// numeric strings (and are always stored as floats), booleans accept
    /// `"true"`/`"false"`. Everything else must already have the right type.
    pub fn coerce(&self, name: &str, value: Value) -> Result<Value, ArgumentError> {
        let coerced = match (self, &value) {
            (ParamKind::Any, _) => Some(value.clone()),
            (ParamKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(Value::from),
            (ParamKind::Integer, Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                    .map(Value::from)
            }
            (ParamKind::Number, Value::Number(n)) => n.as_f64().and_then(float_value),
            (ParamKind::Number, Value::String(s)) => {
                s.trim().parse::<f64>().ok().and_then(float_value)
            }
            (ParamKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ParamKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::Array, Value::Array(_)) => Some(value.clone()),
            _ => None,
        };

        coerced.ok_or_else(|| ArgumentError::Type {
            name: name.to_string(),
            expected: self.expected(),
            found: describe(&value),
        })
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 is 2^63, one past the largest i64
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn float_value(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            description: None,
        }
    }

    /// A parameter that may be left out; absent values are not bound.
    pub fn optional(name: &str, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// An optional parameter that binds to `default` when absent.
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Relative price of a call, used by the smart cache to pick victims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    Cheap,
    Expensive,
}

/// Arguments bound against a schema: declaration order, defaults applied,
/// values coerced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stable serialisation used as the cache key: `[[name, value], ...]` in
    /// declaration order, so argument order on the wire does not matter.
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    pub fn value(&self, name: &str) -> Result<&Value, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::invalid_argument(name, "not provided"))
    }

    pub fn integer(&self, name: &str) -> Result<i64, FunctionError> {
        self.value(name)?
            .as_i64()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected an integer"))
    }

    pub fn number(&self, name: &str) -> Result<f64, FunctionError> {
        self.value(name)?
            .as_f64()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected a number"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, FunctionError> {
        self.value(name)?
            .as_bool()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected a boolean"))
    }

    pub fn string(&self, name: &str) -> Result<&str, FunctionError> {
        self.value(name)?
            .as_str()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected a string"))
    }

    pub fn array(&self, name: &str) -> Result<&[Value], FunctionError> {
        self.value(name)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected an array"))
    }
}

/// Something that can run a bound call.
pub trait Invocable: Send + Sync {
    fn invoke(&self, args: &Arguments, ctx: &InvocationContext) -> Result<Value, FunctionError>;
}

impl<F> Invocable for F
where
    F: Fn(&Arguments, &InvocationContext) -> Result<Value, FunctionError> + Send + Sync,
{
    fn invoke(&self, args: &Arguments, ctx: &InvocationContext) -> Result<Value, FunctionError> {
        self(args, ctx)
    }
}

/// Immutable description of a callable function.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    domain: String,
    category: String,
    description: String,
    params: Vec<ParamSpec>,
    cost: CostClass,
    reports_progress: bool,
    handler: Arc<dyn Invocable>,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("category", &self.category)
            .field("params", &self.params)
            .field("cost", &self.cost)
            .field("reports_progress", &self.reports_progress)
            .finish_non_exhaustive()
    }
}

impl FunctionDescriptor {
    pub fn builder(name: &str, domain: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.to_string(),
            domain: domain.to_string(),
            category: "general".to_string(),
            description: String::new(),
            params: Vec::new(),
            cost: CostClass::Cheap,
            reports_progress: false,
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn cost(&self) -> CostClass {
        self.cost
    }

    pub fn reports_progress(&self) -> bool {
        self.reports_progress
    }

    /// Validates raw arguments against the schema.
    ///
    /// Unknown names are rejected, `null` counts as absent, defaults fill
    /// absent optional parameters and every value is coerced to its kind.
    pub fn bind(&self, raw: &Map<String, Value>) -> Result<Arguments, ArgumentError> {
        if let Some(unknown) = raw
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(ArgumentError::Unknown(unknown.clone()));
        }

        let mut values = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match raw.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let value = param.kind.coerce(&param.name, value.clone())?;
                    values.push((param.name.clone(), value));
                }
                None => match (&param.default, param.required) {
                    (Some(default), _) => {
                        let value = param.kind.coerce(&param.name, default.clone())?;
                        values.push((param.name.clone(), value));
                    }
                    (None, true) => return Err(ArgumentError::Missing(param.name.clone())),
                    (None, false) => {}
                },
            }
        }

        Ok(Arguments { values })
    }

    pub fn invoke(&self, args: &Arguments, ctx: &InvocationContext) -> Result<Value, FunctionError> {
        self.handler.invoke(args, ctx)
    }

    /// JSON Schema for the parameter list.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = Map::new();
            if let Some(kind) = param.kind.json_type() {
                property.insert("type".into(), json!(kind));
            }
            let description = param
                .description
                .clone()
                .unwrap_or_else(|| format!("Parameter: {}", param.name));
            property.insert("description".into(), json!(description));
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// Builder for [`FunctionDescriptor`].
pub struct DescriptorBuilder {
    name: String,
    domain: String,
    category: String,
    description: String,
    params: Vec<ParamSpec>,
    cost: CostClass,
    reports_progress: bool,
    handler: Option<Arc<dyn Invocable>>,
}

impl DescriptorBuilder {
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Adds a required parameter.
    pub fn param(self, name: &str, kind: ParamKind) -> Self {
        self.arg(ParamSpec::required(name, kind))
    }

    pub fn arg(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn cost(mut self, cost: CostClass) -> Self {
        self.cost = cost;
        self
    }

    pub fn expensive(self) -> Self {
        self.cost(CostClass::Expensive)
    }

    pub fn reports_progress(mut self) -> Self {
        self.reports_progress = true;
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Arguments, &InvocationContext) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Finishes the descriptor. Without a handler every call fails with an
    /// execution error.
    pub fn build(self) -> FunctionDescriptor {
        let handler = match self.handler {
            Some(handler) => handler,
            None => {
                let name = self.name.clone();
                let missing: Arc<dyn Invocable> = Arc::new(
                    move |_: &Arguments, _: &InvocationContext| -> Result<Value, FunctionError> {
                        Err(FunctionError::execution(format!("{} has no implementation", name)))
                    },
                );
                missing
            }
        };
        FunctionDescriptor {
            name: self.name,
            domain: self.domain,
            category: self.category,
            description: self.description,
            params: self.params,
            cost: self.cost,
            reports_progress: self.reports_progress,
            handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power() -> FunctionDescriptor {
        FunctionDescriptor::builder("power", "arithmetic")
            .param("base", ParamKind::Number)
            .arg(ParamSpec::required("exponent", ParamKind::Integer).with_default(json!(2)))
            .arg(ParamSpec::optional("label", ParamKind::String))
            .handler(|args, _| {
                let base = args.number("base")?;
                let exp = args.integer("exponent")?;
                Ok(json!(base.powi(exp as i32)))
            })
            .build()
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(ParamKind::Integer.coerce("n", json!(7)).unwrap(), json!(7));
        assert_eq!(ParamKind::Integer.coerce("n", json!(7.0)).unwrap(), json!(7));
        assert_eq!(ParamKind::Integer.coerce("n", json!(" 12 ")).unwrap(), json!(12));
        assert_eq!(ParamKind::Integer.coerce("n", json!("3.0")).unwrap(), json!(3));
        assert!(ParamKind::Integer.coerce("n", json!(7.5)).is_err());
        assert!(ParamKind::Integer.coerce("n", json!("seven")).is_err());
        assert!(ParamKind::Integer.coerce("n", json!(true)).is_err());
        assert!(ParamKind::Integer.coerce("n", json!(9.223372036854775808e18)).is_err());
        assert_eq!(
            ParamKind::Integer.coerce("n", json!(-9.223372036854775808e18)).unwrap(),
            json!(i64::MIN)
        );
    }

    #[test]
    fn test_number_coercion_stores_floats() {
        assert_eq!(ParamKind::Number.coerce("x", json!(2)).unwrap(), json!(2.0));
        assert_eq!(ParamKind::Number.coerce("x", json!("2.5")).unwrap(), json!(2.5));
        assert!(ParamKind::Number.coerce("x", json!([1])).is_err());
    }

    #[test]
    fn test_boolean_and_string_coercion() {
        assert_eq!(ParamKind::Boolean.coerce("b", json!("TRUE")).unwrap(), json!(true));
        assert!(ParamKind::Boolean.coerce("b", json!(1)).is_err());
        assert!(ParamKind::String.coerce("s", json!(1)).is_err());
        assert_eq!(ParamKind::Any.coerce("v", json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_bind_fills_defaults_in_declared_order() {
        let f = power();
        let args = f.bind(&raw(json!({"base": 3}))).unwrap();
        let names: Vec<&str> = args.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["base", "exponent"]);
        assert_eq!(args.get("exponent"), Some(&json!(2)));
        assert_eq!(args.get("label"), None);
    }

    #[test]
    fn test_bind_canonical_ignores_wire_order() {
        let f = power();
        let a = f.bind(&raw(json!({"base": 2, "exponent": 5}))).unwrap();
        let b = f.bind(&raw(json!({"exponent": "5", "base": 2.0}))).unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_bind_coerces_defaults() {
        let f = FunctionDescriptor::builder("scale", "arithmetic")
            .arg(ParamSpec::optional("factor", ParamKind::Number).with_default(json!(2)))
            .build();
        let defaulted = f.bind(&Map::new()).unwrap();
        let explicit = f.bind(&raw(json!({"factor": 2.0}))).unwrap();
        assert_eq!(defaulted.get("factor"), Some(&json!(2.0)));
        assert_eq!(defaulted.canonical(), explicit.canonical());
    }

    #[test]
    fn test_bind_errors() {
        let f = power();
        assert_eq!(
            f.bind(&raw(json!({}))).unwrap_err(),
            ArgumentError::Missing("base".into())
        );
        assert_eq!(
            f.bind(&raw(json!({"base": 1, "extra": 1}))).unwrap_err(),
            ArgumentError::Unknown("extra".into())
        );
        assert!(matches!(
            f.bind(&raw(json!({"base": "abc"}))).unwrap_err(),
            ArgumentError::Type { .. }
        ));
    }

    #[test]
    fn test_bind_null_counts_as_absent() {
        let f = power();
        let args = f.bind(&raw(json!({"base": 1, "exponent": null}))).unwrap();
        assert_eq!(args.get("exponent"), Some(&json!(2)));
    }

    #[test]
    fn test_invoke() {
        let f = power();
        let args = f.bind(&raw(json!({"base": 3, "exponent": 3}))).unwrap();
        assert_eq!(f.invoke(&args, &InvocationContext::new()).unwrap(), json!(27.0));
    }

    #[test]
    fn test_input_schema() {
        let schema = power().input_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["base"]["type"], json!("number"));
        assert_eq!(schema["properties"]["exponent"]["default"], json!(2));
        assert_eq!(schema["required"], json!(["base"]));
    }

    #[test]
    fn test_build_without_handler_fails_calls() {
        let f = FunctionDescriptor::builder("stub", "misc").build();
        let err = f.invoke(&Arguments::default(), &InvocationContext::new()).unwrap_err();
        assert!(matches!(err, FunctionError::Execution(_)));
        assert_eq!(f.category(), "general");
        assert_eq!(f.cost(), CostClass::Cheap);
    }
}
