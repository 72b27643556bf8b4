//! # Fields Module
//!
//! Typed coercion of path parameters.
//!
//! Every route may declare, per path parameter, the type its raw string
//! value must be coerced into. Declarations reference a [`FieldType`], which
//! is either:
//!
//! - a **class**: a validator type identified by its `TypeId`. The
//!   [`FieldRegistry`] instantiates it once (via `Default`) the first time a
//!   route referencing it is registered and reuses that instance for every
//!   later route and request.
//! - an **instance**: a validator value built by the caller (for example a
//!   [`RegexField`] with its own pattern). It is used as-is and never enters
//!   the registry's cache.
//!
//! Built-in classes: [`IntegerField`], [`UuidField`] and [`TokenField`].
//!
//! ## Example
//!
//! ```rust
//! use gwrouter::fields::{FieldRegistry, FieldType, ParamDecl};
//! use gwrouter::router::ParamVec;
//! use std::sync::Arc;
//!
//! let registry = FieldRegistry::new();
//! let decls = vec![ParamDecl::new("id", FieldType::integer())];
//! let mut raw = ParamVec::new();
//! raw.push((Arc::from("id"), "42".to_string()));
//!
//! let params = registry.coerce(&decls, &raw).unwrap();
//! assert_eq!(params.int("id"), Some(42));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::router::{ParamVec, MAX_INLINE_PARAMS};

/// Parameter name that is never coerced.
///
/// Some handler declarations carry a return-type entry under this name.
pub const RETURN_PARAM: &str = "return";

#[allow(clippy::unwrap_used)]
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]+$").unwrap());

/// A coerced path parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    /// Base-10 integer outside the `i64` range, kept as normalised digits.
    BigInteger(String),
    Uuid(Uuid),
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Digits of any integer value, whatever its magnitude.
    #[must_use]
    pub fn as_digits(&self) -> Option<String> {
        match self {
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::BigInteger(d) => Some(d.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::BigInteger(d) => Value::String(d.clone()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::BigInteger(d) => f.write_str(d),
            FieldValue::Uuid(u) => write!(f, "{u}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Validating converter for one declared parameter type.
pub trait Validator: Send + Sync + 'static {
    /// Whether the raw value is acceptable.
    fn validate(&self, value: &str) -> bool;

    /// Convert an acceptable raw value; `None` rejects it.
    ///
    /// Defaults to passing the text through when [`Validator::validate`] accepts it.
    fn coerce(&self, value: &str) -> Option<FieldValue> {
        self.validate(value)
            .then(|| FieldValue::Text(value.to_string()))
    }

    /// Name used in validation error messages.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Base-10 signed integer of any length.
///
/// Values that fit an `i64` become [`FieldValue::Integer`]; longer ones are
/// kept exactly as [`FieldValue::BigInteger`].
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerField;

impl Validator for IntegerField {
    fn validate(&self, value: &str) -> bool {
        parse_integer(value).is_some()
    }

    fn coerce(&self, value: &str) -> Option<FieldValue> {
        parse_integer(value)
    }

    fn name(&self) -> &str {
        "int"
    }
}

fn parse_integer(value: &str) -> Option<FieldValue> {
    if let Ok(i) = value.parse::<i64>() {
        return Some(FieldValue::Integer(i));
    }
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value.strip_prefix('+').unwrap_or(value)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // all-zero input fits i64, so something is left after trimming
    let digits = digits.trim_start_matches('0');
    Some(FieldValue::BigInteger(format!("{sign}{digits}")))
}

/// RFC 4122 UUID in its textual form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidField;

impl Validator for UuidField {
    fn validate(&self, value: &str) -> bool {
        Uuid::parse_str(value).is_ok()
    }

    fn coerce(&self, value: &str) -> Option<FieldValue> {
        Uuid::parse_str(value).ok().map(FieldValue::Uuid)
    }

    fn name(&self) -> &str {
        "UUID"
    }
}

/// Word characters and hyphens only (`^[\w-]+$`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenField;

impl Validator for TokenField {
    fn validate(&self, value: &str) -> bool {
        TOKEN_RE.is_match(value)
    }

    fn name(&self) -> &str {
        "str"
    }
}

/// Regex-backed validator.
///
/// The pattern must match at the start of the value; it is not implicitly
/// anchored at the end, so add `$` for a full-string check.
#[derive(Debug, Clone)]
pub struct RegexField {
    pattern: Regex,
    source: String,
}

impl RegexField {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})"))?;
        Ok(Self {
            pattern: anchored,
            source: pattern.to_string(),
        })
    }

    /// The pattern as written by the caller.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Validator for RegexField {
    fn validate(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }
}

/// Type identity of a validator class plus the constructor used on first sighting.
#[derive(Clone, Copy)]
pub struct FieldClass {
    id: TypeId,
    name: &'static str,
    make: fn() -> Arc<dyn Validator>,
}

impl FieldClass {
    #[must_use]
    pub fn of<V: Validator + Default>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: short_type_name(std::any::type_name::<V>()),
            make: make_validator::<V>,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldClass").field(&self.name).finish()
    }
}

fn make_validator<V: Validator + Default>() -> Arc<dyn Validator> {
    Arc::new(V::default())
}

/// Declared type of a path parameter.
#[derive(Clone)]
pub enum FieldType {
    Class(FieldClass),
    Instance(Arc<dyn Validator>),
}

impl FieldType {
    /// Class-based declaration: one cached instance per type.
    #[must_use]
    pub fn of<V: Validator + Default>() -> Self {
        FieldType::Class(FieldClass::of::<V>())
    }

    /// Pre-built validator, used as-is and never cached.
    pub fn instance<V: Validator>(validator: V) -> Self {
        FieldType::Instance(Arc::new(validator))
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::of::<IntegerField>()
    }

    #[must_use]
    pub fn uuid() -> Self {
        Self::of::<UuidField>()
    }

    #[must_use]
    pub fn token() -> Self {
        Self::of::<TokenField>()
    }

    /// Shorthand for an instance-based [`RegexField`].
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::instance(RegexField::new(pattern)?))
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Class(class) => write!(f, "Class({})", class.name),
            FieldType::Instance(v) => write!(f, "Instance({})", v.name()),
        }
    }
}

/// One `(name, type)` entry of a route's parameter declarations.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Arc<str>,
    pub ty: FieldType,
}

impl ParamDecl {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: Arc::from(name),
            ty,
        }
    }
}

/// Inline storage for coerced parameters.
pub type FieldVec = SmallVec<[(Arc<str>, FieldValue); MAX_INLINE_PARAMS]>;

/// Path parameters after coercion.
///
/// Holds every path parameter of the request: declared ones carry their
/// coerced value, undeclared ones are passed through as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: FieldVec,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    #[must_use]
    pub fn uuid(&self, name: &str) -> Option<Uuid> {
        self.get(name).and_then(FieldValue::as_uuid)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Parameters as a JSON object, handy for echoing them back.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_json()))
                .collect(),
        )
    }

    fn set(&mut self, name: Arc<str>, value: FieldValue) {
        match self.values.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }
}

/// Maps declared parameter types to validators.
///
/// Mutated only while routes are being registered; afterwards it is read-only
/// and can be shared across concurrently dispatched requests.
pub struct FieldRegistry {
    by_type: HashMap<TypeId, Arc<dyn Validator>>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    /// Registry preloaded with the built-in classes.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_type: HashMap::new(),
        };
        registry.register_for::<IntegerField>(IntegerField);
        registry.register_for::<UuidField>(UuidField);
        registry.register_for::<TokenField>(TokenField);
        registry
    }

    /// Use `validator` for every parameter declared with type `T`.
    ///
    /// Replaces whatever was registered for `T` before, including built-ins.
    pub fn register_for<T: 'static>(&mut self, validator: impl Validator) {
        self.by_type.insert(TypeId::of::<T>(), Arc::new(validator));
    }

    /// Instantiate and cache a class-based type on first sighting.
    ///
    /// Instance-based declarations are left alone.
    pub fn warm(&mut self, ty: &FieldType) {
        if let FieldType::Class(class) = ty {
            self.by_type.entry(class.id).or_insert_with(|| {
                debug!(field_type = class.name, "Caching custom field validator");
                (class.make)()
            });
        }
    }

    /// The cached validator for a class-based type.
    #[must_use]
    pub fn cached(&self, ty: &FieldType) -> Option<&Arc<dyn Validator>> {
        match ty {
            FieldType::Class(class) => self.by_type.get(&class.id),
            FieldType::Instance(_) => None,
        }
    }

    #[must_use]
    pub fn contains<V: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<V>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    fn validator_for(&self, ty: &FieldType) -> Arc<dyn Validator> {
        match ty {
            FieldType::Instance(v) => Arc::clone(v),
            // A class that was never warmed gets a throwaway instance so the
            // registry stays read-only during dispatch.
            FieldType::Class(class) => self
                .by_type
                .get(&class.id)
                .map_or_else(|| (class.make)(), Arc::clone),
        }
    }

    /// Coerce raw path parameters against a route's declarations.
    ///
    /// All-or-nothing: the first failing declaration aborts the whole
    /// operation and is the only one reported.
    pub fn coerce(&self, decls: &[ParamDecl], raw: &ParamVec) -> Result<Params, ValidationError> {
        let mut params = Params::new();
        for (name, value) in raw {
            params.set(Arc::clone(name), FieldValue::Text(value.clone()));
        }

        for decl in decls {
            if decl.name.as_ref() == RETURN_PARAM {
                continue;
            }
            let raw_value = raw
                .iter()
                .rfind(|(k, _)| *k == decl.name)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| ValidationError::Missing {
                    param: decl.name.to_string(),
                })?;

            let validator = self.validator_for(&decl.ty);
            let value =
                validator
                    .coerce(raw_value)
                    .ok_or_else(|| ValidationError::InvalidValue {
                        param: decl.name.to_string(),
                        validator: validator.name().to_string(),
                        value: raw_value.to_string(),
                    })?;
            params.set(Arc::clone(&decl.name), value);
        }

        Ok(params)
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("cached_types", &self.by_type.len())
            .finish()
    }
}
