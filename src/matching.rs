use crate::error::Error;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

/// Key that marks an object in a contract document as a matching rule
/// instead of a literal value.
pub const MATCH_KEY: &str = "sigpact:match";

#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(Value),
    Type(Value),
    Regex(Regex, String),
    EachLike { template: Box<Matcher>, min: usize },
    EachKeyLike { template: Box<Matcher> },
    Object(Vec<(String, Matcher)>),
    Array(Vec<Matcher>),
}

impl Matcher {
    pub fn literal<V: Into<Value>>(value: V) -> Self {
        Matcher::Literal(value.into())
    }

    pub fn like<V: Into<Value>>(sample: V) -> Self {
        Matcher::Type(sample.into())
    }

    pub fn matching_regex<S1: AsRef<str>, S2: Into<String>>(
        pattern: S1,
        sample: S2,
    ) -> Result<Self, Error> {
        let regex = Regex::new(pattern.as_ref()).map_err(|e| {
            Error::InvalidContractFormat(format!("invalid regex \"{}\": {}", pattern.as_ref(), e))
        })?;

        Ok(Matcher::Regex(regex, sample.into()))
    }

    pub fn each_like(template: Matcher, min: usize) -> Self {
        Matcher::EachLike {
            template: Box::new(template),
            min,
        }
    }

    pub fn each_key_like(template: Matcher) -> Self {
        Matcher::EachKeyLike {
            template: Box::new(template),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) => match map.get(MATCH_KEY) {
                Some(rule) => Self::from_rule(rule, map),
                None => {
                    let mut children = Vec::with_capacity(map.len());
                    for (key, child) in map {
                        children.push((key.clone(), Matcher::from_json(child)?));
                    }
                    Ok(Matcher::Object(children))
                }
            },
            Value::Array(items) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    children.push(Matcher::from_json(item)?);
                }
                Ok(Matcher::Array(children))
            }
            other => Ok(Matcher::Literal(other.clone())),
        }
    }

    fn from_rule(rule: &Value, map: &Map<String, Value>) -> Result<Self, Error> {
        let rule = rule.as_str().ok_or_else(|| {
            Error::InvalidContractFormat(format!("\"{}\" must be a string", MATCH_KEY))
        })?;

        match rule {
            "type" => Ok(Matcher::Type(
                map.get("value").cloned().unwrap_or(Value::Null),
            )),
            "regex" => {
                let pattern = map.get("regex").and_then(Value::as_str).ok_or_else(|| {
                    Error::InvalidContractFormat(
                        "a regex rule requires a \"regex\" pattern".into(),
                    )
                })?;
                let sample = map.get("value").and_then(Value::as_str).unwrap_or_default();
                Matcher::matching_regex(pattern, sample)
            }
            "eachLike" => {
                let template = map.get("template").ok_or_else(|| {
                    Error::InvalidContractFormat(
                        "an eachLike rule requires a \"template\" element".into(),
                    )
                })?;
                let min = map.get("min").and_then(Value::as_u64).unwrap_or(1) as usize;
                Ok(Matcher::each_like(Matcher::from_json(template)?, min))
            }
            "eachKeyLike" => {
                let template = map.get("template").ok_or_else(|| {
                    Error::InvalidContractFormat(
                        "an eachKeyLike rule requires a \"template\" value".into(),
                    )
                })?;
                Ok(Matcher::each_key_like(Matcher::from_json(template)?))
            }
            other => Err(Error::InvalidContractFormat(format!(
                "unknown matching rule \"{}\"",
                other
            ))),
        }
    }

    /// Generates the concrete value a consumer would have sent: the recorded
    /// sample for rules, `min` template copies for arrays.
    pub fn sample(&self) -> Value {
        match self {
            Matcher::Literal(value) => value.clone(),
            Matcher::Type(sample) => sample.clone(),
            Matcher::Regex(_, sample) => Value::String(sample.clone()),
            Matcher::EachLike { template, min } => {
                let count = (*min).max(1);
                Value::Array((0..count).map(|_| template.sample()).collect())
            }
            Matcher::EachKeyLike { .. } => Value::Object(Map::new()),
            Matcher::Object(children) => {
                let mut map = Map::new();
                for (key, child) in children {
                    map.insert(key.clone(), child.sample());
                }
                Value::Object(map)
            }
            Matcher::Array(items) => Value::Array(items.iter().map(Matcher::sample).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

pub fn match_value(expected: &Matcher, actual: &Value, strict: bool) -> Result<(), Mismatch> {
    match_at("$", expected, actual, strict)
}

pub(crate) fn match_value_at(
    path: &str,
    expected: &Matcher,
    actual: &Value,
    strict: bool,
) -> Result<(), Mismatch> {
    match_at(path, expected, actual, strict)
}

fn match_at(path: &str, expected: &Matcher, actual: &Value, strict: bool) -> Result<(), Mismatch> {
    match expected {
        Matcher::Literal(value) => {
            if deep_equal(value, actual) {
                Ok(())
            } else {
                Err(fail(path, format!("expected {}, got {}", value, actual)))
            }
        }
        Matcher::Type(sample) => match_type(path, sample, actual),
        Matcher::Regex(regex, _) => match actual {
            Value::String(value) => {
                if regex.is_match(value) {
                    Ok(())
                } else {
                    Err(fail(
                        path,
                        format!("\"{}\" does not match pattern \"{}\"", value, regex.as_str()),
                    ))
                }
            }
            other => Err(fail(
                path,
                format!(
                    "expected a string matching \"{}\", got {}",
                    regex.as_str(),
                    json_kind(other)
                ),
            )),
        },
        Matcher::EachLike { template, min } => match actual {
            Value::Array(items) => {
                if items.len() < *min {
                    return Err(fail(
                        path,
                        format!(
                            "expected an array with at least {} elements, got {}",
                            min,
                            items.len()
                        ),
                    ));
                }

                for (index, item) in items.iter().enumerate() {
                    match_at(&format!("{}[{}]", path, index), template, item, strict)?;
                }
                Ok(())
            }
            other => Err(fail(
                path,
                format!("expected an array, got {}", json_kind(other)),
            )),
        },
        Matcher::EachKeyLike { template } => match actual {
            Value::Object(map) => {
                for (key, value) in map {
                    match_at(&format!("{}.{}", path, key), template, value, strict)?;
                }
                Ok(())
            }
            other => Err(fail(
                path,
                format!("expected an object, got {}", json_kind(other)),
            )),
        },
        Matcher::Object(children) => match actual {
            Value::Object(map) => {
                for (key, child) in children {
                    match map.get(key) {
                        Some(value) => {
                            match_at(&format!("{}.{}", path, key), child, value, strict)?
                        }
                        None => {
                            return Err(fail(
                                &format!("{}.{}", path, key),
                                String::from("missing expected key"),
                            ))
                        }
                    }
                }

                if strict {
                    for key in map.keys() {
                        if !children.iter().any(|(name, _)| name == key) {
                            return Err(fail(
                                &format!("{}.{}", path, key),
                                String::from("unexpected key in strict mode"),
                            ));
                        }
                    }
                }
                Ok(())
            }
            other => Err(fail(
                path,
                format!("expected an object, got {}", json_kind(other)),
            )),
        },
        Matcher::Array(items) => match actual {
            Value::Array(actual_items) => {
                if items.len() != actual_items.len() {
                    return Err(fail(
                        path,
                        format!(
                            "expected an array of length {}, got {}",
                            items.len(),
                            actual_items.len()
                        ),
                    ));
                }

                for (index, (item, actual_item)) in items.iter().zip(actual_items).enumerate() {
                    match_at(&format!("{}[{}]", path, index), item, actual_item, strict)?;
                }
                Ok(())
            }
            other => Err(fail(
                path,
                format!("expected an array, got {}", json_kind(other)),
            )),
        },
    }
}

// a null sample leaves the value unconstrained; object samples require the
// sample's keys with type-matching values, array samples only the kind
fn match_type(path: &str, sample: &Value, actual: &Value) -> Result<(), Mismatch> {
    match sample {
        Value::Null => Ok(()),
        Value::Object(expected_map) => match actual {
            Value::Object(actual_map) => {
                for (key, child_sample) in expected_map {
                    match actual_map.get(key) {
                        Some(value) => {
                            match_type(&format!("{}.{}", path, key), child_sample, value)?
                        }
                        None => {
                            return Err(fail(
                                &format!("{}.{}", path, key),
                                String::from("missing expected key"),
                            ))
                        }
                    }
                }
                Ok(())
            }
            other => Err(fail(
                path,
                format!("expected an object, got {}", json_kind(other)),
            )),
        },
        Value::Array(_) => match actual {
            Value::Array(_) => Ok(()),
            other => Err(fail(
                path,
                format!("expected an array, got {}", json_kind(other)),
            )),
        },
        other => {
            if json_kind(other) == json_kind(actual) {
                Ok(())
            } else {
                Err(fail(
                    path,
                    format!(
                        "expected a {}, got {}",
                        json_kind(other),
                        json_kind(actual)
                    ),
                ))
            }
        }
    }
}

// integer and floating representations of the same value are equal
fn deep_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => expected == actual,
        },
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, value)| match right.get(key) {
                        Some(other) => deep_equal(value, other),
                        None => false,
                    })
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(a, b)| deep_equal(a, b))
        }
        _ => expected == actual,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn fail<S: Into<String>>(path: &str, reason: S) -> Mismatch {
    Mismatch {
        path: String::from(path),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pet_template() -> Matcher {
        Matcher::from_json(&json!({
            "id": { "sigpact:match": "type", "value": 1 },
            "type": { "sigpact:match": "type", "value": "dog" },
            "price": { "sigpact:match": "type", "value": 249.99 }
        }))
        .unwrap()
    }

    #[test]
    fn literal_values_must_be_deep_equal() {
        let expected = Matcher::literal(json!({"id": 1, "type": "dog"}));

        assert!(match_value(&expected, &json!({"id": 1, "type": "dog"}), false).is_ok());
        assert!(match_value(&expected, &json!({"id": 2, "type": "dog"}), false).is_err());
    }

    #[test]
    fn integer_and_float_representations_are_equal() {
        let expected = Matcher::literal(json!(3));

        assert!(match_value(&expected, &json!(3.0), false).is_ok());
    }

    #[test]
    fn type_match_ignores_the_value() {
        let expected = Matcher::like(json!("dog"));

        assert!(match_value(&expected, &json!("fish"), false).is_ok());
        assert!(match_value(&expected, &json!(42), false).is_err());
    }

    #[test]
    fn null_matches_only_null_unless_type_wrapped() {
        let literal_null = Matcher::literal(json!(null));
        assert!(match_value(&literal_null, &json!(null), false).is_ok());
        assert!(match_value(&literal_null, &json!("dog"), false).is_err());

        let like_null = Matcher::like(json!(null));
        assert!(match_value(&like_null, &json!("dog"), false).is_ok());
    }

    #[test]
    fn regex_matches_strings_only() {
        let expected = Matcher::matching_regex(r"^\d{8}T\d{6}Z$", "20230224T000000Z").unwrap();

        assert!(match_value(&expected, &json!("20230224T000000Z"), false).is_ok());

        let mismatch = match_value(&expected, &json!("yesterday"), false).unwrap_err();
        assert!(mismatch.reason.contains("does not match pattern"));

        let mismatch = match_value(&expected, &json!(20230224), false).unwrap_err();
        assert!(mismatch.reason.contains("expected a string"));
    }

    #[test]
    fn each_like_enforces_the_minimum_length() {
        let expected = Matcher::each_like(pet_template(), 3);
        let two_pets = json!([
            {"id": 1, "type": "dog", "price": 249.99},
            {"id": 2, "type": "cat", "price": 124.99}
        ]);

        let mismatch = match_value(&expected, &two_pets, false).unwrap_err();
        assert_eq!(mismatch.path, "$");
        assert!(mismatch
            .reason
            .contains("expected an array with at least 3 elements, got 2"));
    }

    #[test]
    fn each_like_passes_when_every_element_matches() {
        let expected = Matcher::each_like(pet_template(), 3);
        let pets = json!([
            {"id": 1, "type": "dog", "price": 249.99},
            {"id": 2, "type": "cat", "price": 124.99},
            {"id": 3, "type": "fish", "price": 0.99}
        ]);

        assert!(match_value(&expected, &pets, false).is_ok());
    }

    #[test]
    fn each_like_reports_the_offending_element() {
        let expected = Matcher::each_like(pet_template(), 1);
        let pets = json!([
            {"id": 1, "type": "dog", "price": 249.99},
            {"id": 2, "type": 7, "price": 124.99}
        ]);

        let mismatch = match_value(&expected, &pets, false).unwrap_err();
        assert_eq!(mismatch.path, "$[1].type");
    }

    #[test]
    fn each_key_like_matches_every_value() {
        let expected = Matcher::each_key_like(Matcher::like(json!(1)));

        assert!(match_value(&expected, &json!({"dog": 1, "cat": 2}), false).is_ok());

        let mismatch = match_value(&expected, &json!({"dog": 1, "cat": "two"}), false).unwrap_err();
        assert_eq!(mismatch.path, "$.cat");
    }

    #[test]
    fn missing_expected_key_fails() {
        let expected = Matcher::from_json(&json!({"id": 1, "type": "dog"})).unwrap();

        let mismatch = match_value(&expected, &json!({"id": 1}), false).unwrap_err();
        assert_eq!(mismatch.path, "$.type");
        assert_eq!(mismatch.reason, "missing expected key");
    }

    #[test]
    fn extra_keys_are_ignored_unless_strict() {
        let expected = Matcher::from_json(&json!({"id": 1})).unwrap();
        let actual = json!({"id": 1, "type": "dog"});

        assert!(match_value(&expected, &actual, false).is_ok());

        let mismatch = match_value(&expected, &actual, true).unwrap_err();
        assert_eq!(mismatch.path, "$.type");
        assert!(mismatch.reason.contains("unexpected key"));
    }

    #[test]
    fn plain_arrays_match_by_position_and_exact_length() {
        let expected = Matcher::from_json(&json!([1, 2, 3])).unwrap();

        assert!(match_value(&expected, &json!([1, 2, 3]), false).is_ok());

        let mismatch = match_value(&expected, &json!([1, 2]), false).unwrap_err();
        assert!(mismatch.reason.contains("length 3"));

        let mismatch = match_value(&expected, &json!([1, 2, 4]), false).unwrap_err();
        assert_eq!(mismatch.path, "$[2]");
    }

    #[test]
    fn first_mismatch_wins_in_expected_order() {
        let expected = Matcher::from_json(&json!({"a": 1, "b": 2})).unwrap();

        let mismatch = match_value(&expected, &json!({"a": 9, "b": 9}), false).unwrap_err();
        assert_eq!(mismatch.path, "$.a");
    }

    #[test]
    fn matching_is_idempotent() {
        let expected = Matcher::each_like(pet_template(), 2);
        let actual = json!([{"id": 1, "type": "dog", "price": 1.0}]);

        let first = match_value(&expected, &actual, false);
        let second = match_value(&expected, &actual, false);
        assert_eq!(first, second);
    }

    #[test]
    fn sample_generates_min_elements() {
        let matcher = Matcher::each_like(pet_template(), 3);

        let sample = matcher.sample();
        let items = sample.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["type"], json!("dog"));
    }

    #[test]
    fn sample_uses_recorded_values() {
        let matcher = Matcher::from_json(&json!({
            "date": { "sigpact:match": "regex", "regex": r"^\d{8}$", "value": "20230224" },
            "count": 2
        }))
        .unwrap();

        assert_eq!(
            matcher.sample(),
            json!({"date": "20230224", "count": 2})
        );
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let result = Matcher::from_json(&json!({ "sigpact:match": "fuzzy" }));

        match result {
            Err(Error::InvalidContractFormat(reason)) => {
                assert!(reason.contains("fuzzy"));
            }
            other => panic!("expected an InvalidContractFormat error, got {:?}", other),
        }
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(Matcher::matching_regex("(", "sample").is_err());
    }
}
