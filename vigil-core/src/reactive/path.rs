//! Watch paths.
//!
//! A path is a dot-delimited list of segments. Each segment is an identifier
//! (unicode letters, digits, `$` and `_`) optionally followed by numeric
//! index suffixes, e.g. `items[0]`. Anything else is rejected.

use std::rc::Rc;

use super::watcher::Getter;
use crate::error::Result;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
}

/// Turn `a.b[0].c` into a getter over the owner's data.
///
/// Returns `None` when the path contains any other character.
pub fn parse_path(path: &str) -> Option<Getter> {
    let steps = parse_steps(path)?;
    Some(Rc::new(move |root: &Value| -> Result<Value> {
        let mut current = root.clone();
        for step in &steps {
            if current.is_nullish() {
                return Ok(Value::Undefined);
            }
            current = match step {
                Step::Key(key) => read_key(&current, key),
                Step::Index(index) => read_key(&current, &index.to_string()),
            };
        }
        Ok(current)
    }))
}

fn read_key(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(object) => object.get(key),
        Value::Array(array) if key == "length" => Value::from(array.len()),
        Value::Array(array) => key
            .parse::<usize>()
            .map(|i| array.get(i))
            .unwrap_or_default(),
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Undefined,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '$' || c == '_'
}

fn parse_steps(path: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    for segment in path.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return None;
        }
        steps.push(Step::Key(name.to_string()));

        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let digits = &inner[..close];
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            steps.push(Step::Index(digits.parse().ok()?));
            rest = &inner[close + 1..];
        }
    }
    Some(steps)
}
