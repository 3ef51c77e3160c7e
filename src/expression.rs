//! Typed update and condition expressions.
//!
//! Updates and conditions are built as values and rendered to DynamoDB
//! expression syntax only at the edge. Every attribute name goes through a
//! `#n` placeholder and every operand through a `:v` placeholder, so reserved
//! words such as `year` or `size` need no special handling.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::decimal::Decimal;
use crate::error::{Result, StoreError};
use crate::model::Value;

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A document path such as `info.actors[0]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrPath {
    segments: Vec<PathSegment>,
}

impl AttrPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when one path is a prefix of the other (or they are equal).
    pub fn overlaps(&self, other: &AttrPath) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Name of the top-level attribute the path starts from.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => name,
            _ => "",
        }
    }
}

impl FromStr for AttrPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| StoreError::InvalidPath(format!("{s:?}: {why}"));
        let mut segments = Vec::new();

        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(at) => part.split_at(at),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(invalid("empty attribute name"));
            }
            if name.contains(']') {
                return Err(invalid("unbalanced brackets"));
            }
            segments.push(PathSegment::Field(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unbalanced brackets"))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("list index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected text after list index"));
                }
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A single mutation applied by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET path = value`
    Set { path: AttrPath, value: Value },
    /// `SET path = path + by`
    Increment { path: AttrPath, by: Decimal },
    /// `REMOVE path`; on a list index, later elements shift down.
    Remove { path: AttrPath },
}

impl UpdateAction {
    pub fn path(&self) -> &AttrPath {
        match self {
            UpdateAction::Set { path, .. }
            | UpdateAction::Increment { path, .. }
            | UpdateAction::Remove { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// Left-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(AttrPath),
    /// `size(path)`: characters of a string, elements of a list or map.
    Size(AttrPath),
}

/// A predicate over a record's current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        operand: Operand,
        op: Comparison,
        value: Value,
    },
    AttributeExists(AttrPath),
    AttributeNotExists(AttrPath),
    And(Vec<Condition>),
}

impl Condition {
    pub fn compare(path: AttrPath, op: Comparison, value: impl Into<Value>) -> Self {
        Condition::Compare {
            operand: Operand::Path(path),
            op,
            value: value.into(),
        }
    }

    pub fn size(path: AttrPath, op: Comparison, size: i64) -> Self {
        Condition::Compare {
            operand: Operand::Size(path),
            op,
            value: Value::from(size),
        }
    }
}

/// A set of update actions with an optional guard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub actions: Vec<UpdateAction>,
    pub condition: Option<Condition>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: AttrPath, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set {
            path,
            value: value.into(),
        });
        self
    }

    pub fn increment(mut self, path: AttrPath, by: Decimal) -> Self {
        self.actions.push(UpdateAction::Increment { path, by });
        self
    }

    pub fn remove(mut self, path: AttrPath) -> Self {
        self.actions.push(UpdateAction::Remove { path });
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Expression text with its placeholder tables.
#[derive(Debug, Default, PartialEq)]
pub struct Rendered {
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, Value>,
}

#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, Value>,
}

impl Placeholders {
    fn name(&mut self, name: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, n)| n.as_str() == name) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), name.to_string());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn path(&mut self, path: &AttrPath) -> String {
        let mut out = String::new();
        for segment in path.segments() {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(&self.name(name));
                }
                PathSegment::Index(index) => out.push_str(&format!("[{index}]")),
            }
        }
        out
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { operand, op, value } => {
                let lhs = match operand {
                    Operand::Path(path) => self.path(path),
                    Operand::Size(path) => format!("size({})", self.path(path)),
                };
                let rhs = self.value(value.clone());
                format!("{lhs} {} {rhs}", op.symbol())
            }
            Condition::AttributeExists(path) => format!("attribute_exists({})", self.path(path)),
            Condition::AttributeNotExists(path) => {
                format!("attribute_not_exists({})", self.path(path))
            }
            Condition::And(parts) => parts
                .iter()
                .map(|part| format!("({})", self.condition(part)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

/// Renders an update (and its condition) to DynamoDB expression syntax.
pub fn render_update(update: &Update) -> Result<Rendered> {
    if update.actions.is_empty() {
        return Err(StoreError::Validation(
            "an update needs at least one action".to_string(),
        ));
    }

    let mut placeholders = Placeholders::default();
    let mut sets = Vec::new();
    let mut removes = Vec::new();

    for action in &update.actions {
        match action {
            UpdateAction::Set { path, value } => {
                let target = placeholders.path(path);
                let value = placeholders.value(value.clone());
                sets.push(format!("{target} = {value}"));
            }
            UpdateAction::Increment { path, by } => {
                let target = placeholders.path(path);
                let by = placeholders.value(Value::N(*by));
                sets.push(format!("{target} = {target} + {by}"));
            }
            UpdateAction::Remove { path } => removes.push(placeholders.path(path)),
        }
    }

    let mut clauses = Vec::new();
    if !sets.is_empty() {
        clauses.push(format!("SET {}", sets.join(", ")));
    }
    if !removes.is_empty() {
        clauses.push(format!("REMOVE {}", removes.join(", ")));
    }

    let condition_expression = update
        .condition
        .as_ref()
        .map(|condition| placeholders.condition(condition));

    Ok(Rendered {
        update_expression: Some(clauses.join(" ")),
        condition_expression,
        names: placeholders.names,
        values: placeholders.values,
    })
}

/// Renders a standalone condition, as used by conditional deletes.
pub fn render_condition(condition: &Condition) -> Rendered {
    let mut placeholders = Placeholders::default();
    let expression = placeholders.condition(condition);
    Rendered {
        update_expression: None,
        condition_expression: Some(expression),
        names: placeholders.names,
        values: placeholders.values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> AttrPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            path("info.actors[0]").segments(),
            &[
                PathSegment::Field("info".to_string()),
                PathSegment::Field("actors".to_string()),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(path("matrix[1][2]").segments().len(), 3);
        assert_eq!(path("info.actors[0]").root(), "info");
    }

    #[test]
    fn test_overlapping_paths() {
        assert!(path("info").overlaps(&path("info.rating")));
        assert!(path("info.actors[0]").overlaps(&path("info.actors")));
        assert!(!path("info.actors[0]").overlaps(&path("info.actors[1]")));
        assert!(!path("info.plot").overlaps(&path("info.rating")));
    }

    #[test]
    fn test_path_display_round_trips() {
        for literal in ["info", "info.rating", "info.actors[0]", "a[1][2].b"] {
            assert_eq!(path(literal).to_string(), literal);
        }
    }

    #[test]
    fn test_parse_path_rejects_malformed() {
        for literal in ["", "info.", ".info", "info[", "info[x]", "info[-1]", "info[0]x", "a]"] {
            assert!(
                matches!(literal.parse::<AttrPath>(), Err(StoreError::InvalidPath(_))),
                "{literal:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_render_set_and_increment() {
        let update = Update::new()
            .set(path("info.rating"), Value::N("5.5".parse().unwrap()))
            .increment(path("info.rank"), Decimal::from(1));

        let rendered = render_update(&update).unwrap();
        assert_eq!(
            rendered.update_expression.as_deref(),
            Some("SET #n0.#n1 = :v0, #n0.#n2 = #n0.#n2 + :v1")
        );
        assert_eq!(rendered.condition_expression, None);
        assert_eq!(rendered.names["#n0"], "info");
        assert_eq!(rendered.names["#n1"], "rating");
        assert_eq!(rendered.names["#n2"], "rank");
        assert_eq!(rendered.values[":v1"], Value::from(1));
    }

    #[test]
    fn test_render_conditional_remove() {
        let update = Update::new()
            .remove(path("info.actors[0]"))
            .when(Condition::size(path("info.actors"), Comparison::Gt, 3));

        let rendered = render_update(&update).unwrap();
        assert_eq!(
            rendered.update_expression.as_deref(),
            Some("REMOVE #n0.#n1[0]")
        );
        assert_eq!(
            rendered.condition_expression.as_deref(),
            Some("size(#n0.#n1) > :v0")
        );
        assert_eq!(rendered.values[":v0"], Value::from(3));
    }

    #[test]
    fn test_render_condition_conjunction() {
        let condition = Condition::And(vec![
            Condition::AttributeExists(path("info")),
            Condition::compare(path("info.rating"), Comparison::Le, 5_i64),
        ]);
        let rendered = render_condition(&condition);
        assert_eq!(
            rendered.condition_expression.as_deref(),
            Some("(attribute_exists(#n0)) AND (#n0.#n1 <= :v0)")
        );
        assert_eq!(rendered.update_expression, None);
    }

    #[test]
    fn test_render_rejects_empty_update() {
        assert!(matches!(
            render_update(&Update::new()),
            Err(StoreError::Validation(_))
        ));
    }
}
