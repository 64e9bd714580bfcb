//! Argument parsing
//!
//! Class constructors and methods describe their parameters with a static
//! [`ArgSpec`] table. [`parse_args`] matches a call's positional and keyword
//! arguments against the table and hands back a [`Parsed`] set indexed in
//! table order.

use crate::error::{MachineError, MachineResult};
use crate::value::Value;

/// Arguments of one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments only
    pub fn from_positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            keywords: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument
    pub fn kw(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Overwrite the argument bound to slot `index` of a parameter table
    ///
    /// `*_into` methods hand filled buffers back through this.
    pub fn replace(&mut self, index: usize, name: &str, value: Value) {
        if let Some(slot) = self.positional.get_mut(index) {
            *slot = value;
        } else if let Some((_, slot)) = self.keywords.iter_mut().find(|(n, _)| n.as_str() == name) {
            *slot = value;
        }
    }
}

/// How a parameter may be passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Positional or keyword, optional
    Positional,
    /// Positional or keyword, must be given
    Required,
    /// Keyword only
    KeywordOnly,
}

/// Value a parameter takes when it is not passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDefault {
    Absent,
    None,
    Int(i64),
}

/// One row of a parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub default: ArgDefault,
}

impl ArgSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: ArgKind::Required,
            default: ArgDefault::Absent,
        }
    }

    pub const fn positional(name: &'static str, default: ArgDefault) -> Self {
        Self {
            name,
            kind: ArgKind::Positional,
            default,
        }
    }

    pub const fn keyword(name: &'static str, default: ArgDefault) -> Self {
        Self {
            name,
            kind: ArgKind::KeywordOnly,
            default,
        }
    }
}

/// Arguments matched against a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    values: Vec<Option<Value>>,
}

impl Parsed {
    /// Value in slot `i`; `None` when absent
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i).and_then(Option::as_ref)
    }

    /// Slot `i` as an int; absent and `None` both give `Ok(None)`
    pub fn int(&self, i: usize) -> MachineResult<Option<i64>> {
        match self.get(i) {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.as_int().map(Some),
        }
    }

    /// Slot `i` as an int, or `default` when absent
    pub fn int_or(&self, i: usize, default: i64) -> MachineResult<i64> {
        Ok(self.int(i)?.unwrap_or(default))
    }

    /// Whether slot `i` was given a value other than `None`
    pub fn is_given(&self, i: usize) -> bool {
        !matches!(self.get(i), None | Some(Value::None))
    }
}

/// Match `args` against `spec`
pub fn parse_args(spec: &[ArgSpec], args: &Args) -> MachineResult<Parsed> {
    let mut values: Vec<Option<Value>> = vec![None; spec.len()];

    let positional_slots = spec
        .iter()
        .take_while(|s| s.kind != ArgKind::KeywordOnly)
        .count();
    if args.positional.len() > positional_slots {
        return Err(MachineError::type_error(format!(
            "function takes {} positional arguments but {} were given",
            positional_slots,
            args.positional.len()
        )));
    }
    for (slot, value) in values.iter_mut().zip(&args.positional) {
        *slot = Some(value.clone());
    }

    for (name, value) in &args.keywords {
        let i = spec
            .iter()
            .position(|s| s.name == name.as_str())
            .ok_or_else(|| MachineError::type_error(format!("unexpected keyword argument '{}'", name)))?;
        if values[i].is_some() {
            return Err(MachineError::type_error(format!(
                "function got multiple values for argument '{}'",
                name
            )));
        }
        values[i] = Some(value.clone());
    }

    for (slot, s) in values.iter_mut().zip(spec) {
        if slot.is_some() {
            continue;
        }
        match (s.kind, s.default) {
            (ArgKind::Required, _) => {
                return Err(MachineError::type_error(format!("'{}' argument required", s.name)))
            }
            (_, ArgDefault::Absent) => {}
            (_, ArgDefault::None) => *slot = Some(Value::None),
            (_, ArgDefault::Int(n)) => *slot = Some(Value::Int(n)),
        }
    }

    Ok(Parsed { values })
}

/// Check a call's argument count for methods without a table
pub fn check_arg_count(args: &Args, min: usize, max: usize, takes_kw: bool) -> MachineResult<()> {
    if !takes_kw && !args.keywords.is_empty() {
        return Err(MachineError::type_error("function doesn't take keyword arguments"));
    }
    let n = args.positional.len();
    if min == max && n != min {
        return Err(MachineError::type_error(format!(
            "function takes {} positional arguments but {} were given",
            min, n
        )));
    }
    if n < min {
        return Err(MachineError::type_error(format!(
            "function missing {} required positional arguments",
            min - n
        )));
    }
    if n > max {
        return Err(MachineError::type_error(format!(
            "function expected at most {} arguments, got {}",
            max, n
        )));
    }
    Ok(())
}
