//! # Command Parameters
//!
//! Parameterised commands (launch, attach) publish a [`ParameterMap`]: one
//! [`ParameterDescription`] per argument with its type, whether it is
//! required, a default, and display/help text for whoever collects the values.
//!
//! [`ParameterMap::validate`] runs before anything reaches a backend. It
//! rejects missing required values, values of the wrong type and unknown
//! names, and fills defaults for optional parameters. Failures are
//! `InvalidArgument` and are returned synchronously.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::types::Address;

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType
{
    String,
    Bool,
    Int,
    Address,
}

impl fmt::Display for ParameterType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Address => "address",
        };
        f.write_str(name)
    }
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue
{
    String(String),
    Bool(bool),
    Int(i64),
    Address(Address),
}

impl ParameterValue
{
    /// Type of this value.
    #[must_use]
    pub fn parameter_type(&self) -> ParameterType
    {
        match self {
            Self::String(_) => ParameterType::String,
            Self::Bool(_) => ParameterType::Bool,
            Self::Int(_) => ParameterType::Int,
            Self::Address(_) => ParameterType::Address,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str>
    {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64>
    {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for ParameterValue
{
    fn from(value: &str) -> Self
    {
        Self::String(value.to_string())
    }
}

impl From<String> for ParameterValue
{
    fn from(value: String) -> Self
    {
        Self::String(value)
    }
}

impl From<bool> for ParameterValue
{
    fn from(value: bool) -> Self
    {
        Self::Bool(value)
    }
}

impl From<i64> for ParameterValue
{
    fn from(value: i64) -> Self
    {
        Self::Int(value)
    }
}

impl From<Address> for ParameterValue
{
    fn from(value: Address) -> Self
    {
        Self::Address(value)
    }
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescription
{
    pub name: String,
    pub parameter_type: ParameterType,
    pub required: bool,
    /// Used when an optional parameter is omitted; its type must match
    pub default_value: ParameterValue,
    /// Short label for prompts, e.g. "Command Line"
    pub display: String,
    /// Longer help text
    pub description: String,
}

impl ParameterDescription
{
    /// Describe a parameter.
    ///
    /// ## Panics
    ///
    /// Never; a default of the wrong type is reported by
    /// [`ParameterMap::validate`] when it would be used.
    #[must_use]
    pub fn create(
        parameter_type: ParameterType,
        name: impl Into<String>,
        required: bool,
        default_value: impl Into<ParameterValue>,
        display: impl Into<String>,
        description: impl Into<String>,
    ) -> Self
    {
        Self {
            name: name.into(),
            parameter_type,
            required,
            default_value: default_value.into(),
            display: display.into(),
            description: description.into(),
        }
    }

    fn check(&self, value: &ParameterValue) -> ModelResult<()>
    {
        if value.parameter_type() == self.parameter_type {
            Ok(())
        } else {
            Err(ModelError::InvalidArgument(format!(
                "parameter '{}' expects {} but got {}",
                self.name,
                self.parameter_type,
                value.parameter_type()
            )))
        }
    }
}

/// Argument values keyed by parameter name.
pub type Arguments = BTreeMap<String, ParameterValue>;

/// Parameter schema of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap
{
    parameters: BTreeMap<String, ParameterDescription>,
}

impl ParameterMap
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Build from descriptions; a later duplicate name replaces an earlier one.
    #[must_use]
    pub fn of(descriptions: impl IntoIterator<Item = ParameterDescription>) -> Self
    {
        Self {
            parameters: descriptions.into_iter().map(|desc| (desc.name.clone(), desc)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDescription>
    {
        self.parameters.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescription>
    {
        self.parameters.values()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.parameters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.parameters.is_empty()
    }

    /// Check `arguments` against the schema and fill in defaults.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` for an unknown name, a missing required parameter,
    /// or a value (supplied or default) of the wrong type.
    pub fn validate(&self, arguments: &Arguments) -> ModelResult<Arguments>
    {
        if let Some(extra) = arguments.keys().find(|name| !self.parameters.contains_key(*name)) {
            return Err(ModelError::InvalidArgument(format!("unknown parameter '{extra}'")));
        }

        let mut valid = Arguments::new();
        for desc in self.parameters.values() {
            let value = match arguments.get(&desc.name) {
                Some(value) => value.clone(),
                None if desc.required => {
                    return Err(ModelError::InvalidArgument(format!(
                        "missing required parameter '{}' ({})",
                        desc.name, desc.display
                    )));
                }
                None => desc.default_value.clone(),
            };
            desc.check(&value)?;
            valid.insert(desc.name.clone(), value);
        }
        Ok(valid)
    }
}

/// Split a space-separated command line into arguments.
///
/// Double quotes group words containing spaces; there is no escape syntax.
///
/// ## Errors
///
/// `InvalidArgument` on an unterminated quote.
pub fn split_command_line(line: &str) -> ModelResult<Vec<String>>
{
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(ModelError::InvalidArgument(format!("unterminated quote in {line:?}")));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn launcher_schema() -> ParameterMap
    {
        ParameterMap::of([
            ParameterDescription::create(
                ParameterType::String,
                "args",
                true,
                "",
                "Command Line",
                "space-separated command-line arguments",
            ),
            ParameterDescription::create(ParameterType::Bool, "stop_at_entry", false, true, "Stop at entry", ""),
        ])
    }

    #[test]
    fn test_validate_fills_defaults()
    {
        let mut args = Arguments::new();
        args.insert("args".into(), "echo hi".into());
        let valid = launcher_schema().validate(&args).unwrap();
        assert_eq!(valid.get("stop_at_entry"), Some(&ParameterValue::Bool(true)));
        assert_eq!(valid.get("args").and_then(ParameterValue::as_str), Some("echo hi"));
    }

    #[test]
    fn test_validate_requires_required_even_with_default()
    {
        let err = launcher_schema().validate(&Arguments::new()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidArgument(ref msg) if msg.contains("args")));
    }

    #[test]
    fn test_validate_rejects_wrong_type_and_unknown_names()
    {
        let mut args = Arguments::new();
        args.insert("args".into(), ParameterValue::Int(3));
        assert!(launcher_schema().validate(&args).is_err());

        let mut args = Arguments::new();
        args.insert("args".into(), "ls".into());
        args.insert("cwd".into(), "/tmp".into());
        let err = launcher_schema().validate(&args).unwrap_err();
        assert_eq!(err, ModelError::InvalidArgument("unknown parameter 'cwd'".into()));
    }

    #[test]
    fn test_split_command_line()
    {
        assert_eq!(split_command_line("echo hi").unwrap(), vec!["echo", "hi"]);
        assert_eq!(split_command_line("  a   \"b c\" \"\" ").unwrap(), vec!["a", "b c", ""]);
        assert!(split_command_line("echo \"oops").is_err());
        assert!(split_command_line("   ").unwrap().is_empty());
    }
}
