use std::fmt;
use std::ops::Index;

/// Relative tolerance for the step-multiple check on floats.
const STEP_EPSILON: f64 = 1e-9;

/// A parameter value on its way to the wire.
///
/// `Display` renders the wire form, so `Value::Int(1000)` writes as
/// `1000` and `Value::Text("SIN".into())` as `SIN`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// What to do when a numeric rule is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Reject the call with a [`ValidationError`].
    Strict,
    /// Correct the value, log a warning, and continue.
    Coerce,
}

/// One constraint on one parameter.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Numeric bound check, `min <= value <= max`. Coercion clamps to the
    /// violated bound.
    Range { min: f64, max: f64, policy: Policy },
    /// Whole-multiple-of-step check. Coercion rounds to the nearest
    /// multiple, half-way values rounding up.
    Step { step: f64, policy: Policy },
    /// Membership in an explicit allowed set. Never coerces.
    Choice { allowed: Vec<Value> },
}

impl Rule {
    fn apply(&self, command: &str, arg: &str, value: Value) -> Result<Value, ValidationError> {
        match self {
            Self::Range { min, max, policy } => {
                let v = numeric(arg, &value)?;
                if v >= *min && v <= *max {
                    return Ok(value);
                }
                match policy {
                    Policy::Strict => Err(ValidationError::OutOfRange {
                        arg: arg.to_string(),
                        value: v,
                        min: *min,
                        max: *max,
                    }),
                    Policy::Coerce => {
                        let corrected = v.clamp(*min, *max);
                        log::warn!(
                            "{command}: '{arg}' = {v} is outside {min}..={max}, clamping to {corrected}"
                        );
                        Ok(renumber(&value, corrected))
                    }
                }
            }
            Self::Step { step, policy } => {
                let v = numeric(arg, &value)?;
                if on_step(v, *step) {
                    return Ok(value);
                }
                match policy {
                    Policy::Strict => Err(ValidationError::OffStep {
                        arg: arg.to_string(),
                        value: v,
                        step: *step,
                    }),
                    Policy::Coerce => {
                        let corrected = nearest_step(v, *step);
                        log::warn!(
                            "{command}: '{arg}' = {v} is not a multiple of {step}, rounding to {corrected}"
                        );
                        Ok(renumber(&value, corrected))
                    }
                }
            }
            Self::Choice { allowed } => {
                if allowed.contains(&value) {
                    Ok(value)
                } else {
                    Err(ValidationError::NotAllowed {
                        arg: arg.to_string(),
                        value,
                        allowed: allowed.clone(),
                    })
                }
            }
        }
    }
}

fn numeric(arg: &str, value: &Value) -> Result<f64, ValidationError> {
    // NaN and infinities defeat the range comparisons and have no wire
    // form, so they are rejected up front rather than clamped or rounded.
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::NotNumeric {
            arg: arg.to_string(),
            value: value.clone(),
        }),
    }
}

/// Keep a corrected value integral when the input was integral and the
/// correction round-trips through i64 exactly.
fn renumber(original: &Value, corrected: f64) -> Value {
    let exact_int = corrected.fract() == 0.0 && corrected.abs() < 2f64.powi(63);
    match original {
        Value::Int(_) if exact_int => Value::Int(corrected as i64),
        _ => Value::Float(corrected),
    }
}

fn on_step(value: f64, step: f64) -> bool {
    if step == 0.0 {
        return true;
    }
    let ratio = value / step;
    (ratio - ratio.round()).abs() <= STEP_EPSILON * ratio.abs().max(1.0)
}

fn nearest_step(value: f64, step: f64) -> f64 {
    if step == 0.0 {
        return value;
    }
    let ratio = value / step;
    (ratio + 0.5).floor() * step
}

/// A [`Rule`] bound to a parameter name.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    arg: String,
    rule: Rule,
}

impl ValidationRule {
    /// Strict range check.
    pub fn range(arg: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            arg: arg.into(),
            rule: Rule::Range {
                min,
                max,
                policy: Policy::Strict,
            },
        }
    }

    /// Permissive range check: out-of-range values clamp with a warning.
    pub fn range_clamped(arg: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            arg: arg.into(),
            rule: Rule::Range {
                min,
                max,
                policy: Policy::Coerce,
            },
        }
    }

    /// Strict step-multiple check.
    pub fn step(arg: impl Into<String>, step: f64) -> Self {
        Self {
            arg: arg.into(),
            rule: Rule::Step {
                step,
                policy: Policy::Strict,
            },
        }
    }

    /// Permissive step check: off-step values round to the nearest
    /// multiple with a warning, ties rounding up.
    pub fn step_rounded(arg: impl Into<String>, step: f64) -> Self {
        Self {
            arg: arg.into(),
            rule: Rule::Step {
                step,
                policy: Policy::Coerce,
            },
        }
    }

    /// Membership check against an allowed set.
    pub fn choice<I, V>(arg: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            arg: arg.into(),
            rule: Rule::Choice {
                allowed: allowed.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn arg(&self) -> &str {
        &self.arg
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Parameter '{arg}' expects a numeric value, got '{value}'")]
    NotNumeric { arg: String, value: Value },

    #[error("Parameter '{arg}' is out of range: {value} is not within {min}..={max}")]
    OutOfRange {
        arg: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Parameter '{arg}' must be a multiple of {step}, got {value}")]
    OffStep { arg: String, value: f64, step: f64 },

    #[error("Parameter '{arg}' must be one of {allowed:?}, got '{value}'")]
    NotAllowed {
        arg: String,
        value: Value,
        allowed: Vec<Value>,
    },
}

/// A call that does not fit the command's declared parameters.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Rule on command '{command}' names unknown parameter '{arg}'")]
    UnknownParameter { command: String, arg: String },

    #[error("Command '{command}' is missing required argument '{arg}'")]
    MissingArgument { command: String, arg: String },

    #[error("Command '{command}' takes at most {max} arguments, got {got}")]
    TooManyArguments {
        command: String,
        max: usize,
        got: usize,
    },

    #[error("Command '{command}' has no parameter named '{name}'")]
    UnknownArgument { command: String, name: String },

    #[error("Command '{command}' got multiple values for '{name}'")]
    DuplicateArgument { command: String, name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone)]
struct ParamDef {
    name: String,
    default: Option<Value>,
}

/// Declarative parameter contract for one instrument command.
///
/// Parameters are declared in call order; rules run in declaration order
/// once the arguments are bound, coercing in place under a permissive
/// policy. Checking is idempotent: feeding a checked result back through
/// yields the same values.
///
/// ```
/// use labwire::{CommandGuard, ValidationRule, Value};
///
/// let guard = CommandGuard::new("select_correlation_scaling")
///     .param("n")
///     .param_default("scale", 0)
///     .rule(ValidationRule::choice("n", [1, 2, 5]))
///     .rule(ValidationRule::range("scale", 0.0, 31.0));
///
/// let args = guard.check(&[Value::Int(5)], &[])?;
/// assert_eq!(args["n"], Value::Int(5));
/// assert_eq!(args["scale"], Value::Int(0));
/// # Ok::<(), labwire::GuardError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandGuard {
    name: String,
    params: Vec<ParamDef>,
    rules: Vec<ValidationRule>,
}

impl CommandGuard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Declare a required parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare a parameter with a default used when the caller omits it.
    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Attach a rule. A rule naming an undeclared parameter fails every
    /// `check` with [`ContractError::UnknownParameter`].
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `positional` and `named` arguments against the declared
    /// parameters, then apply every rule in order.
    pub fn check(
        &self,
        positional: &[Value],
        named: &[(&str, Value)],
    ) -> Result<BoundArgs, GuardError> {
        // Definition bugs surface before any call-shape errors.
        let mut rule_slots = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let slot = self
                .params
                .iter()
                .position(|p| p.name == rule.arg)
                .ok_or_else(|| ContractError::UnknownParameter {
                    command: self.name.clone(),
                    arg: rule.arg.clone(),
                })?;
            rule_slots.push(slot);
        }

        if positional.len() > self.params.len() {
            return Err(ContractError::TooManyArguments {
                command: self.name.clone(),
                max: self.params.len(),
                got: positional.len(),
            }
            .into());
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(positional) {
            *slot = Some(value.clone());
        }
        for (name, value) in named {
            let idx = self
                .params
                .iter()
                .position(|p| p.name == *name)
                .ok_or_else(|| ContractError::UnknownArgument {
                    command: self.name.clone(),
                    name: (*name).to_string(),
                })?;
            if slots[idx].is_some() {
                return Err(ContractError::DuplicateArgument {
                    command: self.name.clone(),
                    name: (*name).to_string(),
                }
                .into());
            }
            slots[idx] = Some(value.clone());
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(ContractError::MissingArgument {
                            command: self.name.clone(),
                            arg: param.name.clone(),
                        }
                        .into())
                    }
                },
            };
            values.push((param.name.clone(), value));
        }

        for (rule, &slot) in self.rules.iter().zip(&rule_slots) {
            let current = values[slot].1.clone();
            values[slot].1 = rule.rule.apply(&self.name, &rule.arg, current)?;
        }

        Ok(BoundArgs { values })
    }

    /// Validate, then hand the bound arguments to `body`.
    pub fn apply<T>(
        &self,
        positional: &[Value],
        named: &[(&str, Value)],
        body: impl FnOnce(&BoundArgs) -> T,
    ) -> Result<T, GuardError> {
        let bound = self.check(positional, named)?;
        Ok(body(&bound))
    }
}

/// Arguments after binding and rule application, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
    values: Vec<(String, Value)>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<&str> for BoundArgs {
    type Output = Value;

    /// `get` is the checked form; indexing an undeclared name panics.
    fn index(&self, name: &str) -> &Self::Output {
        self.get(name).expect("no argument with that name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaling_guard(policy_strict: bool) -> CommandGuard {
        let range = if policy_strict {
            ValidationRule::range("scale", 0.0, 31.0)
        } else {
            ValidationRule::range_clamped("scale", 0.0, 31.0)
        };
        CommandGuard::new("select_correlation_scaling")
            .param("n")
            .param_default("scale", 0)
            .rule(ValidationRule::choice("n", [1, 2, 5]))
            .rule(range)
    }

    #[test]
    fn test_defaults_fill_omitted_arguments() {
        let guard = scaling_guard(true);
        let args = guard.check(&[Value::Int(1)], &[]).unwrap();
        assert_eq!(args["scale"], Value::Int(0));
    }

    #[test]
    fn test_named_arguments_bind_by_name() {
        let guard = scaling_guard(true);
        let args = guard
            .check(&[Value::Int(2)], &[("scale", Value::Int(7))])
            .unwrap();
        assert_eq!(args["n"], Value::Int(2));
        assert_eq!(args["scale"], Value::Int(7));
    }

    #[test]
    fn test_strict_range_rejects() {
        let guard = scaling_guard(true);
        let err = guard
            .check(&[Value::Int(1), Value::Int(40)], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_permissive_range_clamps_toward_violated_bound() {
        let guard = scaling_guard(false);
        let args = guard.check(&[Value::Int(1), Value::Int(40)], &[]).unwrap();
        assert_eq!(args["scale"], Value::Int(31));

        let args = guard
            .check(&[Value::Int(1), Value::Int(-3)], &[])
            .unwrap();
        assert_eq!(args["scale"], Value::Int(0));
    }

    #[test]
    fn test_strict_step_rejects_off_multiples() {
        let guard = CommandGuard::new("set_frequency")
            .param("freq")
            .rule(ValidationRule::step("freq", 5.0));
        let err = guard.check(&[Value::Int(6)], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::OffStep { .. })
        ));
    }

    #[test]
    fn test_step_accepts_exact_float_multiples() {
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::step("level", 0.01));
        // 3.27 / 0.01 is not exact in binary but is a whole multiple.
        assert!(guard.check(&[Value::Float(3.27)], &[]).is_ok());
    }

    #[test]
    fn test_permissive_step_rounds_to_nearest() {
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::step_rounded("level", 0.25));
        let args = guard.check(&[Value::Float(3.1)], &[]).unwrap();
        assert_eq!(args["level"], Value::Float(3.0));
    }

    #[test]
    fn test_permissive_step_rounds_ties_up() {
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::step_rounded("level", 0.5));
        let args = guard.check(&[Value::Float(1.25)], &[]).unwrap();
        assert_eq!(args["level"], Value::Float(1.5));
    }

    #[test]
    fn test_coerced_integers_stay_integers() {
        let guard = CommandGuard::new("set_offset")
            .param("offset")
            .rule(ValidationRule::range_clamped("offset", 0.0, 32767.0));
        let args = guard.check(&[Value::Int(50_000)], &[]).unwrap();
        assert_eq!(args["offset"], Value::Int(32767));
    }

    #[test]
    fn test_correction_beyond_i64_range_stays_float() {
        // A clamp bound above i64::MAX must not saturate the integer path.
        let guard = CommandGuard::new("set_counter_limit")
            .param("limit")
            .rule(ValidationRule::range_clamped("limit", 2e19, 3e19));
        let args = guard.check(&[Value::Int(5)], &[]).unwrap();
        assert_eq!(args["limit"], Value::Float(2e19));
    }

    #[test]
    fn test_choice_rejects_without_coercion() {
        let guard = scaling_guard(false);
        let err = guard.check(&[Value::Int(3)], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_choice_over_text_values() {
        let guard = CommandGuard::new("set_function")
            .param("shape")
            .rule(ValidationRule::choice("shape", ["SIN", "SQU", "RAMP"]));
        assert!(guard.check(&[Value::from("SQU")], &[]).is_ok());
        assert!(guard.check(&[Value::from("NOISE")], &[]).is_err());
    }

    #[test]
    fn test_text_value_under_numeric_rule() {
        let guard = CommandGuard::new("set_frequency")
            .param("freq")
            .rule(ValidationRule::range("freq", 0.0, 1e6));
        let err = guard.check(&[Value::from("fast")], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_non_finite_value_is_rejected_not_clamped() {
        let guard = CommandGuard::new("set_amplitude")
            .param("amplitude")
            .rule(ValidationRule::range_clamped("amplitude", 0.01, 10.0));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = guard.check(&[Value::Float(bad)], &[]).unwrap_err();
            assert!(matches!(
                err,
                GuardError::Validation(ValidationError::NotNumeric { .. })
            ));
        }
    }

    #[test]
    fn test_non_finite_value_is_rejected_not_rounded() {
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::step_rounded("level", 0.5));
        let err = guard.check(&[Value::Float(f64::NAN)], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Validation(ValidationError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_rule_on_undeclared_parameter_is_a_contract_error() {
        let guard = CommandGuard::new("restart").rule(ValidationRule::range("n", 0.0, 1.0));
        let err = guard.check(&[], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Contract(ContractError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_call_shape_errors() {
        let guard = scaling_guard(true);

        let err = guard.check(&[], &[]).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Contract(ContractError::MissingArgument { .. })
        ));

        let err = guard
            .check(&[Value::Int(1), Value::Int(0), Value::Int(9)], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::Contract(ContractError::TooManyArguments { .. })
        ));

        let err = guard
            .check(&[Value::Int(1)], &[("gain", Value::Int(2))])
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::Contract(ContractError::UnknownArgument { .. })
        ));

        let err = guard
            .check(&[Value::Int(1)], &[("n", Value::Int(2))])
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::Contract(ContractError::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn test_checking_is_idempotent() {
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::range_clamped("level", 0.0, 31.0))
            .rule(ValidationRule::step_rounded("level", 0.5));

        let once = guard.check(&[Value::Float(44.4)], &[]).unwrap();
        let level = once["level"].clone();
        let twice = guard.check(&[level], &[]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rules_run_in_declared_order() {
        // Clamp first (44 -> 31), then round to the step (31 -> 32). The
        // reverse order would give 31; later rules see earlier coercions.
        let guard = CommandGuard::new("set_attenuation")
            .param("level")
            .rule(ValidationRule::range_clamped("level", 0.0, 31.0))
            .rule(ValidationRule::step_rounded("level", 2.0));
        let args = guard.check(&[Value::Int(44)], &[]).unwrap();
        assert_eq!(args["level"], Value::Int(32));
    }

    #[test]
    fn test_apply_composes_validation_and_invocation() {
        let guard = CommandGuard::new("select_integration_time")
            .param_default("integ_time", 5)
            .rule(ValidationRule::choice("integ_time", [5, 10]));

        let wire = guard
            .apply(&[], &[], |args| format!("set_iplen={}", args["integ_time"]))
            .unwrap();
        assert_eq!(wire, "set_iplen=5");
    }
}
