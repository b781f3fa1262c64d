//! Rule Definitions

use crate::params::ParamReader;
use crate::{
    Bounds, CheckParams, ErvEfficiencyParams, ExpressionParams, FlatlineParams, HuntingParams,
    InputBounds, InvalidParameterError, OaFractionParams, ParamValue, Params, RuleLoadError,
    UnitScale, UnitSystem, ROLLING_WINDOW_PARAM,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of check a rule runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CheckType {
    Bounds,
    Flatline,
    #[default]
    Expression,
    Hunting,
    OaFraction,
    ErvEfficiency,
}

impl CheckType {
    pub const ALL: [CheckType; 6] = [
        CheckType::Bounds,
        CheckType::Flatline,
        CheckType::Expression,
        CheckType::Hunting,
        CheckType::OaFraction,
        CheckType::ErvEfficiency,
    ];

    /// Declaration name (`type:` field)
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::Bounds => "bounds",
            CheckType::Flatline => "flatline",
            CheckType::Expression => "expression",
            CheckType::Hunting => "hunting",
            CheckType::OaFraction => "oa_fraction",
            CheckType::ErvEfficiency => "erv_efficiency",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One declared input of a rule
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// Input key; also the alias in expressions
    pub role: String,
    /// Literal data column; defaults to the key
    pub column: Option<String>,
    /// BRICK class used for column-map lookup and check roles
    pub brick: Option<String>,
    pub bounds: Option<Bounds>,
    /// Scale of the signal; each check picks a default when unset
    pub unit_scale: Option<UnitScale>,
    /// Whether the rule needs this input to run
    pub required: bool,
}

impl InputSpec {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            column: None,
            brick: None,
            bounds: None,
            unit_scale: None,
            required: true,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn brick(mut self, brick: impl Into<String>) -> Self {
        self.brick = Some(brick.into());
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn unit_scale(mut self, scale: UnitScale) -> Self {
        self.unit_scale = Some(scale);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Column name used when no column map entry applies
    pub fn literal_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.role)
    }

    /// Whether the key or the BRICK class equals `name`
    pub fn matches(&self, name: &str) -> bool {
        self.role == name || self.brick.as_deref() == Some(name)
    }

    /// BRICK class, or the key when none is declared
    pub fn label(&self) -> &str {
        self.brick.as_deref().unwrap_or(&self.role)
    }
}

/// A named fault check over a table.
///
/// Built from a declaration or [`Rule::builder`]; parameters are validated
/// at construction and the rule is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleDeclaration", into = "RuleDeclaration")]
pub struct Rule {
    name: String,
    flag_name: String,
    check_type: CheckType,
    description: Option<String>,
    equipment_type: Vec<String>,
    inputs: Vec<InputSpec>,
    bounds: Option<Bounds>,
    params: Params,
    expression: Option<String>,
    rolling_window_size: Option<usize>,
}

impl Rule {
    pub fn builder(name: impl Into<String>, check_type: CheckType) -> RuleBuilder {
        RuleBuilder::new(name.into(), check_type)
    }

    /// Parse one YAML (or JSON) rule declaration
    pub fn from_yaml_str(text: &str) -> Result<Self, RuleLoadError> {
        Self::from_yaml_with_origin(text, "<inline>")
    }

    pub(crate) fn from_yaml_with_origin(text: &str, origin: &str) -> Result<Self, RuleLoadError> {
        let declaration: RuleDeclaration =
            serde_yaml::from_str(text).map_err(|e| RuleLoadError::Parse {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        Rule::try_from(declaration)
    }

    /// Serialize back to a YAML declaration
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&RuleDeclaration::from(self.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output flag column name
    pub fn flag_name(&self) -> &str {
        &self.flag_name
    }

    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Equipment types the rule applies to; empty means all
    pub fn equipment_type(&self) -> &[String] {
        &self.equipment_type
    }

    /// Inputs in declaration order
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    pub fn input(&self, role: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.role == role)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Consecutive samples required before the flag is raised
    pub fn rolling_window_size(&self) -> Option<usize> {
        self.rolling_window_size
    }

    /// Whether the rule applies to any of the given equipment types
    pub fn applies_to(&self, types: &[&str]) -> bool {
        self.equipment_type.is_empty()
            || self
                .equipment_type
                .iter()
                .any(|t| types.iter().any(|wanted| t == wanted))
    }

    /// Per-input bounds for a unit system.
    ///
    /// An input's own bounds win over the rule-level bounds; inputs with
    /// neither are left out. Bounds split per unit system must declare the
    /// requested one.
    pub fn bounds_for(&self, units: UnitSystem) -> Result<Vec<InputBounds>, RuleLoadError> {
        let mut out = Vec::new();
        for input in &self.inputs {
            let Some(bounds) = input.bounds.as_ref().or(self.bounds.as_ref()) else {
                continue;
            };
            let (low, high) =
                bounds
                    .for_units(units)
                    .ok_or_else(|| RuleLoadError::MissingUnitBounds {
                        rule: self.name.clone(),
                        role: input.role.clone(),
                        units,
                    })?;
            out.push(InputBounds {
                role: input.role.clone(),
                label: input.label().to_string(),
                low,
                high,
            });
        }
        Ok(out)
    }

    /// Typed parameters for evaluation.
    ///
    /// `overrides` are run-level params merged over the rule's own.
    pub fn check_params(
        &self,
        units: UnitSystem,
        overrides: &Params,
    ) -> Result<CheckParams, InvalidParameterError> {
        let merged;
        let params = if overrides.is_empty() {
            &self.params
        } else {
            let mut combined = self.params.clone();
            combined.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged = combined;
            &merged
        };
        let reader = ParamReader::new(&self.name, params);

        Ok(match self.check_type {
            CheckType::Bounds => {
                let bounds = self.bounds_for(units).map_err(|e| {
                    InvalidParameterError::new(&self.name, "bounds", e.to_string())
                })?;
                if bounds.is_empty() {
                    return Err(InvalidParameterError::new(
                        &self.name,
                        "bounds",
                        "bounds rule declares no bounds on any input",
                    ));
                }
                CheckParams::Bounds(bounds)
            }
            CheckType::Flatline => CheckParams::Flatline(FlatlineParams::read(&reader)?),
            CheckType::Expression => CheckParams::Expression(ExpressionParams::read(
                &reader,
                self.expression.as_deref(),
            )?),
            CheckType::Hunting => CheckParams::Hunting(HuntingParams::read(&reader)?),
            CheckType::OaFraction => CheckParams::OaFraction(OaFractionParams::read(&reader)?),
            CheckType::ErvEfficiency => {
                CheckParams::ErvEfficiency(ErvEfficiencyParams::read(&reader)?)
            }
        })
    }

    /// Unit-independent validation run at construction
    fn validate(&mut self) -> Result<(), RuleLoadError> {
        if self.name.trim().is_empty() {
            return Err(InvalidParameterError::new(&self.name, "name", "rule name is empty").into());
        }

        let declared = self
            .inputs
            .iter()
            .filter_map(|i| i.bounds.as_ref().map(|b| (i.role.as_str(), b)))
            .chain(self.bounds.as_ref().map(|b| ("bounds", b)));
        for (param, bounds) in declared {
            for [lo, hi] in bounds.ranges() {
                if lo.is_nan() || hi.is_nan() || lo > hi {
                    return Err(InvalidParameterError::new(
                        &self.name,
                        param,
                        format!("bounds [{lo}, {hi}] are not ordered"),
                    )
                    .into());
                }
            }
        }

        self.rolling_window_size =
            ParamReader::new(&self.name, &self.params).window(ROLLING_WINDOW_PARAM)?;

        // Bounds resolution depends on the unit system and is checked on load
        if self.check_type != CheckType::Bounds {
            self.check_params(UnitSystem::default(), &Params::new())?;
        }
        Ok(())
    }
}

/// Incremental construction of an in-memory [`Rule`]
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    fn new(name: String, check_type: CheckType) -> Self {
        Self {
            rule: Rule {
                flag_name: default_flag(&name),
                name,
                check_type,
                description: None,
                equipment_type: Vec::new(),
                inputs: Vec::new(),
                bounds: None,
                params: Params::new(),
                expression: None,
                rolling_window_size: None,
            },
        }
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.rule.flag_name = flag.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    pub fn equipment_type(mut self, equipment: impl Into<String>) -> Self {
        self.rule.equipment_type.push(equipment.into());
        self
    }

    pub fn input(mut self, input: InputSpec) -> Self {
        self.rule.inputs.retain(|i| i.role != input.role);
        self.rule.inputs.push(input);
        self
    }

    /// Rule-level bounds for inputs without their own
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.rule.bounds = Some(bounds);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.rule.params.insert(key.into(), value.into());
        self
    }

    pub fn rolling_window_size(self, window: usize) -> Self {
        self.param(ROLLING_WINDOW_PARAM, window as f64)
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.rule.expression = Some(expression.into());
        self
    }

    pub fn build(self) -> Result<Rule, RuleLoadError> {
        let mut rule = self.rule;
        rule.validate()?;
        Ok(rule)
    }
}

fn default_flag(name: &str) -> String {
    format!("{name}_flag")
}

fn default_check_type() -> String {
    CheckType::default().as_str().to_string()
}

/// On-disk form of a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleDeclaration {
    name: String,
    #[serde(rename = "type", default = "default_check_type")]
    check_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equipment_type: Option<OneOrMany>,
    #[serde(default, with = "crate::ordered")]
    inputs: Vec<(String, InputDeclaration)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// An input is either a bare column name or a full spec
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum InputDeclaration {
    Column(String),
    Spec {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brick: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bounds: Option<Bounds>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit_scale: Option<UnitScale>,
        #[serde(default = "default_required", skip_serializing_if = "is_required")]
        required: bool,
    },
}

fn default_required() -> bool {
    true
}

fn is_required(required: &bool) -> bool {
    *required
}

impl TryFrom<RuleDeclaration> for Rule {
    type Error = RuleLoadError;

    fn try_from(decl: RuleDeclaration) -> Result<Self, Self::Error> {
        let check_type =
            decl.check_type
                .parse::<CheckType>()
                .map_err(|check_type| RuleLoadError::UnknownCheckType {
                    rule: decl.name.clone(),
                    check_type,
                })?;

        let inputs = decl
            .inputs
            .into_iter()
            .map(|(role, input)| match input {
                InputDeclaration::Column(column) => InputSpec::new(role).column(column),
                InputDeclaration::Spec {
                    brick,
                    column,
                    bounds,
                    unit_scale,
                    required,
                } => InputSpec {
                    role,
                    column,
                    brick,
                    bounds,
                    unit_scale,
                    required,
                },
            })
            .collect();

        let mut rule = Rule {
            flag_name: decl.flag.unwrap_or_else(|| default_flag(&decl.name)),
            name: decl.name,
            check_type,
            description: decl.description,
            equipment_type: match decl.equipment_type {
                None => Vec::new(),
                Some(OneOrMany::One(t)) => vec![t],
                Some(OneOrMany::Many(ts)) => ts,
            },
            inputs,
            bounds: decl.bounds,
            params: decl.params,
            expression: decl.expression,
            rolling_window_size: None,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<Rule> for RuleDeclaration {
    fn from(rule: Rule) -> Self {
        RuleDeclaration {
            name: rule.name,
            check_type: rule.check_type.as_str().to_string(),
            flag: Some(rule.flag_name),
            description: rule.description,
            equipment_type: (!rule.equipment_type.is_empty())
                .then_some(OneOrMany::Many(rule.equipment_type)),
            inputs: rule
                .inputs
                .into_iter()
                .map(|input| {
                    (
                        input.role,
                        InputDeclaration::Spec {
                            brick: input.brick,
                            column: input.column,
                            bounds: input.bounds,
                            unit_scale: input.unit_scale,
                            required: input.required,
                        },
                    )
                })
                .collect(),
            bounds: rule.bounds,
            params: rule.params,
            expression: rule.expression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS_RULE: &str = r#"
name: sensor_bounds
type: bounds
flag: bad_sensor_flag
equipment_type: AHU
inputs:
  sat:
    brick: Supply_Air_Temperature_Sensor
    bounds: { imperial: [40, 150], metric: [4, 66] }
  rat: "RAT (°F)"
  mat:
    column: mat_temp
bounds: [30, 120]
params:
  rolling_window_size: 5
"#;

    #[test]
    fn test_parse_declaration() {
        let rule = Rule::from_yaml_str(BOUNDS_RULE).unwrap();
        assert_eq!(rule.name(), "sensor_bounds");
        assert_eq!(rule.flag_name(), "bad_sensor_flag");
        assert_eq!(rule.check_type(), CheckType::Bounds);
        assert_eq!(rule.equipment_type(), &["AHU".to_string()]);
        assert_eq!(rule.rolling_window_size(), Some(5));

        let roles: Vec<_> = rule.inputs().iter().map(|i| i.role.as_str()).collect();
        assert_eq!(roles, vec!["sat", "rat", "mat"]);
        assert_eq!(rule.input("rat").unwrap().literal_column(), "RAT (°F)");
        assert_eq!(rule.input("mat").unwrap().literal_column(), "mat_temp");
        assert_eq!(rule.input("sat").unwrap().label(), "Supply_Air_Temperature_Sensor");
    }

    #[test]
    fn test_bounds_for_units() {
        let rule = Rule::from_yaml_str(BOUNDS_RULE).unwrap();
        let metric = rule.bounds_for(UnitSystem::Metric).unwrap();
        assert_eq!(metric.len(), 3);
        assert_eq!((metric[0].low, metric[0].high), (4.0, 66.0));
        // rule-level bounds apply to inputs without their own, whatever the units
        assert_eq!((metric[1].low, metric[1].high), (30.0, 120.0));
    }

    #[test]
    fn test_missing_unit_bounds() {
        let rule = Rule::builder("r", CheckType::Bounds)
            .input(InputSpec::new("sat").bounds(Bounds::PerUnit {
                imperial: Some([40.0, 150.0]),
                metric: None,
            }))
            .build()
            .unwrap();

        assert!(rule.bounds_for(UnitSystem::Imperial).is_ok());
        assert!(matches!(
            rule.bounds_for(UnitSystem::Metric),
            Err(RuleLoadError::MissingUnitBounds { ref role, .. }) if role == "sat"
        ));
        assert!(rule.check_params(UnitSystem::Metric, &Params::new()).is_err());
    }

    #[test]
    fn test_defaults() {
        let rule = Rule::from_yaml_str("name: duct_static\nexpression: a > b\n").unwrap();
        assert_eq!(rule.check_type(), CheckType::Expression);
        assert_eq!(rule.flag_name(), "duct_static_flag");
        assert!(rule.inputs().is_empty());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Rule::from_yaml_str("name: x\ntype: magic\n").unwrap_err();
        assert!(matches!(
            err,
            RuleLoadError::UnknownCheckType { ref check_type, .. } if check_type == "magic"
        ));
    }

    #[test]
    fn test_invalid_params_rejected_at_build() {
        let err = Rule::builder("flat", CheckType::Flatline)
            .input(InputSpec::new("sat"))
            .param("window", -3.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleLoadError::InvalidParameter(ref e) if e.param == "window"));

        let err = Rule::builder("expr", CheckType::Expression).build().unwrap_err();
        assert!(matches!(err, RuleLoadError::InvalidParameter(_)));

        let err = Rule::builder("b", CheckType::Bounds)
            .input(InputSpec::new("sat").bounds(Bounds::Range([90.0, 10.0])))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleLoadError::InvalidParameter(ref e) if e.param == "sat"));
    }

    #[test]
    fn test_overrides_win() {
        let rule = Rule::builder("hunt", CheckType::Hunting)
            .param("delta_os_max", 7.0)
            .build()
            .unwrap();
        let overrides: Params = [("delta_os_max".to_string(), ParamValue::Number(3.0))]
            .into_iter()
            .collect();

        match rule.check_params(UnitSystem::Imperial, &overrides).unwrap() {
            CheckParams::Hunting(p) => assert_eq!(p.delta_os_max, 3.0),
            other => panic!("unexpected params {other:?}"),
        }
        match rule.check_params(UnitSystem::Imperial, &Params::new()).unwrap() {
            CheckParams::Hunting(p) => assert_eq!(p.delta_os_max, 7.0),
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn test_applies_to() {
        let rule = Rule::from_yaml_str(BOUNDS_RULE).unwrap();
        assert!(rule.applies_to(&["AHU", "VAV"]));
        assert!(!rule.applies_to(&["Chiller"]));

        let generic = Rule::from_yaml_str("name: g\nexpression: a\n").unwrap();
        assert!(generic.applies_to(&["Chiller"]));
    }

    #[test]
    fn test_yaml_round_trip() {
        let rule = Rule::from_yaml_str(BOUNDS_RULE).unwrap();
        let yaml = rule.to_yaml_string().unwrap();
        let back = Rule::from_yaml_str(&yaml).unwrap();
        assert_eq!(back, rule);
    }
}
