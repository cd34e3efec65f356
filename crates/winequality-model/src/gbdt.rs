//! Gradient-boosted tree ensembles in LightGBM text format
//!
//! Reads the plain-text dump written by `Booster.save_model()` and evaluates
//! it with LightGBM's numerical decision rules:
//!
//! ```text
//! tree
//! version=v4
//! num_class=1
//! max_feature_idx=10
//! objective=regression
//! feature_names=fixed_acidity volatile_acidity ...
//!
//! Tree=0
//! num_leaves=3
//! split_feature=10 1
//! threshold=9.55 0.585
//! decision_type=2 2
//! left_child=1 -1
//! right_child=-2 -3
//! leaf_value=5.4 5.9 5.2
//! ...
//! end of trees
//! ```
//!
//! Only single-output regression models with numerical splits are
//! supported. Categorical splits and linear trees are rejected at load time.

use crate::regressor::{FeatureMatrix, Regressor};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use winequality_core::{feature_names, Error, Result, FEATURE_COUNT};

const CATEGORICAL_MASK: u8 = 1;
const DEFAULT_LEFT_MASK: u8 = 2;

const MISSING_ZERO: u8 = 1;
const MISSING_NAN: u8 = 2;

const ZERO_THRESHOLD: f64 = 1e-35;

/// Errors raised while reading a LightGBM text model
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("not a LightGBM text model (expected 'tree' header)")]
    NotLightGbm,

    #[error("missing header key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("tree {tree}: missing field '{field}'")]
    MissingTreeField { tree: usize, field: &'static str },

    #[error("tree {tree}: {msg}")]
    InvalidTree { tree: usize, msg: String },

    #[error("model contains no trees")]
    Empty,

    #[error("unsupported model: {0}")]
    Unsupported(String),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::model(err.to_string())
    }
}

/// Output transform implied by the training objective
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Objective {
    /// Raw score is the prediction
    Identity(String),
    /// Trained on square-rooted labels; the prediction is `sign(score) * score²`
    SignedSquare(String),
    /// Raw score is a log-mean; the prediction is `exp(score)`
    Exp(String),
}

impl Objective {
    fn parse(line: Option<&str>) -> std::result::Result<Self, ParseError> {
        // Custom objectives leave no objective line; scores are raw
        let Some(line) = line else {
            return Ok(Self::Identity("custom".to_string()));
        };

        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let sqrt = tokens.any(|token| token == "sqrt");
        match name {
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse"
            | "regression_l1" | "l1" | "mean_absolute_error" | "mae" | "huber" | "fair"
            | "quantile" | "mape"
                if sqrt =>
            {
                Ok(Self::SignedSquare(name.to_string()))
            }
            "regression" | "regression_l2" | "l2" | "mean_squared_error" | "mse"
            | "regression_l1" | "l1" | "mean_absolute_error" | "mae" | "huber" | "fair"
            | "quantile" | "mape" | "custom" => Ok(Self::Identity(name.to_string())),
            "poisson" | "gamma" | "tweedie" => Ok(Self::Exp(name.to_string())),
            other => Err(ParseError::Unsupported(format!(
                "objective '{other}' does not produce a point estimate"
            ))),
        }
    }

    /// Name as written in the model file
    pub fn name(&self) -> &str {
        match self {
            Self::Identity(name) | Self::SignedSquare(name) | Self::Exp(name) => name,
        }
    }

    fn apply(&self, score: f64) -> f64 {
        match self {
            Self::Identity(_) => score,
            Self::SignedSquare(_) => score.signum() * score * score,
            Self::Exp(_) => score.exp(),
        }
    }
}

/// One regression tree with numerical splits
#[derive(Debug, Clone)]
struct Tree {
    split_feature: Vec<usize>,
    threshold: Vec<f64>,
    decision_type: Vec<u8>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
}

impl Tree {
    fn parse(
        index: usize,
        fields: &HashMap<&str, &str>,
        num_features: usize,
    ) -> std::result::Result<Self, ParseError> {
        let num_leaves: usize = parse_scalar(fields, "num_leaves")
            .ok_or(ParseError::MissingTreeField {
                tree: index,
                field: "num_leaves",
            })??;

        if num_leaves == 0 {
            return Err(ParseError::InvalidTree {
                tree: index,
                msg: "num_leaves must be at least 1".to_string(),
            });
        }

        let num_cat: usize = parse_scalar(fields, "num_cat").transpose()?.unwrap_or(0);
        if num_cat > 0 {
            return Err(ParseError::Unsupported(format!(
                "tree {index} uses categorical splits"
            )));
        }

        let is_linear: u8 = parse_scalar(fields, "is_linear").transpose()?.unwrap_or(0);
        if is_linear != 0 {
            return Err(ParseError::Unsupported(format!("tree {index} is a linear tree")));
        }

        // Stumps may omit their empty split arrays
        let stump = num_leaves == 1;
        let tree = Self {
            split_feature: parse_array(tree_field(fields, index, "split_feature", stump)?)?,
            threshold: parse_array(tree_field(fields, index, "threshold", stump)?)?,
            decision_type: parse_array(tree_field(fields, index, "decision_type", stump)?)?,
            left_child: parse_array(tree_field(fields, index, "left_child", stump)?)?,
            right_child: parse_array(tree_field(fields, index, "right_child", stump)?)?,
            leaf_value: parse_array(tree_field(fields, index, "leaf_value", false)?)?,
        };

        tree.check(index, num_leaves, num_features)?;
        Ok(tree)
    }

    fn check(
        &self,
        index: usize,
        num_leaves: usize,
        num_features: usize,
    ) -> std::result::Result<(), ParseError> {
        let invalid = |msg: String| ParseError::InvalidTree { tree: index, msg };
        let internal = num_leaves - 1;

        for (name, len) in [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ] {
            if len != internal {
                return Err(invalid(format!(
                    "{name} has {len} entries, expected {internal}"
                )));
            }
        }
        if self.leaf_value.len() != num_leaves {
            return Err(invalid(format!(
                "leaf_value has {} entries, expected {num_leaves}",
                self.leaf_value.len()
            )));
        }

        if let Some(feature) = self.split_feature.iter().find(|&&f| f >= num_features) {
            return Err(invalid(format!(
                "split on feature {feature}, but the model has {num_features} features"
            )));
        }
        if self.decision_type.iter().any(|dt| dt & CATEGORICAL_MASK != 0) {
            return Err(ParseError::Unsupported(format!(
                "tree {index} uses categorical splits"
            )));
        }

        for &child in self.left_child.iter().chain(&self.right_child) {
            let in_range = if child >= 0 {
                (child as usize) < internal
            } else {
                (!child as usize) < num_leaves
            };
            if !in_range {
                return Err(invalid(format!("child index {child} out of range")));
            }
        }

        Ok(())
    }

    fn go_left(&self, node: usize, value: f64) -> bool {
        let decision = self.decision_type[node];
        let missing = (decision >> 2) & 3;

        let value = if value.is_nan() && missing != MISSING_NAN {
            0.0
        } else {
            value
        };

        if (missing == MISSING_ZERO && value.abs() <= ZERO_THRESHOLD)
            || (missing == MISSING_NAN && value.is_nan())
        {
            return decision & DEFAULT_LEFT_MASK != 0;
        }

        value <= self.threshold[node]
    }

    fn predict(&self, row: &[f64]) -> Result<f64> {
        if self.split_feature.is_empty() {
            return Ok(self.leaf_value[0]);
        }

        let mut node = 0usize;
        // A well-formed tree reaches a leaf in at most `internal` steps
        for _ in 0..=self.split_feature.len() {
            let child = if self.go_left(node, row[self.split_feature[node]]) {
                self.left_child[node]
            } else {
                self.right_child[node]
            };

            if child < 0 {
                return Ok(self.leaf_value[!child as usize]);
            }
            node = child as usize;
        }

        Err(Error::inference("tree traversal did not reach a leaf"))
    }
}

/// A LightGBM gradient-boosted regression ensemble
#[derive(Debug, Clone)]
pub struct GbdtModel {
    version: Option<String>,
    objective: Objective,
    feature_names: Vec<String>,
    average_output: bool,
    trees: Vec<Tree>,
}

impl GbdtModel {
    /// Load a model from a LightGBM text dump on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::model(format!("Failed to read model file {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    /// Number of trees in the ensemble
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Training objective
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Feature names recorded in the model, in column order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// LightGBM format version, if recorded
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let mut score = 0.0;
        for tree in &self.trees {
            score += tree.predict(row)?;
        }
        if self.average_output {
            score /= self.trees.len() as f64;
        }
        Ok(self.objective.apply(score))
    }
}

impl FromStr for GbdtModel {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        Ok(parse_model(content)?)
    }
}

impl Regressor for GbdtModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        features.ensure_cols(FEATURE_COUNT)?;
        features.iter_rows().map(|row| self.predict_row(row)).collect()
    }

    fn attributes(&self) -> Vec<&'static str> {
        vec!["predict", "num_trees", "objective", "feature_names", "version"]
    }
}

fn parse_model(content: &str) -> std::result::Result<GbdtModel, ParseError> {
    let mut lines = content.lines().map(str::trim);

    if lines.by_ref().find(|l| !l.is_empty()) != Some("tree") {
        return Err(ParseError::NotLightGbm);
    }

    let mut header: HashMap<&str, &str> = HashMap::new();
    let mut flags: Vec<&str> = Vec::new();
    let mut blocks: Vec<HashMap<&str, &str>> = Vec::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if line == "end of trees" {
            break;
        }
        if line.starts_with("Tree=") {
            blocks.push(HashMap::new());
            continue;
        }

        let target = blocks.last_mut().unwrap_or(&mut header);
        match line.split_once('=') {
            Some((key, value)) => {
                target.insert(key.trim(), value.trim());
            }
            None => flags.push(line),
        }
    }

    let num_class: usize = parse_scalar(&header, "num_class").transpose()?.unwrap_or(1);
    if num_class != 1 {
        return Err(ParseError::Unsupported(format!(
            "{num_class}-class model, expected a single regression output"
        )));
    }

    let max_feature_idx: usize = parse_scalar(&header, "max_feature_idx")
        .ok_or(ParseError::MissingKey("max_feature_idx"))??;
    let num_features = max_feature_idx + 1;
    if num_features != FEATURE_COUNT {
        return Err(ParseError::Unsupported(format!(
            "model was trained on {num_features} features, expected {FEATURE_COUNT}"
        )));
    }

    let feature_names: Vec<String> = header
        .get("feature_names")
        .map(|names| names.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    check_feature_order(&feature_names)?;

    let objective = Objective::parse(header.get("objective").copied())?;

    if blocks.is_empty() {
        return Err(ParseError::Empty);
    }
    let trees = blocks
        .iter()
        .enumerate()
        .map(|(index, fields)| Tree::parse(index, fields, num_features))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(
        trees = trees.len(),
        objective = objective.name(),
        "Parsed LightGBM model"
    );

    Ok(GbdtModel {
        version: header.get("version").map(|v| v.to_string()),
        objective,
        feature_names,
        average_output: flags.contains(&"average_output"),
        trees,
    })
}

/// Reject models whose named features are the known fields in another order
fn check_feature_order(names: &[String]) -> std::result::Result<(), ParseError> {
    if names.len() != FEATURE_COUNT {
        return Ok(());
    }

    let known = |name: &String| feature_names().any(|f| f.eq_ignore_ascii_case(name));
    if !names.iter().all(known) {
        return Ok(());
    }

    let in_order = names
        .iter()
        .zip(feature_names())
        .all(|(name, expected)| name.eq_ignore_ascii_case(expected));
    if in_order {
        Ok(())
    } else {
        Err(ParseError::Unsupported(format!(
            "feature order [{}] does not match [{}]",
            names.join(", "),
            feature_names().collect::<Vec<_>>().join(", ")
        )))
    }
}

fn parse_scalar<T: FromStr>(
    fields: &HashMap<&str, &str>,
    key: &'static str,
) -> Option<std::result::Result<T, ParseError>> {
    fields.get(key).map(|value| {
        value.parse().map_err(|_| ParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    })
}

fn tree_field<'a>(
    fields: &HashMap<&str, &'a str>,
    tree: usize,
    field: &'static str,
    optional: bool,
) -> std::result::Result<(&'static str, &'a str), ParseError> {
    match fields.get(field) {
        Some(value) => Ok((field, *value)),
        None if optional => Ok((field, "")),
        None => Err(ParseError::MissingTreeField { tree, field }),
    }
}

fn parse_array<T: FromStr>(
    (key, value): (&str, &str),
) -> std::result::Result<Vec<T>, ParseError> {
    value
        .split_whitespace()
        .map(|item| {
            item.parse().map_err(|_| ParseError::InvalidValue {
                key: key.to_string(),
                value: item.to_string(),
            })
        })
        .collect()
}
