//! # Matrix Expansion Module / 矩阵展开模块
//!
//! Turns the declared matrix dimensions into the ordered list of legs.
//! Expansion is a Cartesian product in declaration order: the first
//! dimension is the outermost loop and the last one varies fastest.
//!
//! 将声明的矩阵维度展开为有序的分支列表。
//! 展开按声明顺序进行笛卡尔积：第一个维度是最外层循环，最后一个维度变化最快。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named matrix axis with its ordered values.
/// 一个带有有序取值的具名矩阵轴。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixDimension {
    /// The dimension name, e.g. `python-version` / 维度名称
    pub name: String,
    /// The allowed values, in enumeration order / 允许的取值（按枚举顺序）
    pub values: Vec<String>,
}

impl MatrixDimension {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// One concrete assignment of a value to every dimension.
/// 为每个维度分配一个具体取值的组合。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Leg {
    values: Vec<(String, String)>,
}

impl Leg {
    /// Builds a leg from `(dimension, value)` pairs in declaration order.
    pub fn new<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Looks up the value assigned to `dimension`.
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, value)| value.as_str())
    }

    /// True when every `dimension = value` pair of `partial` is part of this leg.
    pub fn matches(&self, partial: &BTreeMap<String, String>) -> bool {
        partial
            .iter()
            .all(|(name, value)| self.get(name) == Some(value.as_str()))
    }

    /// A filesystem and URL safe identifier, e.g. `python-version_3.11-os_ubuntu`.
    pub fn slug(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{}_{}", sanitize(name), sanitize(value)))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Environment variables describing this leg (`MATRIX_<DIMENSION>=<value>`).
    pub fn env_vars(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(name, value)| {
                let key = name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                    .collect::<String>();
                (format!("MATRIX_{key}"), value.clone())
            })
            .collect()
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Number of legs `expand` would produce, without building them.
pub fn leg_count(dimensions: &[MatrixDimension]) -> usize {
    if dimensions.is_empty() {
        return 0;
    }
    dimensions.iter().map(|d| d.values.len()).product()
}

/// Expands the dimensions into the full, ordered set of legs.
///
/// An empty dimension list, or any dimension without values, yields no legs.
///
/// 将维度展开为完整的、有序的分支集合。
/// 维度列表为空或任一维度没有取值时，不产生任何分支。
pub fn expand(dimensions: &[MatrixDimension]) -> Vec<Leg> {
    let total = leg_count(dimensions);
    if total == 0 {
        return Vec::new();
    }

    let mut legs = Vec::with_capacity(total);
    // Odometer over value indices, last dimension fastest.
    let mut cursor = vec![0usize; dimensions.len()];
    loop {
        legs.push(Leg::new(dimensions.iter().zip(&cursor).map(|(dim, &i)| {
            (dim.name.clone(), dim.values[i].clone())
        })));

        let mut axis = dimensions.len();
        loop {
            if axis == 0 {
                return legs;
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < dimensions[axis].values.len() {
                break;
            }
            cursor[axis] = 0;
        }
    }
}
