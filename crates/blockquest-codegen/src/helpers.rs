//! Allow-list of recognized algorithm helper procedures.
//!
//! Procedures whose name (or explicit `FAMILY` field) places them in a known
//! algorithm family get defensive prologue code: type guards on the
//! parameters the family expects, and `input(..)` bindings for expected
//! parameters the author left out. In Pure mode a family procedure with no
//! return expression falls back to the family's neutral result.
//!
//! Name inference is a heuristic: a procedure called `pathological` is a
//! search helper as far as this module is concerned. Authors who need
//! certainty set `FAMILY` on the definition (`"capacity"`, `"search"` or
//! `"none"`).

use serde::{Deserialize, Serialize};

/// Runtime shape a helper parameter is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Number,
    List,
    Map,
    /// Anything goes; bound from input when missing but never guarded.
    Any,
}

/// A parameter a family expects, by conventional name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedParam {
    pub name: &'static str,
    pub kind: ParamKind,
}

/// Algorithm families the compiler knows defaults for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
    /// Capacity-style optimization (knapsack, coin change, subset sum).
    Capacity,
    /// Existence-style graph search (DFS, BFS, Dijkstra, A*).
    Search,
}

const CAPACITY_FRAGMENTS: &[&str] = &["knapsack", "coin", "subset", "capacity", "change"];
const SEARCH_FRAGMENTS: &[&str] = &["dfs", "bfs", "search", "path", "dijkstra", "astar"];

const CAPACITY_PARAMS: &[ExpectedParam] = &[
    ExpectedParam { name: "capacity", kind: ParamKind::Number },
    ExpectedParam { name: "weights", kind: ParamKind::List },
    ExpectedParam { name: "values", kind: ParamKind::List },
];

const SEARCH_PARAMS: &[ExpectedParam] = &[
    ExpectedParam { name: "graph", kind: ParamKind::Map },
    ExpectedParam { name: "start", kind: ParamKind::Any },
];

impl AlgorithmFamily {
    /// Family for a procedure. An explicit `family` tag wins over the name;
    /// the tag `"none"` opts out entirely.
    pub fn classify(name: &str, family: Option<&str>) -> Option<AlgorithmFamily> {
        if let Some(tag) = family.map(str::trim).filter(|t| !t.is_empty()) {
            return match tag.to_ascii_lowercase().as_str() {
                "capacity" => Some(AlgorithmFamily::Capacity),
                "search" => Some(AlgorithmFamily::Search),
                _ => None,
            };
        }
        let lowered = name.to_ascii_lowercase();
        if CAPACITY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
            Some(AlgorithmFamily::Capacity)
        } else if SEARCH_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
            Some(AlgorithmFamily::Search)
        } else {
            None
        }
    }

    /// Parameters the family conventionally takes.
    pub fn expected_params(self) -> &'static [ExpectedParam] {
        match self {
            AlgorithmFamily::Capacity => CAPACITY_PARAMS,
            AlgorithmFamily::Search => SEARCH_PARAMS,
        }
    }

    /// Literal returned in Pure mode when the procedure has no return
    /// expression.
    pub fn fallback_return(self) -> &'static str {
        match self {
            AlgorithmFamily::Capacity => "0",
            AlgorithmFamily::Search => "false",
        }
    }
}

/// Guard statement repairing a mistyped parameter bound to `ident`, if the
/// parameter's kind has one.
pub fn guard(ident: &str, param: ExpectedParam) -> Option<String> {
    match param.kind {
        ParamKind::Number => Some(format!("if (!isNumber({ident})) {{ {ident} = toNumber({ident}); }}")),
        ParamKind::List => Some(format!("if (!isList({ident})) {{ {ident} = []; }}")),
        ParamKind::Map => Some(format!(
            "if (!isMap({ident})) {{ {ident} = input(\"{name}\"); }}",
            name = param.name
        )),
        ParamKind::Any => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_classify_by_fragment() {
        assert_eq!(AlgorithmFamily::classify("Knapsack01", None), Some(AlgorithmFamily::Capacity));
        assert_eq!(AlgorithmFamily::classify("makeChange", None), Some(AlgorithmFamily::Capacity));
        assert_eq!(AlgorithmFamily::classify("DFS", None), Some(AlgorithmFamily::Search));
        assert_eq!(AlgorithmFamily::classify("shortestPath", None), Some(AlgorithmFamily::Search));
        assert_eq!(AlgorithmFamily::classify("sortList", None), None);
    }

    #[test]
    fn explicit_family_overrides_name() {
        assert_eq!(
            AlgorithmFamily::classify("pathological", Some("capacity")),
            Some(AlgorithmFamily::Capacity)
        );
        assert_eq!(AlgorithmFamily::classify("dfs", Some("none")), None);
        assert_eq!(AlgorithmFamily::classify("dfs", Some("  ")), Some(AlgorithmFamily::Search));
    }

    #[test]
    fn guards_per_kind() {
        let [capacity, weights, _] = CAPACITY_PARAMS else { unreachable!() };
        assert_eq!(
            guard("capacity", *capacity).unwrap(),
            "if (!isNumber(capacity)) { capacity = toNumber(capacity); }"
        );
        assert_eq!(guard("w", *weights).unwrap(), "if (!isList(w)) { w = []; }");

        let [graph, start] = SEARCH_PARAMS else { unreachable!() };
        assert_eq!(
            guard("Graph", *graph).unwrap(),
            "if (!isMap(Graph)) { Graph = input(\"graph\"); }"
        );
        assert!(guard("start", *start).is_none());
    }
}
