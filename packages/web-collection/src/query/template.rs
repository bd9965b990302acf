//! Query template expansion.
//!
//! A template such as `"cholera cases {country} {year}"` expands to one
//! concrete query per combination of the values of the variables it
//! references. Placeholders are matched case-insensitively against variable
//! names normalized to lowercase with spaces replaced by underscores.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::types::search::{VariableCombination, VariableSet};

/// A concrete query and the combination that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuery {
    pub query: String,

    /// `None` when the template referenced no known variable.
    pub combination: Option<VariableCombination>,

    /// Normalized names of the referenced variables, aligned with `combination`.
    pub variables: Vec<String>,
}

impl ExpandedQuery {
    fn unexpanded(template: &str) -> Self {
        Self {
            query: template.to_string(),
            combination: None,
            variables: Vec::new(),
        }
    }

    /// Value that `variable` took in this combination, if the template used it.
    pub fn value_of(&self, variable: &str) -> Option<&str> {
        let name = normalize_variable_name(variable);
        let position = self.variables.iter().position(|v| *v == name)?;
        self.combination
            .as_ref()
            .and_then(|combo| combo.get(position))
            .map(String::as_str)
    }
}

/// Lowercase and replace spaces with underscores.
pub fn normalize_variable_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn placeholder(name: &str) -> String {
    format!("{{{name}}}")
}

/// Substitute a combination into a template.
///
/// `variables` are normalized names aligned with `combination`. Every case
/// variant of each placeholder is replaced in a single pass, so substituted
/// values are never scanned for placeholders again.
pub fn substitute(template: &str, variables: &[String], combination: &[String]) -> String {
    if variables.is_empty() {
        return template.to_string();
    }

    let alternation = variables
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    let re = match Regex::new(&format!(r"(?i)\{{({alternation})\}}")) {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "Placeholder pattern did not compile, template left as is");
            return template.to_string();
        }
    };

    re.replace_all(template, |caps: &Captures| {
        let name = caps[1].to_lowercase();
        variables
            .iter()
            .position(|v| *v == name)
            .and_then(|i| combination.get(i))
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Cartesian product of value lists, first list varying slowest.
fn cartesian_product(lists: &[&Vec<String>]) -> Vec<VariableCombination> {
    lists.iter().fold(vec![Vec::new()], |acc, values| {
        acc.iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut combo = prefix.clone();
                    combo.push(value.clone());
                    combo
                })
            })
            .collect()
    })
}

/// Expand templates into concrete queries.
///
/// Every template yields the full Cartesian product over the variables it
/// references (in variable-set order); a template referencing none of them
/// passes through once with a `None` combination. Identical query strings are
/// kept. Variable names that normalize to the same placeholder collapse into
/// one variable: it keeps the first name's position and the last name's values.
pub fn expand_templates<S: AsRef<str>>(
    templates: &[S],
    variables: Option<&VariableSet>,
) -> Vec<ExpandedQuery> {
    let mut normalized: IndexMap<String, &Vec<String>> = IndexMap::new();
    for (name, values) in variables.into_iter().flatten() {
        if let Some(previous) = normalized.insert(normalize_variable_name(name), values) {
            debug!(
                variable = %name,
                replaced = previous.len(),
                "Variable name collides after normalization"
            );
        }
    }

    let mut expanded = Vec::new();

    for template in templates {
        let template = template.as_ref();
        let lowered = template.to_lowercase();

        let referenced: Vec<(&String, &Vec<String>)> = normalized
            .iter()
            .filter(|(name, _)| lowered.contains(&placeholder(name)))
            .map(|(name, values)| (name, *values))
            .collect();

        if referenced.is_empty() {
            expanded.push(ExpandedQuery::unexpanded(template));
            continue;
        }

        let names: Vec<String> = referenced.iter().map(|(name, _)| (*name).clone()).collect();
        let value_lists: Vec<&Vec<String>> = referenced.iter().map(|(_, values)| *values).collect();

        for combination in cartesian_product(&value_lists) {
            expanded.push(ExpandedQuery {
                query: substitute(template, &names, &combination),
                combination: Some(combination),
                variables: names.clone(),
            });
        }
    }

    debug!(
        templates = templates.len(),
        queries = expanded.len(),
        "Expanded query templates"
    );

    expanded
}

/// Expand templates into two aligned sequences: queries and combinations.
pub fn expand_query_templates<S: AsRef<str>>(
    templates: &[S],
    variables: Option<&VariableSet>,
) -> (Vec<String>, Vec<Option<VariableCombination>>) {
    expand_templates(templates, variables)
        .into_iter()
        .map(|e| (e.query, e.combination))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vars(entries: &[(&str, &[&str])]) -> VariableSet {
        entries
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_no_variables_passes_through() {
        let (queries, combos) = expand_query_templates(&["a {country}", "b"], None);
        assert_eq!(queries, vec!["a {country}", "b"]);
        assert_eq!(combos, vec![None, None]);

        let empty = VariableSet::new();
        let (queries, combos) = expand_query_templates(&["a {country}"], Some(&empty));
        assert_eq!(queries, vec!["a {country}"]);
        assert_eq!(combos, vec![None]);
    }

    #[test]
    fn test_mixed_templates() {
        let variables = vars(&[("country", &["A", "B"])]);
        let (queries, combos) =
            expand_query_templates(&["election results", "election {country}"], Some(&variables));

        assert_eq!(queries, vec!["election results", "election A", "election B"]);
        assert_eq!(
            combos,
            vec![None, Some(vec!["A".to_string()]), Some(vec!["B".to_string()])]
        );
    }

    #[test]
    fn test_only_referenced_variables_expand() {
        let variables = vars(&[("country", &["A", "B"]), ("year", &["2020", "2021", "2022"])]);
        let expanded = expand_templates(&["floods in {year}"], Some(&variables));

        assert_eq!(expanded.len(), 3);
        assert!(expanded.iter().all(|e| e.variables == vec!["year"]));
        assert_eq!(expanded[2].query, "floods in 2022");
    }

    #[test]
    fn test_names_normalized_and_case_insensitive() {
        let variables = vars(&[("Disease Name", &["cholera"])]);
        let expanded = expand_templates(&["{DISEASE_NAME} outbreak"], Some(&variables));

        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].query, "cholera outbreak");
        assert_eq!(expanded[0].value_of("disease name"), Some("cholera"));
    }

    #[test]
    fn test_combination_order_follows_variable_set() {
        let variables = vars(&[("country", &["A"]), ("year", &["2020"])]);
        let expanded = expand_templates(&["{year} {country}"], Some(&variables));

        assert_eq!(
            expanded[0].combination,
            Some(vec!["A".to_string(), "2020".to_string()])
        );
        assert_eq!(expanded[0].query, "2020 A");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let variables = vars(&[("x", &["same", "same"])]);
        let (queries, _) = expand_query_templates(&["{x}", "same"], Some(&variables));
        assert_eq!(queries, vec!["same", "same", "same"]);
    }

    #[test]
    fn test_value_with_regex_metacharacters() {
        let variables = vars(&[("city", &["$1 (St. Louis)"])]);
        let (queries, _) = expand_query_templates(&["news {city}"], Some(&variables));
        assert_eq!(queries, vec!["news $1 (St. Louis)"]);
    }

    #[test]
    fn test_colliding_names_collapse_to_last_values() {
        let variables = vars(&[
            ("Country", &["A", "B"]),
            ("year", &["2020"]),
            ("country", &["C", "D"]),
        ]);
        let expanded = expand_templates(&["x {country} {year}"], Some(&variables));

        let queries: Vec<_> = expanded.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["x C 2020", "x D 2020"]);
        assert_eq!(expanded[0].variables, vec!["country", "year"]);
        assert_eq!(
            expanded[1].combination,
            Some(vec!["D".to_string(), "2020".to_string()])
        );
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let variables = vars(&[("a", &["{b}"]), ("b", &["Z"])]);
        let (queries, _) = expand_query_templates(&["{a} {b}"], Some(&variables));
        assert_eq!(queries, vec!["{b} Z"]);

        let names = vec!["a".to_string(), "b".to_string()];
        let combination = vec!["{B}".to_string(), "Z".to_string()];
        assert_eq!(substitute("{A}-{b}", &names, &combination), "{B}-Z");
    }

    proptest! {
        #[test]
        fn prop_expansion_is_full_product(
            a in prop::collection::vec("[a-z]{1,5}", 1..4),
            b in prop::collection::vec("[a-z]{1,5}", 1..4),
        ) {
            let mut variables = VariableSet::new();
            variables.insert("alpha".into(), a.clone());
            variables.insert("beta".into(), b.clone());

            let expanded = expand_templates(&["{alpha} and {beta}"], Some(&variables));
            prop_assert_eq!(expanded.len(), a.len() * b.len());

            for (i, item) in expanded.iter().enumerate() {
                let combo = item.combination.as_ref().unwrap();
                prop_assert_eq!(&combo[0], &a[i / b.len()]);
                prop_assert_eq!(&combo[1], &b[i % b.len()]);
                // Round trip: substituting the combination reproduces the query.
                prop_assert_eq!(
                    substitute("{alpha} and {beta}", &item.variables, combo),
                    item.query.clone()
                );
            }
        }
    }
}
