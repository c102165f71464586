// template.rs - Selector and template engine
// Turns values extracted from a fetched document into one rendered string.
//
// Templates use "%s" as a positional placeholder. Selectors are evaluated in
// order and their values fill the placeholders left to right.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const PLACEHOLDER: &str = "%s";

/// Substituted when a template expects a value but a selector matched nothing.
pub const RETRIEVAL_ERROR: &str = "There was an error retrieving information from the webpage.";

/// Anything selectors can be evaluated against.
pub trait SelectorSource {
    /// Every candidate value for `selector`, in document order. Never fails;
    /// an invalid selector simply matches nothing.
    fn select_all(&self, selector: &str) -> Vec<String>;

    /// Look up a single value by key, coerced to text.
    fn lookup(&self, key: &str) -> Option<String> {
        self.select_all(key).into_iter().next()
    }
}

impl SelectorSource for HashMap<String, String> {
    fn select_all(&self, selector: &str) -> Vec<String> {
        self.get(selector).cloned().into_iter().collect()
    }
}

/// Which match to use when every selector matched several times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Multiplicity {
    #[default]
    First,
    Last,
    Random,
}

impl From<String> for Multiplicity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Last" => Multiplicity::Last,
            "Random" => Multiplicity::Random,
            _ => Multiplicity::First,
        }
    }
}

impl From<Multiplicity> for String {
    fn from(m: Multiplicity) -> Self {
        match m {
            Multiplicity::First => "First",
            Multiplicity::Last => "Last",
            Multiplicity::Random => "Random",
        }
        .to_string()
    }
}

impl Multiplicity {
    /// Index into `count` aligned candidates. `count` must be non-zero.
    pub fn pick(self, count: usize) -> usize {
        debug_assert!(count > 0);
        match self {
            Multiplicity::First => 0,
            Multiplicity::Last => count - 1,
            Multiplicity::Random => rand::thread_rng().gen_range(0..count),
        }
    }
}

/// Ordered search/replace rules for one selector. Deserialized from a JSON
/// object; key order in the file is the rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements(pub Vec<(String, String)>);

impl Replacements {
    /// Apply the first rule whose search text occurs in `value`, then stop.
    pub fn apply(&self, value: &str) -> String {
        self.0
            .iter()
            .find(|(search, _)| !search.is_empty() && value.contains(search.as_str()))
            .map(|(search, replace)| value.replace(search.as_str(), replace))
            .unwrap_or_else(|| value.to_string())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Replacements {
    fn from(rules: [(&str, &str); N]) -> Self {
        Replacements(
            rules
                .iter()
                .map(|(s, r)| (s.to_string(), r.to_string()))
                .collect(),
        )
    }
}

impl Serialize for Replacements {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (search, replace) in &self.0 {
            map.serialize_entry(search, replace)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Replacements {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = Replacements;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping search text to replacement text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::new();
                while let Some((search, replace)) = map.next_entry::<String, String>()? {
                    rules.push((search, replace));
                }
                Ok(Replacements(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

/// Fill `%s` placeholders left to right. Extra values are ignored; unfilled
/// placeholders stay in the output. Inserted values are never re-scanned.
pub fn fill_template<S: AsRef<str>>(template: &str, values: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    for value in values {
        match rest.find(PLACEHOLDER) {
            Some(pos) => {
                out.push_str(&rest[..pos]);
                out.push_str(value.as_ref());
                rest = &rest[pos + PLACEHOLDER.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

pub fn has_placeholder(template: &str) -> bool {
    template.contains(PLACEHOLDER)
}

pub fn count_placeholders(template: &str) -> usize {
    template.matches(PLACEHOLDER).count()
}

/// A template bound to selectors, with a policy for multiple matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SelectorCapture {
    pub template: String,
    pub selectors: Vec<String>,
    pub handle_multiple: Multiplicity,
    /// Rules for the selector at the same index. May be shorter than `selectors`.
    pub replacements: Vec<Replacements>,
}

impl SelectorCapture {
    pub fn new(template: impl Into<String>, selectors: &[&str]) -> Self {
        Self {
            template: template.into(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn clean(&self, index: usize, raw: &str) -> String {
        let value = match self.replacements.get(index) {
            Some(rules) => rules.apply(raw),
            None => raw.to_string(),
        };
        value.trim().to_string()
    }

    /// Evaluate every selector and fill the template from one aligned index.
    ///
    /// The index is chosen among the first `n` candidates, `n` being the
    /// shortest candidate list. With `n == 0` a template that expects a value
    /// renders as `RETRIEVAL_ERROR`, and one that doesn't renders unchanged.
    pub fn render(&self, source: &dyn SelectorSource) -> String {
        let candidates: Vec<Vec<String>> = self
            .selectors
            .iter()
            .map(|selector| source.select_all(selector))
            .collect();
        let count = candidates.iter().map(Vec::len).min().unwrap_or(0);

        if count == 0 {
            return if has_placeholder(&self.template) {
                RETRIEVAL_ERROR.to_string()
            } else {
                self.template.clone()
            };
        }

        let index = self.handle_multiple.pick(count);
        let values: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, values)| self.clean(i, &values[index]))
            .collect();
        fill_template(&self.template, &values)
    }
}

/// A template filled purely by key lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FieldCapture {
    pub template: String,
    pub selectors: Vec<String>,
}

impl FieldCapture {
    pub fn new(template: impl Into<String>, selectors: &[&str]) -> Self {
        Self {
            template: template.into(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Missing keys are skipped, so their placeholders are taken by the next
    /// value found (or left unfilled).
    pub fn render_with_map(&self, source: &dyn SelectorSource) -> String {
        let values: Vec<String> = self
            .selectors
            .iter()
            .filter_map(|key| source.lookup(key))
            .collect();
        fill_template(&self.template, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source with fixed candidate lists per selector.
    struct Lists(HashMap<&'static str, Vec<&'static str>>);

    impl SelectorSource for Lists {
        fn select_all(&self, selector: &str) -> Vec<String> {
            self.0
                .get(selector)
                .map(|values| values.iter().map(|v| v.to_string()).collect())
                .unwrap_or_default()
        }
    }

    fn lists(entries: &[(&'static str, &[&'static str])]) -> Lists {
        Lists(entries.iter().map(|(k, v)| (*k, v.to_vec())).collect())
    }

    #[test]
    fn test_fill_template_left_to_right() {
        assert_eq!(fill_template("%s and %s", &["a", "b"]), "a and b");
        assert_eq!(fill_template("%s and %s", &["a"]), "a and %s");
        assert_eq!(fill_template("%s", &["a", "b"]), "a");
        assert_eq!(fill_template("none", &["a"]), "none");
        assert_eq!(fill_template("%s|%s", &["%s", "x"]), "%s|x");
    }

    #[test]
    fn test_first_policy_picks_index_zero() {
        let source = lists(&[("h1", &["one", "two", "three"]), ("p", &["a", "b", "c"])]);
        let capture = SelectorCapture::new("%s: %s", &["h1", "p"]);
        assert_eq!(capture.render(&source), "one: a");
    }

    #[test]
    fn test_last_policy_uses_shortest_list() {
        let source = lists(&[("h1", &["one", "two", "three"]), ("p", &["a", "b"])]);
        let mut capture = SelectorCapture::new("%s: %s", &["h1", "p"]);
        capture.handle_multiple = Multiplicity::Last;
        assert_eq!(capture.render(&source), "two: b");
    }

    #[test]
    fn test_random_policy_stays_aligned_and_in_bounds() {
        let source = lists(&[("k", &["0", "1", "2", "3"]), ("v", &["0", "1", "2"])]);
        let mut capture = SelectorCapture::new("%s=%s", &["k", "v"]);
        capture.handle_multiple = Multiplicity::Random;
        for _ in 0..50 {
            let rendered = capture.render(&source);
            let (k, v) = rendered.split_once('=').unwrap();
            assert_eq!(k, v);
            assert!(k.parse::<usize>().unwrap() < 3);
        }
    }

    #[test]
    fn test_pick_bounds() {
        assert_eq!(Multiplicity::First.pick(5), 0);
        assert_eq!(Multiplicity::Last.pick(5), 4);
        for _ in 0..50 {
            assert!(Multiplicity::Random.pick(5) < 5);
        }
        assert_eq!(Multiplicity::Random.pick(1), 0);
    }

    #[test]
    fn test_empty_selector_list_forces_fallback() {
        let source = lists(&[("h1", &["one"]), ("p", &[])]);
        let capture = SelectorCapture::new("%s %s", &["h1", "p"]);
        assert_eq!(capture.render(&source), RETRIEVAL_ERROR);
    }

    #[test]
    fn test_no_selectors_keeps_static_template() {
        let source = lists(&[]);
        assert_eq!(SelectorCapture::new("Static title", &[]).render(&source), "Static title");
        assert_eq!(SelectorCapture::new("Needs %s", &[]).render(&source), RETRIEVAL_ERROR);
    }

    #[test]
    fn test_values_are_trimmed_after_replacement() {
        let source = lists(&[("h1", &["  Hello World\n"])]);
        let mut capture = SelectorCapture::new("%s", &["h1"]);
        capture.replacements = vec![Replacements::from([("World", "there")])];
        assert_eq!(capture.render(&source), "Hello there");
    }

    #[test]
    fn test_replacement_short_circuits_on_first_match() {
        let rules = Replacements::from([("cat", "dog"), ("dog", "bird"), ("a", "e")]);
        assert_eq!(rules.apply("cat cat"), "dog dog");
        assert_eq!(rules.apply("dog"), "bird");
        assert_eq!(rules.apply("nothing"), "nothing");
    }

    #[test]
    fn test_replacements_apply_per_selector_index() {
        let source = lists(&[("a", &["x1"]), ("b", &["x2"])]);
        let mut capture = SelectorCapture::new("%s %s", &["a", "b"]);
        capture.replacements = vec![Replacements::default(), Replacements::from([("x", "y")])];
        assert_eq!(capture.render(&source), "x1 y2");
    }

    #[test]
    fn test_replacements_keep_file_order() {
        let rules: Replacements =
            serde_json::from_str(r#"{"z": "1", "a": "2", "m": "3"}"#).unwrap();
        let searches: Vec<&str> = rules.0.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(searches, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_render_with_map_skips_missing_keys() {
        let mut dict = HashMap::new();
        dict.insert("name".to_string(), "Boby".to_string());
        dict.insert("kind".to_string(), "bot".to_string());

        let capture = FieldCapture::new("%s is a %s", &["name", "missing", "kind"]);
        assert_eq!(capture.render_with_map(&dict), "Boby is a bot");

        let partial = FieldCapture::new("%s is a %s", &["name"]);
        assert_eq!(partial.render_with_map(&dict), "Boby is a %s");
    }

    #[test]
    fn test_selector_capture_deserializes() {
        let capture: SelectorCapture = serde_json::from_str(
            r#"{
                "Template": "%s",
                "Selectors": ["h1"],
                "HandleMultiple": "Random",
                "Replacements": [{"foo": "bar"}]
            }"#,
        )
        .unwrap();
        assert_eq!(capture.handle_multiple, Multiplicity::Random);
        assert_eq!(capture.replacements[0].apply("foo"), "bar");

        let defaulted: SelectorCapture =
            serde_json::from_str(r#"{"Template": "x", "HandleMultiple": "Whatever"}"#).unwrap();
        assert_eq!(defaulted.handle_multiple, Multiplicity::First);
        assert!(defaulted.selectors.is_empty());
    }
}
