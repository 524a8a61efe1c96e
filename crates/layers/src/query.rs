use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::OrgRecord;

/// OR-group: the record's `key` attribute holds at least one of `any_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub key: String,
    pub any_of: BTreeSet<String>,
}

/// Conjunction of per-criterion OR-groups, applied declaratively to a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "groups", rename_all = "lowercase")]
pub enum CompoundPredicate {
    /// No constraint; every feature passes.
    All,
    Conjunction(Vec<PropertyFilter>),
}

impl CompoundPredicate {
    /// Drops empty groups; no groups left means [`CompoundPredicate::All`].
    pub fn from_groups(groups: impl IntoIterator<Item = PropertyFilter>) -> Self {
        let groups: Vec<PropertyFilter> = groups
            .into_iter()
            .filter(|g| !g.any_of.is_empty())
            .collect();
        if groups.is_empty() {
            CompoundPredicate::All
        } else {
            CompoundPredicate::Conjunction(groups)
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, CompoundPredicate::All)
    }

    /// Evaluates against a record's tokenized attributes.
    ///
    /// A record missing a constrained attribute does not match.
    pub fn matches(&self, record: &OrgRecord) -> bool {
        let CompoundPredicate::Conjunction(groups) = self else {
            return true;
        };
        groups.iter().all(|g| {
            record
                .values(&g.key)
                .is_some_and(|vals| vals.iter().any(|v| g.any_of.contains(v)))
        })
    }

    /// SQL-style definition expression for hosts that filter with a where clause.
    pub fn to_where_clause(&self) -> String {
        WhereClause(self).to_string()
    }
}

/// Renders a [`CompoundPredicate`] as a where clause.
///
/// Each selected value must appear as a whole delimited token of the
/// attribute, the way [`CompoundPredicate::matches`] reads it. Records are
/// expected to separate tokens with `,` or `;`, optionally followed by one
/// space. A value that is a middle entry of a parenthesized list can still
/// match there; `matches` never does.
pub struct WhereClause<'a>(pub &'a CompoundPredicate);

impl fmt::Display for WhereClause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CompoundPredicate::Conjunction(groups) = self.0 else {
            return f.write_str("1=1");
        };
        for (gi, g) in groups.iter().enumerate() {
            if gi > 0 {
                f.write_str(" AND ")?;
            }
            f.write_str("(")?;
            let mut first = true;
            for v in &g.any_of {
                for term in token_terms(v) {
                    if !first {
                        f.write_str(" OR ")?;
                    }
                    first = false;
                    match term {
                        SqlTerm::Equals(text) => write!(f, "{} = '{}'", g.key, quote(&text))?,
                        SqlTerm::Like(pattern) => write!(
                            f,
                            "{} LIKE '{}' ESCAPE '{LIKE_ESCAPE}'",
                            g.key,
                            quote(&pattern)
                        )?,
                    }
                }
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

const LIKE_ESCAPE: char = '\\';

/// Text that may precede a token: start of the attribute or a delimiter.
const TOKEN_STARTS: [&str; 5] = ["", "%,", "%, ", "%;", "%; "];
/// Text that may follow a token: end of the attribute or a delimiter.
const TOKEN_ENDS: [&str; 3] = ["", ",%", ";%"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum SqlTerm {
    Equals(String),
    Like(String),
}

fn token_terms(value: &str) -> Vec<SqlTerm> {
    let literal = escape_like(value);
    let mut terms = vec![SqlTerm::Equals(value.to_string())];
    for start in TOKEN_STARTS {
        for end in TOKEN_ENDS {
            if start.is_empty() && end.is_empty() {
                continue;
            }
            terms.push(SqlTerm::Like(format!("{start}{literal}{end}")));
        }
    }
    terms
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

fn quote(text: &str) -> String {
    text.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::{CompoundPredicate, PropertyFilter, SqlTerm, token_terms};
    use crate::index::OrgRecord;

    fn group(key: &str, values: &[&str]) -> PropertyFilter {
        PropertyFilter {
            key: key.to_string(),
            any_of: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn empty_groups_degenerate_to_all() {
        let p = CompoundPredicate::from_groups([group("species", &[]), group("members", &[])]);
        assert_eq!(p, CompoundPredicate::All);
        assert!(p.matches(&OrgRecord::new("anything")));
        assert_eq!(p.to_where_clause(), "1=1");
    }

    #[test]
    fn conjunction_of_or_groups() {
        let p = CompoundPredicate::from_groups([
            group("species", &["Salmon", "Cod"]),
            group("members", &["Canada"]),
        ]);
        let a = OrgRecord::new("A")
            .with_field("species", "Salmon, Tuna")
            .with_field("members", "Canada, USA");
        let b = OrgRecord::new("B")
            .with_field("species", "Cod")
            .with_field("members", "Japan");
        let c = OrgRecord::new("C").with_field("species", "Cod");

        assert!(p.matches(&a));
        assert!(!p.matches(&b));
        // Missing attribute never matches by default.
        assert!(!p.matches(&c));
    }

    #[test]
    fn where_clause_quotes_and_escapes() {
        let p = CompoundPredicate::from_groups([group("species", &["O'Brien's 50%_Eel"])]);
        let clause = p.to_where_clause();
        assert!(clause.starts_with("(species = 'O''Brien''s 50%_Eel' OR "));
        assert!(clause.contains(r"species LIKE '%, O''Brien''s 50\%\_Eel' ESCAPE '\'"));
        assert!(clause.contains(r"species LIKE 'O''Brien''s 50\%\_Eel;%' ESCAPE '\'"));
        assert!(clause.ends_with(')'));
        assert!(!clause.contains("'%O''Brien"));
    }

    #[test]
    fn where_clause_terms_agree_with_matches() {
        let records = [
            "Tuna",
            "Tuna (Skipjack, Yellowfin)",
            "Salmon, Tuna",
            "Cod;Tuna; Hake",
            "Tunafish",
            "Niger",
            "Nigeria, Chad",
            "Chad; Niger",
            "100% Cod",
            "1000 Cod",
        ];
        for value in ["Tuna", "Skipjack", "Yellowfin", "Niger", "100% Cod", "Hake"] {
            let g = group("f", &[value]);
            let p = CompoundPredicate::from_groups([g.clone()]);
            for raw in records {
                let record = OrgRecord::new("org").with_field("f", raw);
                assert_eq!(
                    clause_hits(&g, raw),
                    p.matches(&record),
                    "value {value:?} against {raw:?}"
                );
            }
        }
    }

    fn clause_hits(g: &PropertyFilter, raw: &str) -> bool {
        let text: Vec<char> = raw.chars().collect();
        g.any_of.iter().any(|v| {
            token_terms(v).into_iter().any(|term| match term {
                SqlTerm::Equals(exact) => exact == raw,
                SqlTerm::Like(pattern) => {
                    like(&pattern.chars().collect::<Vec<_>>(), &text)
                }
            })
        })
    }

    /// SQL `LIKE` with `\` as the escape character.
    fn like(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|i| like(rest, &text[i..])),
            Some(('_', rest)) => !text.is_empty() && like(rest, &text[1..]),
            Some(('\\', [escaped, rest @ ..])) => {
                text.first() == Some(escaped) && like(rest, &text[1..])
            }
            Some((c, rest)) => text.first() == Some(c) && like(rest, &text[1..]),
        }
    }
}
