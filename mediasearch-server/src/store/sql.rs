//! SQL rendering of structured filters and update operators.
//!
//! Every value becomes a positional parameter; the rendered text only ever
//! contains column names, operators and `$n` placeholders.

use chrono::{DateTime, Utc};
use mediasearch_core::store::StoreResult;
use mediasearch_core::{Filter, SortOrder, StoreError, TimestampField, Update, UpdateOp};

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Int(i64),
    Text(String),
    TextArray(Vec<String>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Default)]
pub struct SqlBuilder {
    params: Vec<QueryParam>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter and returns its placeholder.
    pub fn param(&mut self, value: QueryParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub fn into_params(self) -> Vec<QueryParam> {
        self.params
    }

    /// Renders a predicate over the `media` table.
    pub fn filter(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::All => "TRUE".to_string(),
            Filter::Ref(reference) => {
                let p = self.param(QueryParam::Text(reference.clone()));
                format!("media_ref = {p}")
            }
            Filter::RefIn(refs) => {
                let p = self.param(QueryParam::TextArray(refs.clone()));
                format!("media_ref = ANY({p}::text[])")
            }
            Filter::Class(class) => {
                let p = self.param(QueryParam::Text(class.as_str().to_string()));
                format!("class = {p}")
            }
            Filter::HasAnyTag(tags) => {
                let p = self.param(QueryParam::TextArray(tags.clone()));
                format!("tags && {p}::text[]")
            }
            Filter::And(filters) => self.join(filters, "AND", "TRUE"),
            Filter::Or(filters) => self.join(filters, "OR", "FALSE"),
            Filter::Not(inner) => format!("NOT ({})", self.filter(inner)),
        }
    }

    fn join(&mut self, filters: &[Filter], op: &str, empty: &str) -> String {
        if filters.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = filters.iter().map(|f| self.filter(f)).collect();
        format!("({})", parts.join(&format!(" {op} ")))
    }

    /// Renders the `SET` list of an update.
    ///
    /// Operators on the same column are folded into one expression in order,
    /// so the whole update stays a single-row atomic statement.
    pub fn assignments(&mut self, update: &Update) -> StoreResult<Vec<String>> {
        let mut tags: Option<String> = None;
        let mut alike: Option<String> = None;
        let mut touched: Vec<(TimestampField, String)> = Vec::new();

        for op in &update.ops {
            match op {
                UpdateOp::SetTags(values) => {
                    tags = Some(self.param(QueryParam::TextArray(values.clone())) + "::text[]");
                }
                UpdateOp::AddTags(values) => {
                    let prev = tags.take().unwrap_or_else(|| "tags".to_string());
                    let p = self.param(QueryParam::TextArray(values.clone()));
                    tags = Some(format!(
                        "{prev} || ARRAY(SELECT t FROM unnest({p}::text[]) WITH ORDINALITY AS u(t, i) \
                         WHERE NOT (t = ANY({prev})) ORDER BY i)"
                    ));
                }
                UpdateOp::PullTags(values) => {
                    let prev = tags.take().unwrap_or_else(|| "tags".to_string());
                    let p = self.param(QueryParam::TextArray(values.clone()));
                    tags = Some(format!(
                        "ARRAY(SELECT t FROM unnest({prev}) WITH ORDINALITY AS u(t, i) \
                         WHERE NOT (t = ANY({p}::text[])) ORDER BY i)"
                    ));
                }
                UpdateOp::PushAlike(link) => {
                    let prev = alike.take().unwrap_or_else(|| "alike".to_string());
                    let value = serde_json::to_value([link])
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    let p = self.param(QueryParam::Json(value));
                    alike = Some(format!("{prev} || {p}::jsonb"));
                }
                UpdateOp::PullAlike(reference) => {
                    let prev = alike.take().unwrap_or_else(|| "alike".to_string());
                    let p = self.param(QueryParam::Text(reference.clone()));
                    alike = Some(format!(
                        "COALESCE((SELECT jsonb_agg(e ORDER BY i) \
                         FROM jsonb_array_elements({prev}) WITH ORDINALITY AS a(e, i) \
                         WHERE e->>'ref' IS DISTINCT FROM {p}), '[]'::jsonb)"
                    ));
                }
                UpdateOp::Touch(field, at) => {
                    let p = self.param(QueryParam::Timestamp(*at));
                    touched.retain(|(f, _)| f != field);
                    touched.push((*field, p));
                }
            }
        }

        let mut sets = Vec::new();
        if let Some(expr) = tags {
            sets.push(format!("tags = {expr}"));
        }
        if let Some(expr) = alike {
            sets.push(format!("alike = {expr}"));
        }
        for (field, p) in touched {
            sets.push(format!("{} = {p}", field.column()));
        }
        Ok(sets)
    }
}

/// `ORDER BY` clause for a listing order; ties always fall back to `ref`.
pub fn order_by(order: SortOrder) -> String {
    match order {
        SortOrder::Ref => r#"media_ref COLLATE "C" ASC"#.to_string(),
        SortOrder::Newest(field) => {
            format!(r#"{} DESC, media_ref COLLATE "C" ASC"#, field.column())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasearch_core::{AlikeLink, MediaClass};

    #[test]
    fn test_filter_renders_placeholders_only() {
        let mut sql = SqlBuilder::new();
        let rank = sql.param(QueryParam::Int(7));
        let predicate = sql.filter(&Filter::And(vec![
            Filter::Class(MediaClass::Image),
            Filter::HasAnyTag(vec!["cat".into(), "dog".into()]),
            Filter::not(Filter::HasAnyTag(vec!["x'; DROP TABLE media; --".into()])),
        ]));

        assert_eq!(rank, "$1");
        assert_eq!(
            predicate,
            "(class = $2 AND tags && $3::text[] AND NOT (tags && $4::text[]))"
        );
        let params = sql.into_params();
        assert_eq!(params.len(), 4);
        assert_eq!(
            params[3],
            QueryParam::TextArray(vec!["x'; DROP TABLE media; --".into()])
        );
    }

    #[test]
    fn test_empty_compositions() {
        let mut sql = SqlBuilder::new();
        assert_eq!(sql.filter(&Filter::All), "TRUE");
        assert_eq!(sql.filter(&Filter::And(vec![])), "TRUE");
        assert_eq!(sql.filter(&Filter::Or(vec![])), "FALSE");
        assert!(sql.into_params().is_empty());
    }

    #[test]
    fn test_ref_filters() {
        let mut sql = SqlBuilder::new();
        assert_eq!(sql.filter(&Filter::Ref("img1".into())), "media_ref = $1");
        assert_eq!(
            sql.filter(&Filter::RefIn(vec!["a".into(), "b".into()])),
            "media_ref = ANY($2::text[])"
        );
    }

    #[test]
    fn test_tag_operators_fold_into_one_assignment() {
        let mut sql = SqlBuilder::new();
        let update = Update::new()
            .op(UpdateOp::AddTags(vec!["a".into()]))
            .op(UpdateOp::PullTags(vec!["b".into()]));
        let sets = sql.assignments(&update).unwrap();

        assert_eq!(sets.len(), 1);
        assert!(sets[0].starts_with("tags = ARRAY(SELECT t FROM unnest(tags || ARRAY("));
        assert!(sets[0].contains("$1::text[]"));
        assert!(sets[0].ends_with("WHERE NOT (t = ANY($2::text[])) ORDER BY i)"));
    }

    #[test]
    fn test_alike_operators_and_touch() {
        let mut sql = SqlBuilder::new();
        let update = Update::new()
            .op(UpdateOp::PushAlike(AlikeLink {
                reference: "img2".into(),
                evals: vec![],
            }))
            .touch(TimestampField::Reliked);
        let sets = sql.assignments(&update).unwrap();

        assert_eq!(sets, vec!["alike = alike || $1::jsonb", "reliked_on = $2"]);
        let params = sql.into_params();
        assert_eq!(
            params[0],
            QueryParam::Json(serde_json::json!([{ "ref": "img2", "evals": [] }]))
        );
    }

    #[test]
    fn test_pull_alike_matches_nested_ref() {
        let mut sql = SqlBuilder::new();
        let sets = sql
            .assignments(&Update::new().op(UpdateOp::PullAlike("img1".into())))
            .unwrap();
        assert_eq!(sets.len(), 1);
        assert!(sets[0].contains("jsonb_array_elements(alike)"));
        assert!(sets[0].contains("e->>'ref' IS DISTINCT FROM $1"));
        assert_eq!(sql.into_params(), vec![QueryParam::Text("img1".into())]);
    }

    #[test]
    fn test_set_tags_replaces_previous_operators() {
        let mut sql = SqlBuilder::new();
        let update = Update::new()
            .op(UpdateOp::AddTags(vec!["a".into()]))
            .op(UpdateOp::SetTags(vec!["z".into()]));
        let sets = sql.assignments(&update).unwrap();
        assert_eq!(sets, vec!["tags = $2::text[]"]);
    }

    #[test]
    fn test_order_by() {
        assert_eq!(order_by(SortOrder::Ref), r#"media_ref COLLATE "C" ASC"#);
        assert_eq!(
            order_by(SortOrder::Newest(TimestampField::Updated)),
            r#"updated_on DESC, media_ref COLLATE "C" ASC"#
        );
    }
}
