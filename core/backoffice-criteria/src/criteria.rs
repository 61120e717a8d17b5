//! The criteria builder.
//!
//! A [`Criteria`] accumulates query intent (pagination, filters, sorting,
//! term search, associations, aggregations) without touching the network.
//! The repository serializes it to the wire body when a request is sent.

use crate::aggregation::Aggregation;
use crate::error::{CriteriaError, CriteriaResult};
use crate::filter::{Filter, Operator, RangeBounds};
use crate::sorting::{SortDirection, Sorting};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Page size used by list views when nothing else is configured.
pub const DEFAULT_LIMIT: u32 = 25;

/// How the server computes `total` for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TotalCountMode {
    /// No total is computed.
    None,
    /// Exact total across all pages.
    Exact,
    /// Only whether a next page exists.
    NextPages,
}

impl From<TotalCountMode> for u8 {
    fn from(mode: TotalCountMode) -> Self {
        match mode {
            TotalCountMode::None => 0,
            TotalCountMode::Exact => 1,
            TotalCountMode::NextPages => 2,
        }
    }
}

impl TryFrom<u8> for TotalCountMode {
    type Error = CriteriaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TotalCountMode::None),
            1 => Ok(TotalCountMode::Exact),
            2 => Ok(TotalCountMode::NextPages),
            other => Err(CriteriaError::InvalidArgument(format!(
                "unknown total-count-mode: {other}"
            ))),
        }
    }
}

/// A filter with a ranking score, used to boost term search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreQuery {
    pub score: f64,
    pub query: Filter,
}

/// Client-side descriptor of a remote query.
///
/// Builder methods return `&mut Self` so calls chain on a `let mut`
/// binding. Methods that validate their input return a `CriteriaResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CriteriaBody", into = "CriteriaBody")]
pub struct Criteria {
    page: Option<u32>,
    limit: Option<u32>,
    term: Option<String>,
    ids: Vec<String>,
    filters: Vec<Filter>,
    post_filters: Vec<Filter>,
    queries: Vec<ScoreQuery>,
    sortings: Vec<Sorting>,
    associations: BTreeMap<String, Criteria>,
    aggregations: Vec<Aggregation>,
    group_fields: Vec<String>,
    total_count_mode: Option<TotalCountMode>,
    includes: BTreeMap<String, Vec<String>>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self::new()
    }
}

impl Criteria {
    /// A criteria for the first page with the default page size.
    pub fn new() -> Self {
        Self {
            page: Some(1),
            limit: Some(DEFAULT_LIMIT),
            ..Self::unpaged()
        }
    }

    /// A criteria with explicit pagination.
    pub fn paged(page: u32, limit: u32) -> CriteriaResult<Self> {
        let mut criteria = Self::new();
        criteria.set_page(page)?.set_limit(limit)?;
        Ok(criteria)
    }

    /// A criteria without page or limit. Used for association criteria,
    /// which load every associated entity unless limited explicitly.
    pub fn unpaged() -> Self {
        Self {
            page: None,
            limit: None,
            term: None,
            ids: Vec::new(),
            filters: Vec::new(),
            post_filters: Vec::new(),
            queries: Vec::new(),
            sortings: Vec::new(),
            associations: BTreeMap::new(),
            aggregations: Vec::new(),
            group_fields: Vec::new(),
            total_count_mode: None,
            includes: BTreeMap::new(),
        }
    }

    // ── Pagination ───────────────────────────────────────────────

    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Sets the 1-based page. Fails for 0.
    pub fn set_page(&mut self, page: u32) -> CriteriaResult<&mut Self> {
        if page < 1 {
            return Err(CriteriaError::InvalidArgument(format!(
                "page must be >= 1, got {page}"
            )));
        }
        self.page = Some(page);
        Ok(self)
    }

    /// Sets the page size. Fails for 0.
    pub fn set_limit(&mut self, limit: u32) -> CriteriaResult<&mut Self> {
        if limit < 1 {
            return Err(CriteriaError::InvalidArgument(format!(
                "limit must be >= 1, got {limit}"
            )));
        }
        self.limit = Some(limit);
        Ok(self)
    }

    /// Removes pagination entirely.
    pub fn clear_pagination(&mut self) -> &mut Self {
        self.page = None;
        self.limit = None;
        self
    }

    /// Jumps back to page 1, keeping the limit.
    pub fn reset_page(&mut self) -> &mut Self {
        self.page = Some(1);
        self
    }

    // ── Term, ids ────────────────────────────────────────────────

    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    /// Sets the free-text search term. An empty or blank term clears it.
    pub fn set_term(&mut self, term: impl Into<String>) -> &mut Self {
        let term = term.into();
        self.term = if term.trim().is_empty() { None } else { Some(term) };
        self
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Restricts the search to the given ids.
    pub fn set_ids<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    // ── Filters ──────────────────────────────────────────────────

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Appends a top-level filter. Top-level filters are AND-combined.
    pub fn add_filter(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn reset_filters(&mut self) -> &mut Self {
        self.filters.clear();
        self
    }

    pub fn post_filters(&self) -> &[Filter] {
        &self.post_filters
    }

    /// Appends a filter applied after aggregations are computed.
    pub fn add_post_filter(&mut self, filter: Filter) -> &mut Self {
        self.post_filters.push(filter);
        self
    }

    pub fn queries(&self) -> &[ScoreQuery] {
        &self.queries
    }

    /// Appends a scoring query for term ranking.
    pub fn add_query(&mut self, query: Filter, score: f64) -> &mut Self {
        self.queries.push(ScoreQuery { score, query });
        self
    }

    /// Evaluates the top-level filters against a local record.
    pub fn matches(&self, record: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// A criteria matching exactly the records this one's filters reject.
    ///
    /// Holds a single `not(AND, filters)` filter and a limit of 1, which is
    /// all a "how many are not assigned yet" probe needs: the total.
    pub fn complement(&self) -> Criteria {
        let mut complement = Criteria::new();
        complement.filters.push(Criteria::not(Operator::And, self.filters.clone()));
        complement.limit = Some(1);
        complement
    }

    // ── Sorting ──────────────────────────────────────────────────

    pub fn sortings(&self) -> &[Sorting] {
        &self.sortings
    }

    /// Appends a sort key. Earlier keys take precedence.
    pub fn add_sorting(&mut self, sorting: Sorting) -> &mut Self {
        self.sortings.push(sorting);
        self
    }

    pub fn reset_sorting(&mut self) -> &mut Self {
        self.sortings.clear();
        self
    }

    // ── Associations ─────────────────────────────────────────────

    pub fn associations(&self) -> &BTreeMap<String, Criteria> {
        &self.associations
    }

    /// Requests eager loading of a relation. Dotted paths (`media.thumbnails`)
    /// load every level.
    pub fn add_association(&mut self, path: &str) -> &mut Self {
        self.get_association(path);
        self
    }

    /// Returns the criteria of a nested association, creating every missing
    /// level along the dotted path.
    pub fn get_association(&mut self, path: &str) -> &mut Criteria {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let nested = self
            .associations
            .entry(head.to_string())
            .or_insert_with(Criteria::unpaged);
        match rest {
            Some(rest) => nested.get_association(rest),
            None => nested,
        }
    }

    /// True if the dotted path is requested at every level.
    pub fn has_association(&self, path: &str) -> bool {
        match path.split_once('.') {
            Some((head, rest)) => self
                .associations
                .get(head)
                .is_some_and(|nested| nested.has_association(rest)),
            None => self.associations.contains_key(path),
        }
    }

    // ── Aggregations, grouping, includes ─────────────────────────

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn add_aggregation(&mut self, aggregation: Aggregation) -> &mut Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn group_fields(&self) -> &[String] {
        &self.group_fields
    }

    /// Collapses results sharing the same value of `field`.
    pub fn add_grouping(&mut self, field: impl Into<String>) -> &mut Self {
        self.group_fields.push(field.into());
        self
    }

    pub fn total_count_mode(&self) -> Option<TotalCountMode> {
        self.total_count_mode
    }

    pub fn set_total_count_mode(&mut self, mode: TotalCountMode) -> &mut Self {
        self.total_count_mode = Some(mode);
        self
    }

    pub fn includes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.includes
    }

    /// Restricts the response fields of `entity` to `fields`.
    pub fn add_includes<I, S>(&mut self, entity: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes
            .entry(entity.into())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    // ── Filter factories ─────────────────────────────────────────

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn equals_any<I, V>(field: impl Into<String>, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::EqualsAny {
            field: field.into(),
            value: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn suffix(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Suffix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Filter {
        Filter::Range {
            field: field.into(),
            parameters: bounds,
        }
    }

    /// Negates `filters` combined under `operator`.
    pub fn not(operator: Operator, filters: Vec<Filter>) -> Filter {
        Filter::Not {
            operator,
            queries: filters,
        }
    }

    pub fn multi(operator: Operator, filters: Vec<Filter>) -> Filter {
        Filter::Multi {
            operator,
            queries: filters,
        }
    }

    // ── Sorting factories ────────────────────────────────────────

    pub fn sort(field: impl Into<String>, order: SortDirection) -> Sorting {
        Sorting::new(field, order, false)
    }

    pub fn natural_sort(field: impl Into<String>, order: SortDirection) -> Sorting {
        Sorting::new(field, order, true)
    }

    // ── Aggregation factories ────────────────────────────────────

    pub fn count(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Count {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Sum {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn avg(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Avg {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn min(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Min {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn max(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Max {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn stats(name: impl Into<String>, field: impl Into<String>) -> Aggregation {
        Aggregation::Stats {
            name: name.into(),
            field: field.into(),
        }
    }

    pub fn terms(
        name: impl Into<String>,
        field: impl Into<String>,
        limit: Option<u32>,
        sort: Option<Sorting>,
    ) -> Aggregation {
        Aggregation::Terms {
            name: name.into(),
            field: field.into(),
            limit,
            sort,
            aggregation: None,
        }
    }

    pub fn entity_aggregation(
        name: impl Into<String>,
        field: impl Into<String>,
        definition: impl Into<String>,
    ) -> Aggregation {
        Aggregation::Entity {
            name: name.into(),
            field: field.into(),
            definition: definition.into(),
        }
    }

    pub fn filter_aggregation(
        name: impl Into<String>,
        filter: Vec<Filter>,
        aggregation: Aggregation,
    ) -> Aggregation {
        Aggregation::Filter {
            name: name.into(),
            filter,
            aggregation: Box::new(aggregation),
        }
    }

    pub fn histogram(
        name: impl Into<String>,
        field: impl Into<String>,
        interval: impl Into<String>,
    ) -> Aggregation {
        Aggregation::Histogram {
            name: name.into(),
            field: field.into(),
            interval: interval.into(),
            format: None,
            aggregation: None,
            time_zone: None,
        }
    }
}

// ── Wire form ────────────────────────────────────────────────────

/// The JSON body sent to the search endpoints. Empty parts are omitted so
/// the body contains exactly what was requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CriteriaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    filter: Vec<Filter>,
    #[serde(rename = "post-filter", default, skip_serializing_if = "Vec::is_empty")]
    post_filter: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    query: Vec<ScoreQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sort: Vec<Sorting>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    associations: BTreeMap<String, Criteria>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aggregations: Vec<Aggregation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    grouping: Vec<String>,
    #[serde(
        rename = "total-count-mode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    total_count_mode: Option<TotalCountMode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    includes: BTreeMap<String, Vec<String>>,
}

impl From<Criteria> for CriteriaBody {
    fn from(c: Criteria) -> Self {
        Self {
            page: c.page,
            limit: c.limit,
            term: c.term,
            ids: c.ids,
            filter: c.filters,
            post_filter: c.post_filters,
            query: c.queries,
            sort: c.sortings,
            associations: c.associations,
            aggregations: c.aggregations,
            grouping: c.group_fields,
            total_count_mode: c.total_count_mode,
            includes: c.includes,
        }
    }
}

impl TryFrom<CriteriaBody> for Criteria {
    type Error = CriteriaError;

    fn try_from(body: CriteriaBody) -> Result<Self, Self::Error> {
        let mut criteria = Criteria::unpaged();
        if let Some(page) = body.page {
            criteria.set_page(page)?;
        }
        if let Some(limit) = body.limit {
            criteria.set_limit(limit)?;
        }
        criteria.term = body.term;
        criteria.ids = body.ids;
        criteria.filters = body.filter;
        criteria.post_filters = body.post_filter;
        criteria.queries = body.query;
        criteria.sortings = body.sort;
        criteria.associations = body.associations;
        criteria.aggregations = body.aggregations;
        criteria.group_fields = body.grouping;
        criteria.total_count_mode = body.total_count_mode;
        criteria.includes = body.includes;
        Ok(criteria)
    }
}
