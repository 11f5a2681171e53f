//! Listing query builder.
//!
//! Turns the open map of string request parameters into a validated
//! [`ListQuery`]. Validation happens entirely here, before the store is
//! touched. Rendering produces SQL *shape* only: column names come from the
//! static tables in [`crate::columns`] and every user-supplied value is a
//! bound parameter.
//!
//! # Parameters
//!
//! | Name | Meaning |
//! |---|---|
//! | `containsLikeFields` / `containsLikeValues` | parallel comma lists, substring match |
//! | `rangeFields` / `rangeValues` | parallel comma lists, `from_to` epoch millis |
//! | `sortBy` / `sortingOrder` | column from the listing's sort table, `asc`/`desc` |
//! | `isDetailsRequired` | mandatory `true`/`false` |
//! | `page` | 1-based, default 1 |
//! | `size` | 1..=5000, default 20 |
//! | `deviceId` | history only: pin to one external device id |

use std::collections::HashMap;
use std::fmt;

use devprov_core::validation::validate_device_id;
use rusqlite::types::Value;
use thiserror::Error;

use crate::columns::{
    ColumnKind, CONTAINS_LIKE_COLUMNS, DEVICE_ID_HISTORY_SORT_COLUMNS,
    DEVICE_SORT_COLUMNS, HISTORY_SORT_COLUMNS, RANGE_COLUMNS,
};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 5000;

/// Request parameter names.
pub mod param {
    pub const CONTAINS_LIKE_FIELDS: &str = "containsLikeFields";
    pub const CONTAINS_LIKE_VALUES: &str = "containsLikeValues";
    pub const RANGE_FIELDS: &str = "rangeFields";
    pub const RANGE_VALUES: &str = "rangeValues";
    pub const SORT_BY: &str = "sortBy";
    pub const SORTING_ORDER: &str = "sortingOrder";
    pub const IS_DETAILS_REQUIRED: &str = "isDetailsRequired";
    pub const PAGE: &str = "page";
    pub const SIZE: &str = "size";
    pub const DEVICE_ID: &str = "deviceId";
}

/// Which group of filters a listing error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFamily {
    ContainsLike,
    Range,
    DeviceId,
}

impl fmt::Display for FilterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterFamily::ContainsLike => "contains-like",
            FilterFamily::Range => "range",
            FilterFamily::DeviceId => "device id",
        })
    }
}

/// Rejected listing request, or a filtered listing that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unsupported {family} field: {field}")]
    UnknownField { family: FilterFamily, field: String },

    #[error("{family} fields and values differ in length ({fields} vs {values})")]
    LengthMismatch {
        family: FilterFamily,
        fields: usize,
        values: usize,
    },

    #[error("invalid range value '{value}' for {field}: expected <from>_<to> epoch millis")]
    MalformedRange { field: String, value: String },

    #[error("invalid {field} filter value '{value}': expected true or false")]
    InvalidFlag { field: String, value: String },

    #[error("unsupported sortBy field: {0}")]
    UnknownSortField(String),

    #[error("invalid sortingOrder '{0}': expected asc or desc")]
    InvalidSortOrder(String),

    #[error("isDetailsRequired must be true or false, got '{0}'")]
    InvalidDetailsFlag(String),

    #[error("invalid page '{0}': must be a positive integer")]
    InvalidPage(String),

    #[error("invalid size '{0}': must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidSize(String),

    #[error("invalid deviceId '{0}'")]
    InvalidDeviceId(String),

    #[error("no records match the {0} filter")]
    NoMatch(FilterFamily),
}

impl QueryError {
    /// Whether this is a zero-row result rather than a malformed request.
    pub fn is_no_match(&self) -> bool {
        matches!(self, QueryError::NoMatch(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A single bound condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Contains { column: &'static str, needle: String },
    Flag { column: &'static str, value: bool },
    Range { column: &'static str, from: i64, to: i64 },
    ExternalDeviceId(String),
}

impl Predicate {
    fn render(&self, clauses: &mut Vec<String>, params: &mut Vec<Value>) {
        match self {
            Predicate::Contains { column, needle } => {
                clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                params.push(Value::Text(format!("%{}%", escape_like(needle))));
            }
            Predicate::Flag { column, value } => {
                clauses.push(format!("{column} = ?"));
                params.push(Value::Integer(i64::from(*value)));
            }
            Predicate::Range { column, from, to } => {
                clauses.push(format!("{column} BETWEEN ? AND ?"));
                params.push(Value::Integer(*from));
                params.push(Value::Integer(*to));
            }
            Predicate::ExternalDeviceId(device_id) => {
                clauses.push(
                    "factory_id IN (SELECT factory_id FROM device_association WHERE harman_id = ?)"
                        .to_string(),
                );
                params.push(Value::Text(device_id.clone()));
            }
        }
    }
}

/// Neutralize LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Rendered `WHERE` clause (empty when unfiltered) plus its bound values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    contains: Vec<Predicate>,
    ranges: Vec<Predicate>,
    scope: Option<Predicate>,
    order_by: &'static str,
    order: SortOrder,
    pub details_required: bool,
    pub page: u32,
    pub size: u32,
}

impl ListQuery {
    /// Validate parameters for a device details listing.
    pub fn for_devices(params: &HashMap<String, String>) -> Result<Self, QueryError> {
        Self::parse(params, &DEVICE_SORT_COLUMNS, None)
    }

    /// Validate parameters for a state history listing.
    ///
    /// A `deviceId` narrows the listing to one external device id and
    /// switches to the narrower sort table.
    pub fn for_history(params: &HashMap<String, String>) -> Result<Self, QueryError> {
        match lookup(params, param::DEVICE_ID) {
            Some(device_id) => {
                validate_device_id(device_id)
                    .map_err(|_| QueryError::InvalidDeviceId(device_id.to_string()))?;
                let scope = Predicate::ExternalDeviceId(device_id.to_string());
                Self::parse(params, &DEVICE_ID_HISTORY_SORT_COLUMNS, Some(scope))
            }
            None => Self::parse(params, &HISTORY_SORT_COLUMNS, None),
        }
    }

    fn parse(
        params: &HashMap<String, String>,
        sort_columns: &HashMap<&'static str, &'static str>,
        scope: Option<Predicate>,
    ) -> Result<Self, QueryError> {
        let details_required = parse_details_flag(lookup(params, param::IS_DETAILS_REQUIRED))?;
        let contains = parse_contains(
            lookup(params, param::CONTAINS_LIKE_FIELDS),
            lookup(params, param::CONTAINS_LIKE_VALUES),
        )?;
        let ranges = parse_ranges(
            lookup(params, param::RANGE_FIELDS),
            lookup(params, param::RANGE_VALUES),
        )?;

        let order_by = match lookup(params, param::SORT_BY) {
            Some(field) => *sort_columns
                .get(field)
                .ok_or_else(|| QueryError::UnknownSortField(field.to_string()))?,
            None => "id",
        };
        let order = match lookup(params, param::SORTING_ORDER) {
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(o) => return Err(QueryError::InvalidSortOrder(o.to_string())),
            None => SortOrder::Asc,
        };

        let page = match lookup(params, param::PAGE) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => return Err(QueryError::InvalidPage(raw.to_string())),
            },
            None => DEFAULT_PAGE,
        };
        let size = match lookup(params, param::SIZE) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(s) if (1..=MAX_PAGE_SIZE).contains(&s) => s,
                _ => return Err(QueryError::InvalidSize(raw.to_string())),
            },
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            contains,
            ranges,
            scope,
            order_by,
            order,
            details_required,
            page,
            size,
        })
    }

    pub fn has_filters(&self) -> bool {
        !self.contains.is_empty() || !self.ranges.is_empty() || self.scope.is_some()
    }

    /// All predicates ANDed together.
    pub fn where_clause(&self) -> WhereClause {
        render(self.scope.iter().chain(&self.contains).chain(&self.ranges))
    }

    /// Only the device id scope.
    pub fn scope_clause(&self) -> WhereClause {
        render(self.scope.iter())
    }

    /// Only the device id scope and contains-like predicates.
    pub fn contains_clause(&self) -> WhereClause {
        render(self.scope.iter().chain(&self.contains))
    }

    /// `ORDER BY` tail, primary key ascending as tie-breaker.
    pub fn order_clause(&self) -> String {
        if self.order_by == "id" {
            format!(" ORDER BY id {}", self.order.keyword())
        } else {
            format!(" ORDER BY {} {}, id ASC", self.order_by, self.order.keyword())
        }
    }

    /// Bound values for the trailing `LIMIT ? OFFSET ?`.
    pub fn page_params(&self) -> [Value; 2] {
        let offset = (u64::from(self.page) - 1) * u64::from(self.size);
        [
            Value::Integer(i64::from(self.size)),
            Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)),
        ]
    }

    /// Which family to blame for an empty result, given whether the
    /// device id scope and the contains-like filter each matched anything
    /// on their own. A scope that matches nothing is blamed first.
    pub fn empty_result_family(
        &self,
        scope_matched: bool,
        contains_alone_matched: bool,
    ) -> Option<FilterFamily> {
        if self.scope.is_some() && !scope_matched {
            return Some(FilterFamily::DeviceId);
        }
        match (self.contains.is_empty(), self.ranges.is_empty()) {
            (false, true) => Some(FilterFamily::ContainsLike),
            (true, false) => Some(FilterFamily::Range),
            (false, false) if contains_alone_matched => Some(FilterFamily::Range),
            (false, false) => Some(FilterFamily::ContainsLike),
            (true, true) => self.scope.as_ref().map(|_| FilterFamily::DeviceId),
        }
    }

    /// Whether attributing an empty result needs a scope-only count.
    pub fn needs_scope_count(&self) -> bool {
        self.scope.is_some() && (!self.contains.is_empty() || !self.ranges.is_empty())
    }

    /// Whether attributing an empty result needs a contains-only count.
    pub fn needs_split_count(&self) -> bool {
        !self.contains.is_empty() && !self.ranges.is_empty()
    }
}

fn render<'a>(predicates: impl Iterator<Item = &'a Predicate>) -> WhereClause {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    for predicate in predicates {
        predicate.render(&mut clauses, &mut params);
    }
    if clauses.is_empty() {
        return WhereClause::default();
    }
    WhereClause {
        sql: format!(" WHERE {}", clauses.join(" AND ")),
        params,
    }
}

/// Trimmed parameter value; blank counts as absent.
fn lookup<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| s.split(',').map(str::trim).collect())
        .unwrap_or_default()
}

/// Pair up a field list and a value list, resolving each field.
fn paired<'a, C: Copy>(
    family: FilterFamily,
    table: &HashMap<&'static str, C>,
    fields: Option<&'a str>,
    values: Option<&'a str>,
) -> Result<Vec<(C, &'a str, &'a str)>, QueryError> {
    let fields = split_list(fields);
    let values = split_list(values);
    if fields.len() != values.len() {
        return Err(QueryError::LengthMismatch {
            family,
            fields: fields.len(),
            values: values.len(),
        });
    }
    fields
        .into_iter()
        .zip(values)
        .map(|(field, value)| {
            let column = table.get(field).ok_or_else(|| QueryError::UnknownField {
                family,
                field: field.to_string(),
            })?;
            Ok((*column, field, value))
        })
        .collect()
}

fn parse_contains(
    fields: Option<&str>,
    values: Option<&str>,
) -> Result<Vec<Predicate>, QueryError> {
    paired(FilterFamily::ContainsLike, &CONTAINS_LIKE_COLUMNS, fields, values)?
        .into_iter()
        .map(|(column, field, value)| match column.kind {
            ColumnKind::Flag => {
                let flag = if value.eq_ignore_ascii_case("true") {
                    true
                } else if value.eq_ignore_ascii_case("false") {
                    false
                } else {
                    return Err(QueryError::InvalidFlag {
                        field: field.to_string(),
                        value: value.to_string(),
                    });
                };
                Ok(Predicate::Flag {
                    column: column.name,
                    value: flag,
                })
            }
            ColumnKind::Text => Ok(Predicate::Contains {
                column: column.name,
                needle: value.to_string(),
            }),
        })
        .collect()
}

fn parse_ranges(fields: Option<&str>, values: Option<&str>) -> Result<Vec<Predicate>, QueryError> {
    paired(FilterFamily::Range, &RANGE_COLUMNS, fields, values)?
        .into_iter()
        .map(|(column, field, value)| {
            let malformed = || QueryError::MalformedRange {
                field: field.to_string(),
                value: value.to_string(),
            };
            let bounds: Vec<&str> = value.split('_').collect();
            let [from, to] = bounds.as_slice() else {
                return Err(malformed());
            };
            Ok(Predicate::Range {
                column,
                from: from.trim().parse().map_err(|_| malformed())?,
                to: to.trim().parse().map_err(|_| malformed())?,
            })
        })
        .collect()
}

fn parse_details_flag(raw: Option<&str>) -> Result<bool, QueryError> {
    match raw {
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(QueryError::InvalidDetailsFlag(v.to_string())),
        None => Err(QueryError::InvalidDetailsFlag(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_page_and_size_absent() {
        let q = ListQuery::for_devices(&params(&[("isDetailsRequired", "TRUE")])).unwrap();
        assert!(q.details_required);
        assert_eq!(q.page, 1);
        assert_eq!(q.size, 20);
        assert!(!q.has_filters());
        assert_eq!(q.where_clause(), WhereClause::default());
        assert_eq!(q.order_clause(), " ORDER BY id ASC");
    }

    #[test]
    fn details_flag_is_mandatory() {
        assert_eq!(
            ListQuery::for_devices(&params(&[])).unwrap_err(),
            QueryError::InvalidDetailsFlag(String::new())
        );
        assert_eq!(
            ListQuery::for_devices(&params(&[("isDetailsRequired", "yes")])).unwrap_err(),
            QueryError::InvalidDetailsFlag("yes".to_string())
        );
    }

    #[test]
    fn size_bounds_are_enforced() {
        for bad in ["0", "5001", "-3", "ten"] {
            let err = ListQuery::for_devices(&params(&[
                ("isDetailsRequired", "true"),
                ("size", bad),
            ]))
            .unwrap_err();
            assert_eq!(err, QueryError::InvalidSize(bad.to_string()));
        }
        let q = ListQuery::for_devices(&params(&[("isDetailsRequired", "true"), ("size", "5000")]))
            .unwrap();
        assert_eq!(q.size, 5000);
    }

    #[test]
    fn page_zero_and_negative_rejected() {
        for bad in ["0", "-1"] {
            let err = ListQuery::for_devices(&params(&[
                ("isDetailsRequired", "true"),
                ("page", bad),
            ]))
            .unwrap_err();
            assert_eq!(err, QueryError::InvalidPage(bad.to_string()));
        }
    }

    #[test]
    fn page_params_compute_offset() {
        let q = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("page", "3"),
            ("size", "25"),
        ]))
        .unwrap();
        assert_eq!(q.page_params(), [Value::Integer(25), Value::Integer(50)]);
    }

    #[test]
    fn contains_like_renders_bound_like() {
        let q = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "imei,serialNumber"),
            ("containsLikeValues", "9900008624711007,10_0%"),
        ]))
        .unwrap();
        let clause = q.where_clause();
        assert_eq!(
            clause.sql,
            " WHERE imei LIKE ? ESCAPE '\\' AND serial_number LIKE ? ESCAPE '\\'"
        );
        assert_eq!(
            clause.params,
            vec![
                Value::Text("%9900008624711007%".to_string()),
                Value::Text("%10\\_0\\%%".to_string()),
            ]
        );
    }

    #[test]
    fn quotes_never_reach_sql_text() {
        let q = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "model"),
            ("containsLikeValues", "x' OR '1'='1"),
        ]))
        .unwrap();
        let clause = q.where_clause();
        assert!(!clause.sql.contains("OR"));
        assert_eq!(clause.params, vec![Value::Text("%x' OR '1'='1%".to_string())]);
    }

    #[test]
    fn flag_fields_filter_by_equality() {
        let q = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "false"),
            ("containsLikeFields", "isStolen"),
            ("containsLikeValues", "True"),
        ]))
        .unwrap();
        let clause = q.where_clause();
        assert_eq!(clause.sql, " WHERE is_stolen = ?");
        assert_eq!(clause.params, vec![Value::Integer(1)]);

        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "false"),
            ("containsLikeFields", "isFaulty"),
            ("containsLikeValues", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFlag { .. }));
    }

    #[test]
    fn disallowed_contains_field_rejected() {
        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "vin"),
            ("containsLikeValues", "1HGCM82633A004352"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                family: FilterFamily::ContainsLike,
                field: "vin".to_string(),
            }
        );
    }

    #[test]
    fn list_length_mismatch_rejected() {
        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "imei,model"),
            ("containsLikeValues", "990"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::LengthMismatch {
                family: FilterFamily::ContainsLike,
                fields: 2,
                values: 1,
            }
        );

        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("rangeFields", "recordDate"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QueryError::LengthMismatch { family: FilterFamily::Range, .. }));
    }

    #[test]
    fn range_values_need_two_bounds() {
        let ok = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("rangeFields", "recordDate"),
            ("rangeValues", "1546300800000_1577836800000"),
        ]))
        .unwrap();
        let clause = ok.where_clause();
        assert_eq!(clause.sql, " WHERE record_date BETWEEN ? AND ?");
        assert_eq!(
            clause.params,
            vec![
                Value::Integer(1_546_300_800_000),
                Value::Integer(1_577_836_800_000)
            ]
        );

        for bad in ["1546300800000", "1_2_3", "a_b"] {
            let err = ListQuery::for_devices(&params(&[
                ("isDetailsRequired", "true"),
                ("rangeFields", "recordDate"),
                ("rangeValues", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, QueryError::MalformedRange { .. }), "{bad}");
        }

        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("rangeFields", "imei"),
            ("rangeValues", "1_2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { family: FilterFamily::Range, .. }));
    }

    #[test]
    fn sort_uses_listing_table() {
        let q = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("sortBy", "serialNumber"),
            ("sortingOrder", "DESC"),
        ]))
        .unwrap();
        assert_eq!(q.order_clause(), " ORDER BY serial_number DESC, id ASC");

        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("sortBy", "action"),
        ]))
        .unwrap_err();
        assert_eq!(err, QueryError::UnknownSortField("action".to_string()));

        let err = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("sortingOrder", "sideways"),
        ]))
        .unwrap_err();
        assert_eq!(err, QueryError::InvalidSortOrder("sideways".to_string()));
    }

    #[test]
    fn history_device_id_narrows_sort_table() {
        let q = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("sortBy", "createdTimestamp"),
        ]))
        .unwrap();
        assert_eq!(q.order_clause(), " ORDER BY created_at ASC, id ASC");

        let err = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("deviceId", "HU4X9B2"),
            ("sortBy", "imei"),
        ]))
        .unwrap_err();
        assert_eq!(err, QueryError::UnknownSortField("imei".to_string()));

        let q = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("deviceId", "HU4X9B2"),
        ]))
        .unwrap();
        assert!(q.has_filters());
        assert_eq!(q.where_clause().params, vec![Value::Text("HU4X9B2".to_string())]);

        let err = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("deviceId", "H-"),
        ]))
        .unwrap_err();
        assert_eq!(err, QueryError::InvalidDeviceId("H-".to_string()));
    }

    #[test]
    fn empty_result_blame() {
        let both = ListQuery::for_devices(&params(&[
            ("isDetailsRequired", "true"),
            ("containsLikeFields", "model"),
            ("containsLikeValues", "MX"),
            ("rangeFields", "recordDate"),
            ("rangeValues", "0_1"),
        ]))
        .unwrap();
        assert!(both.needs_split_count());
        assert!(!both.needs_scope_count());
        assert_eq!(both.empty_result_family(true, true), Some(FilterFamily::Range));
        assert_eq!(both.empty_result_family(true, false), Some(FilterFamily::ContainsLike));

        let none = ListQuery::for_devices(&params(&[("isDetailsRequired", "true")])).unwrap();
        assert_eq!(none.empty_result_family(true, false), None);
    }

    #[test]
    fn unmatched_device_id_is_blamed_before_contains() {
        let q = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("deviceId", "NOPE123"),
            ("containsLikeFields", "serialNumber"),
            ("containsLikeValues", "100"),
        ]))
        .unwrap();
        assert!(q.needs_scope_count());
        assert_eq!(q.scope_clause().params, vec![Value::Text("NOPE123".to_string())]);
        assert_eq!(q.empty_result_family(false, false), Some(FilterFamily::DeviceId));
        assert_eq!(q.empty_result_family(true, false), Some(FilterFamily::ContainsLike));

        let scope_only = ListQuery::for_history(&params(&[
            ("isDetailsRequired", "true"),
            ("deviceId", "NOPE123"),
        ]))
        .unwrap();
        assert!(!scope_only.needs_scope_count());
        assert_eq!(scope_only.empty_result_family(true, false), Some(FilterFamily::DeviceId));
    }
}
