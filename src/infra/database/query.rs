//! Dynamic SQL for filtered, sorted, paginated list queries.
//!
//! Only values are bound as parameters. Identifiers (table, columns, sort
//! field) come from `'static` allow-lists and are pushed verbatim.

use sqlx::{Postgres, QueryBuilder};

use crate::domain::{ListQuery, SortOrder};

/// Static description of a listable table.
#[derive(Debug, Clone, Copy)]
pub struct ListTable {
    pub name: &'static str,
    pub columns: &'static str,
    pub search_columns: &'static [&'static str],
}

/// Filter values in their storage representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub keyword: Option<String>,
    pub status: Option<i16>,
    pub author_id: Option<i64>,
}

impl ListFilter {
    pub fn from_query<S: Copy>(query: &ListQuery<S>, status: impl Fn(S) -> i16) -> Self {
        Self {
            keyword: query.keyword.clone(),
            status: query.status.map(status),
            author_id: query.author_id,
        }
    }
}

/// Builds an `ILIKE` substring pattern, escaping `\`, `%` and `_` so they
/// match literally.
pub fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_where(qb: &mut QueryBuilder<'static, Postgres>, table: &ListTable, filter: &ListFilter) {
    qb.push(" WHERE deleted_at IS NULL");

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND author_id = ").push_bind(author_id);
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        qb.push(" AND (");
        for (i, column) in table.search_columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column)
                .push(" ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
}

/// `SELECT COUNT(*)` over the filtered rows.
pub fn count_query(table: &ListTable, filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
    qb.push(table.name);
    push_where(&mut qb, table, filter);
    qb
}

/// One page of filtered rows. `id` breaks ties so pages never overlap.
pub fn page_query(
    table: &ListTable,
    filter: &ListFilter,
    sort_by: &'static str,
    order: SortOrder,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(table.columns).push(" FROM ").push(table.name);
    push_where(&mut qb, table, filter);

    qb.push(" ORDER BY ")
        .push(sort_by)
        .push(" ")
        .push(order.as_sql());
    if sort_by != "id" {
        qb.push(", id ").push(order.as_sql());
    }

    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: ListTable = ListTable {
        name: "users",
        columns: "id, username",
        search_columns: &["username", "email", "nickname"],
    };

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ali"), "%ali%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\dir"), "%c:\\\\dir%");
    }

    #[test]
    fn test_count_query_without_filters() {
        let qb = count_query(&USERS, &ListFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
    }

    #[test]
    fn test_count_query_with_keyword_searches_every_column() {
        let filter = ListFilter {
            keyword: Some("al".to_string()),
            status: Some(1),
            author_id: None,
        };
        let qb = count_query(&USERS, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND status = $1 \
             AND (username ILIKE $2 ESCAPE '\\' OR email ILIKE $3 ESCAPE '\\' \
             OR nickname ILIKE $4 ESCAPE '\\')"
        );
    }

    #[test]
    fn test_page_query_orders_with_id_tie_breaker() {
        let qb = page_query(
            &USERS,
            &ListFilter::default(),
            "created_at",
            SortOrder::Asc,
            10,
            20,
        );
        assert_eq!(
            qb.sql(),
            "SELECT id, username FROM users WHERE deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_page_query_sorted_by_id_has_single_key() {
        let filter = ListFilter {
            author_id: Some(3),
            ..Default::default()
        };
        let qb = page_query(&USERS, &filter, "id", SortOrder::Desc, 10, 0);
        assert_eq!(
            qb.sql(),
            "SELECT id, username FROM users WHERE deleted_at IS NULL AND author_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_filter_from_query_maps_status() {
        let query = ListQuery::<crate::domain::UserStatus> {
            status: Some(crate::domain::UserStatus::Disabled),
            keyword: Some("bob".to_string()),
            ..Default::default()
        };
        let filter = ListFilter::from_query(&query, crate::domain::UserStatus::as_i16);
        assert_eq!(filter.status, Some(0));
        assert_eq!(filter.keyword.as_deref(), Some("bob"));
    }
}
