//! Query builder pagination
//!
//! Three strategies: offset pagination with a total count, simple
//! pagination with a has-more sentinel, and cursor pagination keyed on a
//! monotonically increasing column. `chunk` walks the full result set in
//! fixed-size pages.

use super::builder::QueryBuilder;
use crate::backends::{DatabaseValue, SqlRow};
use crate::connection::Connection;
use crate::error::ModelResult;

/// Offset-paginated page with full count metadata
#[derive(Debug, Clone)]
pub struct Paginator<T = SqlRow> {
    pub data: Vec<T>,
    pub total: i64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub prev_page_url: Option<String>,
    pub next_page_url: Option<String>,
}

impl<T> Paginator<T> {
    /// Transform the page's rows, keeping the metadata
    pub fn map<U, F>(self, f: F) -> Paginator<U>
    where
        F: FnMut(T) -> U,
    {
        Paginator {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
            from: self.from,
            to: self.to,
            prev_page_url: self.prev_page_url,
            next_page_url: self.next_page_url,
        }
    }
}

/// Simple page: one extra row is fetched as a has-more sentinel, so no
/// COUNT query is issued
#[derive(Debug, Clone)]
pub struct SimplePage {
    pub data: Vec<SqlRow>,
    pub per_page: u64,
    pub current_page: u64,
    pub has_more: bool,
}

/// Cursor page: the next cursor is the key column of the last row,
/// present only when more rows exist
#[derive(Debug, Clone)]
pub struct CursorPage {
    pub data: Vec<SqlRow>,
    pub per_page: u64,
    pub next_cursor: Option<DatabaseValue>,
}

impl QueryBuilder {
    /// Offset pagination: a COUNT over the WHERE state, then the page
    pub async fn paginate(
        self,
        page: u64,
        per_page: u64,
        path: &str,
        conn: &Connection,
    ) -> ModelResult<Paginator> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let total = self.clone().count(conn).await?;
        let last_page = ((total as u64) + per_page - 1) / per_page;
        let last_page = last_page.max(1);

        let mut query = self.limit(per_page);
        if page > 1 {
            query = query.offset((page - 1) * per_page);
        }
        let data = query.get(conn).await?;

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = (page - 1) * per_page + 1;
            (Some(from), Some(from + data.len() as u64 - 1))
        };

        let prev_page_url = (page > 1).then(|| format!("{}?page={}", path, page - 1));
        let next_page_url = (page < last_page).then(|| format!("{}?page={}", path, page + 1));

        Ok(Paginator {
            data,
            total,
            per_page,
            current_page: page,
            last_page,
            from,
            to,
            prev_page_url,
            next_page_url,
        })
    }

    /// Simple pagination: fetches one row beyond the page size instead of
    /// issuing a COUNT
    pub async fn simple_paginate(
        self,
        page: u64,
        per_page: u64,
        conn: &Connection,
    ) -> ModelResult<SimplePage> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let mut query = self.limit(per_page + 1);
        if page > 1 {
            query = query.offset((page - 1) * per_page);
        }
        let mut data = query.get(conn).await?;
        let has_more = data.len() as u64 > per_page;
        data.truncate(per_page as usize);

        Ok(SimplePage {
            data,
            per_page,
            current_page: page,
            has_more,
        })
    }

    /// Cursor pagination keyed on a single ascending column. Any ordering
    /// already on the builder is replaced by the cursor column.
    pub async fn cursor_paginate(
        mut self,
        cursor_column: &str,
        cursor: Option<DatabaseValue>,
        per_page: u64,
        conn: &Connection,
    ) -> ModelResult<CursorPage> {
        let per_page = per_page.max(1);
        self.orders.clear();
        let mut query = self.order_by_asc(cursor_column);
        if let Some(cursor) = cursor {
            query = query.where_gt(cursor_column, cursor);
        }

        let mut data = query.limit(per_page + 1).get(conn).await?;
        let has_more = data.len() as u64 > per_page;
        data.truncate(per_page as usize);

        let next_cursor = if has_more {
            data.last().and_then(|row| row.get(cursor_column).cloned())
        } else {
            None
        };

        Ok(CursorPage {
            data,
            per_page,
            next_cursor,
        })
    }

    /// Walk the full result set in pages of `size`, invoking `callback`
    /// per page. The callback returning `false` stops the walk early;
    /// the return value reports whether the walk ran to completion.
    pub async fn chunk<F>(
        &self,
        size: u64,
        conn: &Connection,
        mut callback: F,
    ) -> ModelResult<bool>
    where
        F: FnMut(Vec<SqlRow>) -> ModelResult<bool>,
    {
        let size = size.max(1);
        let mut page = 0u64;
        loop {
            let mut query = self.clone().limit(size);
            if page > 0 {
                query = query.offset(page * size);
            }
            let rows = query.get(conn).await?;
            if rows.is_empty() {
                return Ok(true);
            }
            let count = rows.len() as u64;
            if !callback(rows)? {
                return Ok(false);
            }
            if count < size {
                return Ok(true);
            }
            page += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{scripted::row, ScriptedPool};
    use std::sync::Arc;

    fn id_rows(range: std::ops::Range<i64>) -> Vec<SqlRow> {
        range
            .map(|i| row(&[("id", DatabaseValue::Int64(i))]))
            .collect()
    }

    #[tokio::test]
    async fn paginate_computes_metadata_and_urls() {
        let pool = ScriptedPool::new();
        pool.push_rows(vec![row(&[("count", DatabaseValue::Int64(23))])]);
        pool.push_rows(id_rows(11..21));
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let page = QueryBuilder::table("users")
            .paginate(2, 10, "/users", &conn)
            .await
            .unwrap();

        assert_eq!(page.total, 23);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.from, Some(11));
        assert_eq!(page.to, Some(20));
        assert_eq!(page.prev_page_url.as_deref(), Some("/users?page=1"));
        assert_eq!(page.next_page_url.as_deref(), Some("/users?page=3"));
        assert_eq!(
            pool.sql(),
            vec![
                "SELECT COUNT(*) FROM users".to_string(),
                "SELECT * FROM users LIMIT 10 OFFSET 10".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn paginate_empty_result_has_no_from_to() {
        let pool = ScriptedPool::new();
        pool.push_rows(vec![row(&[("count", DatabaseValue::Int64(0))])]);
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool));

        let page = QueryBuilder::table("users")
            .paginate(1, 10, "/users", &conn)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 1);
        assert_eq!(page.from, None);
        assert_eq!(page.to, None);
        assert!(page.next_page_url.is_none());
    }

    #[tokio::test]
    async fn simple_paginate_uses_sentinel_row() {
        let pool = ScriptedPool::new();
        pool.push_rows(id_rows(1..7));
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let page = QueryBuilder::table("users")
            .simple_paginate(1, 5, &conn)
            .await
            .unwrap();
        assert_eq!(page.data.len(), 5);
        assert!(page.has_more);
        assert_eq!(
            pool.sql(),
            vec!["SELECT * FROM users LIMIT 6".to_string()]
        );
    }

    #[tokio::test]
    async fn cursor_paginate_walks_with_next_cursor() {
        let pool = ScriptedPool::new();
        pool.push_rows(id_rows(1..7));
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let page = QueryBuilder::table("users")
            .order_by_desc("name")
            .cursor_paginate("id", None, 5, &conn)
            .await
            .unwrap();
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.next_cursor, Some(DatabaseValue::Int64(5)));
        // Cursor ordering replaces whatever ordering was on the builder
        assert_eq!(
            pool.sql(),
            vec!["SELECT * FROM users ORDER BY id ASC LIMIT 6".to_string()]
        );

        let pool2 = ScriptedPool::new();
        pool2.push_rows(id_rows(6..8));
        let conn2 = Connection::new("default", Arc::new(pool2.clone()));
        let page2 = QueryBuilder::table("users")
            .cursor_paginate("id", page.next_cursor, 5, &conn2)
            .await
            .unwrap();
        assert_eq!(page2.data.len(), 2);
        assert_eq!(page2.next_cursor, None);
        assert_eq!(
            pool2.sql(),
            vec!["SELECT * FROM users WHERE id > ? ORDER BY id ASC LIMIT 6".to_string()]
        );
    }

    #[tokio::test]
    async fn chunk_visits_every_page_including_the_short_tail() {
        let pool = ScriptedPool::new();
        pool.push_rows(id_rows(1..4));
        pool.push_rows(id_rows(4..7));
        pool.push_rows(id_rows(7..10));
        pool.push_rows(id_rows(10..12));
        let conn = Connection::new("default", Arc::new(pool));

        let mut pages = Vec::new();
        let completed = QueryBuilder::table("users")
            .chunk(3, &conn, |rows| {
                pages.push(rows.len());
                Ok(true)
            })
            .await
            .unwrap();
        assert!(completed);
        assert_eq!(pages, vec![3, 3, 3, 2]);
    }

    #[tokio::test]
    async fn chunk_stops_when_callback_returns_false() {
        let pool = ScriptedPool::new();
        pool.push_rows(id_rows(1..4));
        pool.push_rows(id_rows(4..7));
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let mut calls = 0;
        let completed = QueryBuilder::table("users")
            .chunk(3, &conn, |_| {
                calls += 1;
                Ok(calls < 2)
            })
            .await
            .unwrap();
        assert!(!completed);
        assert_eq!(calls, 2);
        assert_eq!(pool.sql().len(), 2);
    }
}
