//! Offset/limit windows for list endpoints
//!
//! `GET /api/photos?skip=&limit=` style paging. Out-of-range values are
//! clamped rather than rejected.

use serde::Deserialize;

/// Rows returned when no limit is given
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a client may ask for
pub const MAX_LIMIT: i64 = 500;

/// Query parameters accepted by paged list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Sanitized SQL window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
    /// Row count for SQL LIMIT
    pub limit: i64,
}

impl ListQuery {
    pub fn window(&self) -> Window {
        calculate_window(self.skip, self.limit)
    }
}

/// Clamp client paging values
///
/// Negative offsets become 0; the limit defaults to [`DEFAULT_LIMIT`] and is
/// kept within `1..=MAX_LIMIT`.
///
/// # Examples
/// ```
/// use tagd_server::pagination::calculate_window;
///
/// let w = calculate_window(Some(200), Some(50));
/// assert_eq!(w.offset, 200);
/// assert_eq!(w.limit, 50);
///
/// // Oversized requests are capped
/// let w = calculate_window(None, Some(10_000));
/// assert_eq!(w.limit, 500);
/// ```
pub fn calculate_window(skip: Option<i64>, limit: Option<i64>) -> Window {
    Window {
        offset: skip.unwrap_or(0).max(0),
        limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let w = calculate_window(None, None);
        assert_eq!(w.offset, 0);
        assert_eq!(w.limit, 100);
    }

    #[test]
    fn test_window_normal() {
        let w = calculate_window(Some(100), Some(25));
        assert_eq!(w, Window { offset: 100, limit: 25 });
    }

    #[test]
    fn test_window_negative_skip() {
        let w = calculate_window(Some(-5), None);
        assert_eq!(w.offset, 0);
    }

    #[test]
    fn test_window_limit_too_small() {
        assert_eq!(calculate_window(None, Some(0)).limit, 1);
        assert_eq!(calculate_window(None, Some(-20)).limit, 1);
    }

    #[test]
    fn test_window_limit_too_large() {
        assert_eq!(calculate_window(None, Some(501)).limit, 500);
    }

    #[test]
    fn test_list_query_window() {
        let q = ListQuery {
            skip: Some(10),
            limit: Some(20),
        };
        assert_eq!(q.window(), Window { offset: 10, limit: 20 });
    }
}
