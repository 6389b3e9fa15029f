use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PaginationStrategy {
    /// `limit`/`offset` arguments, pages are appended.
    Offset,
    /// `first`/`after` arguments on a connection, pages are appended.
    CursorForward,
    /// `last`/`before` arguments on a connection, pages are prepended.
    CursorBackward,
}

impl PaginationStrategy {
    pub fn is_cursor(self) -> bool {
        matches!(self, PaginationStrategy::CursorForward | PaginationStrategy::CursorBackward)
    }

    /// Argument carrying the position of the page: a cursor or an offset.
    pub fn position_argument(self) -> &'static str {
        match self {
            PaginationStrategy::Offset => "offset",
            PaginationStrategy::CursorForward => "after",
            PaginationStrategy::CursorBackward => "before",
        }
    }

    pub fn default_page_size_argument(self) -> &'static str {
        match self {
            PaginationStrategy::Offset => "limit",
            PaginationStrategy::CursorForward => "first",
            PaginationStrategy::CursorBackward => "last",
        }
    }
}

/// Pagination metadata attached to the field carrying `@paginate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPagination {
    pub strategy: PaginationStrategy,
    pub page_size_arg_name: String,
    /// `@paginate(name: ..)`, targets the field with list operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl FieldPagination {
    pub fn new(strategy: PaginationStrategy) -> Self {
        FieldPagination {
            strategy,
            page_size_arg_name: strategy.default_page_size_argument().to_string(),
            operation_name: None,
        }
    }

    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_page_size_arg_name(mut self, name: impl Into<String>) -> Self {
        self.page_size_arg_name = name.into();
        self
    }

    /// Whether the argument selects a page of the list rather than the list itself.
    pub fn is_page_argument(&self, name: &str) -> bool {
        name == self.page_size_arg_name || name == self.strategy.position_argument()
    }
}

/// Document level pagination metadata, used to refetch further pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// Response keys leading from the root of the selection to the paginated field.
    pub path: Vec<String>,
    /// `0` when the document leaves it to the client configuration.
    #[serde(default)]
    pub page_size: usize,
}

impl PaginationInfo {
    pub fn new(path: impl IntoIterator<Item = impl Into<String>>, page_size: usize) -> Self {
        PaginationInfo {
            path: path.into_iter().map(Into::into).collect(),
            page_size,
        }
    }
}
