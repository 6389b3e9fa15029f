use normalized_cache::ListFieldState;
use operation_artifact::{FieldSelection, PaginationStrategy, Variables};

use crate::ResolvedValue;

/// Outcome of a page load.
#[derive(Debug, Clone, PartialEq)]
pub enum PageLoad {
    Loaded(ResolvedValue),
    /// Another load of the same list is in flight, this one was ignored.
    AlreadyLoading,
    /// The server reported no page in that direction.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// Variables requesting the page following (or preceding) the loaded ones, `None` if there's
/// no such page.
///
/// Page arguments are set on the variables they're bound to, or on variables named after them.
pub(crate) fn page_variables(
    field: &FieldSelection,
    state: &ListFieldState,
    direction: PageDirection,
    page_size: Option<usize>,
    default_page_size: usize,
    mut variables: Variables,
) -> Option<Variables> {
    let pagination = field.pagination.as_ref()?;

    if !state.has_more(direction == PageDirection::Forward) {
        return None;
    }

    let page_size = page_size.or(state.last_page.page_size).unwrap_or(default_page_size);

    let request = match direction {
        PageDirection::Forward => state.next_page(Some(page_size)),
        PageDirection::Backward => state.previous_page(Some(page_size)),
    }?;

    let variable = |argument: &str| field.argument_variable(argument).unwrap_or(argument).to_string();

    variables.insert(variable(&pagination.page_size_arg_name), request.page_size.into());

    if let Some(cursor) = request.cursor {
        variables.insert(variable(pagination.strategy.position_argument()), cursor.into());
    }

    if let Some(offset) = request.offset {
        variables.insert(variable(PaginationStrategy::Offset.position_argument()), offset.into());
    }

    Some(variables)
}
