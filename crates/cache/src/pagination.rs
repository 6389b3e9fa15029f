//! List field states: the ordered entries of a paginated (or `@list`) field and its page info.

use indexmap::IndexMap;
use operation_artifact::{ListPosition, PaginationStrategy};
use serde::{Deserialize, Serialize};

use crate::{EntityKey, FieldValue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One edge (cursor strategies) or item (offset and plain lists).
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub cursor: Option<String>,
    /// A reference for identified nodes, inline otherwise.
    pub node: FieldValue,
    /// Edge fields other than `cursor` and `node`, by storage key.
    pub edge_fields: IndexMap<String, FieldValue>,
}

impl ListEntry {
    pub fn node(node: FieldValue) -> Self {
        ListEntry {
            cursor: None,
            node,
            edge_fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn identity(&self) -> Option<&EntityKey> {
        self.node.as_reference()
    }
}

/// Page arguments of the last page merged into a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageArguments {
    pub page_size: Option<usize>,
    /// `after`/`before` for cursor strategies.
    pub cursor: Option<String>,
    pub offset: Option<usize>,
}

/// Arguments to send for the next (or previous) page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: usize,
    pub cursor: Option<String>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Replace,
    Append,
    Prepend,
}

impl MergeMode {
    /// A first page replaces the list, any later page extends it.
    pub fn from_arguments(strategy: Option<PaginationStrategy>, arguments: &PageArguments) -> Self {
        match strategy {
            Some(PaginationStrategy::Offset) if arguments.offset.unwrap_or_default() > 0 => MergeMode::Append,
            Some(PaginationStrategy::CursorForward) if arguments.cursor.is_some() => MergeMode::Append,
            Some(PaginationStrategy::CursorBackward) if arguments.cursor.is_some() => MergeMode::Prepend,
            _ => MergeMode::Replace,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListFieldState {
    /// `None` for `@list` fields that aren't paginated.
    pub strategy: Option<PaginationStrategy>,
    pub entries: Vec<ListEntry>,
    pub page_info: PageInfo,
    pub last_page: PageArguments,
    /// Connection fields besides `edges` and `pageInfo`, such as `totalCount`.
    pub extra: IndexMap<String, FieldValue>,
}

impl ListFieldState {
    pub fn new(strategy: Option<PaginationStrategy>) -> Self {
        ListFieldState {
            strategy,
            entries: Vec::new(),
            page_info: PageInfo::default(),
            last_page: PageArguments::default(),
            extra: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.position_of(key).is_some()
    }

    fn position_of(&self, key: &EntityKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.identity() == Some(key))
    }

    /// Merges a freshly fetched page. Entries whose node is already in the list replace the
    /// existing entry in place, so identities never repeat.
    pub fn merge(&mut self, mode: MergeMode, incoming: Vec<ListEntry>, page_info: Option<PageInfo>, arguments: PageArguments) {
        let fetched = incoming.len();

        match mode {
            MergeMode::Replace => {
                self.entries.clear();
                self.append(incoming);
            }
            MergeMode::Append => self.append(incoming),
            MergeMode::Prepend => self.prepend(incoming),
        }

        self.page_info = self.recompute_page_info(mode, page_info, fetched, &arguments);
        self.last_page = arguments;
    }

    fn append(&mut self, incoming: Vec<ListEntry>) {
        for entry in incoming {
            match entry.identity().and_then(|key| self.position_of(key)) {
                Some(index) => self.entries[index] = entry,
                None => self.entries.push(entry),
            }
        }
    }

    fn prepend(&mut self, incoming: Vec<ListEntry>) {
        let mut fresh: Vec<ListEntry> = Vec::with_capacity(incoming.len());

        for entry in incoming {
            let in_list = entry.identity().and_then(|key| self.position_of(key));
            let in_fresh = entry
                .identity()
                .and_then(|key| fresh.iter().position(|other| other.identity() == Some(key)));

            match (in_list, in_fresh) {
                (Some(index), _) => self.entries[index] = entry,
                (None, Some(index)) => fresh[index] = entry,
                (None, None) => fresh.push(entry),
            }
        }

        fresh.append(&mut self.entries);
        self.entries = fresh;
    }

    fn recompute_page_info(
        &self,
        mode: MergeMode,
        fresh: Option<PageInfo>,
        fetched: usize,
        arguments: &PageArguments,
    ) -> PageInfo {
        match self.strategy {
            None => PageInfo::default(),
            Some(PaginationStrategy::Offset) => {
                let offset = arguments.offset.unwrap_or_default();
                PageInfo {
                    has_next_page: arguments.page_size.is_some_and(|limit| fetched >= limit),
                    has_previous_page: offset > 0,
                    start_cursor: None,
                    end_cursor: None,
                }
            }
            Some(_) => {
                let fresh = fresh.unwrap_or_default();
                let current = &self.page_info;

                match mode {
                    MergeMode::Replace => fresh,
                    MergeMode::Append => PageInfo {
                        has_next_page: fresh.has_next_page,
                        end_cursor: fresh.end_cursor.or_else(|| current.end_cursor.clone()),
                        has_previous_page: current.has_previous_page,
                        start_cursor: current.start_cursor.clone().or(fresh.start_cursor),
                    },
                    MergeMode::Prepend => PageInfo {
                        has_previous_page: fresh.has_previous_page,
                        start_cursor: fresh.start_cursor.or_else(|| current.start_cursor.clone()),
                        has_next_page: current.has_next_page,
                        end_cursor: current.end_cursor.clone().or(fresh.end_cursor),
                    },
                }
            }
        }
    }

    /// Inserts an entity coming from a list operation. Already present entities keep their place.
    pub fn insert(&mut self, entry: ListEntry, position: ListPosition) -> bool {
        if let Some(index) = entry.identity().and_then(|key| self.position_of(key)) {
            let changed = self.entries[index].node != entry.node;
            self.entries[index].node = entry.node;
            return changed;
        }

        match position {
            ListPosition::First => self.entries.insert(0, entry),
            ListPosition::Last => self.entries.push(entry),
        }

        true
    }

    pub fn remove(&mut self, key: &EntityKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.identity() != Some(key));
        before != self.entries.len()
    }

    /// Arguments of the page following the loaded ones.
    ///
    /// Offsets move forward by the last used limit, cursors continue from `endCursor`.
    pub fn next_page(&self, page_size: Option<usize>) -> Option<PageRequest> {
        let last_size = self.last_page.page_size;

        match self.strategy? {
            PaginationStrategy::Offset => {
                let step = last_size.or(page_size)?;
                Some(PageRequest {
                    page_size: page_size.or(last_size)?,
                    cursor: None,
                    offset: Some(self.last_page.offset.unwrap_or_default() + step),
                })
            }
            PaginationStrategy::CursorForward => Some(PageRequest {
                page_size: page_size.or(last_size)?,
                cursor: Some(self.page_info.end_cursor.clone()?),
                offset: None,
            }),
            PaginationStrategy::CursorBackward => None,
        }
    }

    /// Arguments of the page preceding the loaded ones, continuing from `startCursor`.
    pub fn previous_page(&self, page_size: Option<usize>) -> Option<PageRequest> {
        match self.strategy? {
            PaginationStrategy::CursorBackward => Some(PageRequest {
                page_size: page_size.or(self.last_page.page_size)?,
                cursor: Some(self.page_info.start_cursor.clone()?),
                offset: None,
            }),
            PaginationStrategy::Offset | PaginationStrategy::CursorForward => None,
        }
    }

    pub fn has_more(&self, forward: bool) -> bool {
        if forward {
            self.page_info.has_next_page
        } else {
            self.page_info.has_previous_page
        }
    }
}
