//! Filter buckets and the per-session selection bit-vector.
//!
//! The canonical bucket table is built once at process start and is read-only
//! afterwards; only the per-session selection bits mutate.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::item::{CompletionItem, ItemTag};

/// Index into the canonical filter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u8);

impl FilterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn get(self) -> &'static ItemFilter {
        &filters()[self.index()]
    }

    #[inline]
    pub(crate) fn bit(self) -> u32 {
        1 << self.0
    }
}

/// One user-visible filter bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    pub name: &'static str,
    pub access_key: char,
    pub is_expander: bool,
}

impl ItemFilter {
    const fn new(name: &'static str, access_key: char) -> Self {
        Self {
            name,
            access_key,
            is_expander: false,
        }
    }
}

static FILTERS: Lazy<Vec<ItemFilter>> = Lazy::new(|| {
    let mut table = vec![
        ItemFilter::new("Namespaces", 'n'),
        ItemFilter::new("Classes", 'c'),
        ItemFilter::new("Structures", 's'),
        ItemFilter::new("Interfaces", 'i'),
        ItemFilter::new("Enums", 'e'),
        ItemFilter::new("Delegates", 'd'),
        ItemFilter::new("Methods", 'm'),
        ItemFilter::new("Extension methods", 'x'),
        ItemFilter::new("Properties", 'p'),
        ItemFilter::new("Fields", 'f'),
        ItemFilter::new("Locals and parameters", 'l'),
        ItemFilter::new("Constants", 'o'),
        ItemFilter::new("Events", 'v'),
        ItemFilter::new("Keywords", 'k'),
        ItemFilter::new("Snippets", 't'),
        ItemFilter::new("Operators", 'u'),
    ];
    table.push(ItemFilter {
        name: "Unimported types",
        access_key: 'a',
        is_expander: true,
    });
    table
});

pub fn filters() -> &'static [ItemFilter] {
    &FILTERS
}

/// The single expander bucket (always the last table entry).
pub fn expander() -> FilterId {
    FilterId((filters().len() - 1) as u8)
}

/// The bucket a semantic tag belongs to, if any.
pub fn filter_for_tag(tag: ItemTag) -> Option<FilterId> {
    let index = match tag {
        ItemTag::Namespace => 0,
        ItemTag::Class => 1,
        ItemTag::Struct => 2,
        ItemTag::Interface => 3,
        ItemTag::Enum => 4,
        ItemTag::Delegate => 5,
        ItemTag::Method => 6,
        ItemTag::ExtensionMethod => 7,
        ItemTag::Property => 8,
        ItemTag::Field => 9,
        ItemTag::Local | ItemTag::Parameter => 10,
        ItemTag::Constant => 11,
        ItemTag::Event => 12,
        ItemTag::Keyword => 13,
        ItemTag::Snippet => 14,
        ItemTag::Operator => 15,
        ItemTag::TypeParameter => return None,
    };
    Some(FilterId(index))
}

/// Bit-vector of currently toggled filter buckets (including the expander).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSelection {
    bits: u32,
}

impl FilterSelection {
    pub const EMPTY: FilterSelection = FilterSelection { bits: 0 };

    pub fn insert(&mut self, filter: FilterId) {
        self.bits |= filter.bit();
    }

    pub fn remove(&mut self, filter: FilterId) {
        self.bits &= !filter.bit();
    }

    pub fn contains(self, filter: FilterId) -> bool {
        self.bits & filter.bit() != 0
    }

    pub fn union(self, other: FilterSelection) -> FilterSelection {
        FilterSelection {
            bits: self.bits | other.bits,
        }
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn expander_selected(self) -> bool {
        self.contains(expander())
    }

    pub(crate) fn non_expander_bits(self) -> u32 {
        self.bits & !expander().bit()
    }

    /// True when a non-empty strict subset of `universe` buckets is selected.
    /// Selecting all buckets, or none, imposes no filtering.
    pub(crate) fn narrows(self, universe: u32) -> bool {
        let selected = self.non_expander_bits() & universe;
        selected != 0 && selected != universe
    }
}

impl FromIterator<FilterId> for FilterSelection {
    fn from_iter<I: IntoIterator<Item = FilterId>>(iter: I) -> Self {
        let mut selection = FilterSelection::default();
        for filter in iter {
            selection.insert(filter);
        }
        selection
    }
}

/// Non-expander bucket bits of one candidate.
pub(crate) fn bucket_bits(item: &CompletionItem) -> u32 {
    item.tags
        .iter()
        .filter_map(|&tag| filter_for_tag(tag))
        .fold(0, |bits, f| bits | f.bit())
}

/// Union of bucket bits across a candidate list.
pub(crate) fn universe_bits(items: &[Arc<CompletionItem>]) -> u32 {
    items.iter().fold(0, |bits, item| bits | bucket_bits(item))
}

/// One row of the filter bar returned to the host after every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRow {
    pub filter: FilterId,
    pub selected: bool,
    pub available: bool,
}

/// Rows for the buckets referenced by the full candidate set. Non-expander
/// buckets stay available only while a visible candidate carries them; the
/// expander row is always available.
pub(crate) fn filter_rows(
    all_items: &[Arc<CompletionItem>],
    visible_bits: u32,
    selection: FilterSelection,
    include_expander: bool,
) -> Vec<FilterRow> {
    let all_bits = universe_bits(all_items);
    let mut rows = Vec::new();
    for index in 0..filters().len() {
        let id = FilterId(index as u8);
        if id.get().is_expander {
            if include_expander {
                rows.push(FilterRow {
                    filter: id,
                    selected: selection.contains(id),
                    available: true,
                });
            }
        } else if all_bits & id.bit() != 0 {
            rows.push(FilterRow {
                filter: id,
                selected: selection.contains(id),
                available: visible_bits & id.bit() != 0,
            });
        }
    }
    rows
}
