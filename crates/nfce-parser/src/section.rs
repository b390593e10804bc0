//! Section index over label/value tables.
//!
//! Portal detail pages are a flat run of tables: a title table
//! (`td.table-titulo-aba`) opens a section, and the tables after it hold
//! `<label>`/`<span>` pairs belonging to that section until the next title.

use crate::text::element_text;
use scraper::ElementRef;
use std::collections::BTreeMap;

/// Label -> value pairs of one section, in sorted order.
pub type Labels = BTreeMap<String, String>;

/// Mapping section title -> labels, built once per page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionIndex {
    sections: BTreeMap<String, Labels>,
}

impl SectionIndex {
    /// Scan every table under `root` in document order.
    ///
    /// Tables before the first title are ignored. Within a section the
    /// first non-empty value seen for a label wins.
    #[must_use]
    pub fn build(root: ElementRef<'_>) -> Self {
        let mut sections: BTreeMap<String, Labels> = BTreeMap::new();
        let mut current: Option<String> = None;

        for table in root.select(selector!("table")) {
            let title = table
                .select(selector!("td.table-titulo-aba, td.table-titulo-aba-interna"))
                .next()
                .map(element_text)
                .unwrap_or_default();

            if !title.is_empty() {
                sections.entry(title.clone()).or_default();
                current = Some(title);
                continue;
            }

            let Some(section) = current.as_ref().and_then(|t| sections.get_mut(t)) else {
                continue;
            };

            for (label, value) in collect_label_values(table) {
                section.entry(label).or_insert(value);
            }
        }

        Self { sections }
    }

    /// Labels of a section, if the page had it.
    #[must_use]
    pub fn section(&self, title: &str) -> Option<&Labels> {
        self.sections.get(title)
    }

    /// Value of `label` in `section`, or `""`.
    #[must_use]
    pub fn get(&self, section: &str, label: &str) -> &str {
        self.sections
            .get(section)
            .and_then(|labels| labels.get(label))
            .map_or("", String::as_str)
    }

    /// First non-empty value for `label` across all sections.
    #[must_use]
    pub fn first_value(&self, label: &str) -> Option<&str> {
        self.sections
            .values()
            .filter_map(|labels| labels.get(label))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Section titles in sorted order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True when no title was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Pair every `<label>` under `element` with its next `<span>` sibling.
///
/// Non-span siblings between the two are skipped. Pairs with an empty
/// label or value are dropped; for duplicate labels the first wins.
#[must_use]
pub fn collect_label_values(element: ElementRef<'_>) -> Labels {
    let mut values = Labels::new();
    walk(element, &mut values);
    values
}

fn walk(node: ElementRef<'_>, values: &mut Labels) {
    for child in node.children().filter_map(ElementRef::wrap) {
        if child.value().name() == "label" {
            let label = element_text(child);
            let value = child
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| sibling.value().name() == "span")
                .map(element_text)
                .unwrap_or_default();

            if !label.is_empty() && !value.is_empty() {
                values.entry(label).or_insert(value);
            }
        }
        walk(child, values);
    }
}
