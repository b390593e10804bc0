//! Portal -> parser table.
//!
//! The registry is built explicitly by the composition root; nothing is
//! registered as a side effect of linking a module.

use crate::error::{ParseError, Result};
use crate::nfe_tab::parse_nfe_document;
use crate::products_tab::parse_products_document;
use nfce_core::{Portal, Receipt};
use scraper::Html;
use std::collections::HashMap;

/// Turns a portal page into a receipt.
pub trait ReceiptParser: Send + Sync {
    /// Portal this parser understands.
    fn portal(&self) -> Portal;

    /// Parse a full page.
    fn parse(&self, html: &str) -> Result<Receipt>;
}

/// Parser for the SEFAZ-BA tabbed view.
///
/// Reads the header from `#NFe` and, when the same page also carries
/// `#Prod`, attaches its items.
#[derive(Debug, Default, Clone, Copy)]
pub struct BahiaParser;

impl ReceiptParser for BahiaParser {
    fn portal(&self) -> Portal {
        Portal::Ba
    }

    fn parse(&self, html: &str) -> Result<Receipt> {
        let document = Html::parse_document(html);
        let mut receipt = parse_nfe_document(&document)?;

        if document.select(selector!("#Prod")).next().is_some() {
            receipt.items = parse_products_document(&document)?;
        }

        Ok(receipt)
    }
}

/// Explicit table of parsers keyed by portal.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<Portal, Box<dyn ReceiptParser>>,
}

impl ParserRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in parser.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BahiaParser));
        registry
    }

    /// Add a parser, replacing and returning any previous one for its portal.
    pub fn register(
        &mut self,
        parser: Box<dyn ReceiptParser>,
    ) -> Option<Box<dyn ReceiptParser>> {
        let portal = parser.portal();
        tracing::debug!("Registering parser for portal {}", portal);
        self.parsers.insert(portal, parser)
    }

    /// True when a parser is registered for `portal`.
    #[must_use]
    pub fn supports(&self, portal: Portal) -> bool {
        self.parsers.contains_key(&portal)
    }

    /// Registered portals in sorted order.
    #[must_use]
    pub fn portals(&self) -> Vec<Portal> {
        let mut portals: Vec<Portal> = self.parsers.keys().copied().collect();
        portals.sort();
        portals
    }

    /// Parse `html` with the parser registered for `portal`.
    pub fn parse(&self, portal: Portal, html: &str) -> Result<Receipt> {
        let parser = self
            .parsers
            .get(&portal)
            .ok_or_else(|| ParseError::UnsupportedPortal(portal.to_string()))?;
        parser.parse(html)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("portals", &self.portals())
            .finish()
    }
}
