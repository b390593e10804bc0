//! Normalized invoice records.
//!
//! These are the values produced by the parsers and handed to callers.
//! Every field degrades to an empty or zero value when the source page
//! lacks it.

use crate::money::Brl;
use crate::types::Portal;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded NFC-e.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// 44-digit access key as shown on the page
    pub key: String,
    /// Portal the receipt was retrieved from
    pub portal: Portal,
    /// Emission timestamp
    pub issue_date: Option<DateTime<FixedOffset>>,
    /// Receipt number within the series
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receipt_number: String,
    /// Series number
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub series: String,
    /// Issuing business
    pub issuer: Issuer,
    /// Buyer, when identified
    pub consumer: Consumer,
    /// Purchased items
    pub items: Vec<Item>,
    /// Sum of item values before discount
    pub subtotal: Brl,
    /// Discount applied to the whole receipt
    pub discount: Brl,
    /// Amount paid
    pub total: Brl,
}

impl Receipt {
    /// Sum of item totals.
    #[must_use]
    pub fn items_total(&self) -> Brl {
        self.items.iter().map(|item| item.total).sum()
    }

    /// Sum of per-item tax amounts.
    #[must_use]
    pub fn tax_total(&self) -> Brl {
        self.items
            .iter()
            .filter_map(|item| item.taxes.as_ref())
            .map(|taxes| taxes.amount)
            .sum()
    }
}

/// Business that issued the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// Legal name
    pub name: String,
    /// CNPJ, digits only
    pub cnpj: String,
    /// Trade name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trade_name: String,
    /// State registration number
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state_reg_id: String,
    /// Postal address
    pub address: Address,
}

/// Postal address.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let street = [self.street.as_str(), self.number.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let city = [self.city.as_str(), self.state.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        let parts: Vec<&str> = [street.as_str(), self.district.as_str(), city.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        write!(f, "{}", parts.join(" - "))
    }
}

/// Buyer identification. Usually empty on NFC-e.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumer {
    /// CPF or CNPJ
    pub document: String,
    /// Name
    pub name: String,
}

/// One receipt line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Position on the receipt, starting at 1
    pub line_number: u32,
    /// Merchant product code
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    /// Product description
    pub description: String,
    /// Quantity sold in `unit`
    pub quantity: f64,
    /// Commercial unit
    pub unit: Unit,
    /// Price per unit
    pub unit_price: Brl,
    /// Line total
    pub total: Brl,
    /// Mercosur nomenclature code
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ncm: String,
    /// Barcode
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gtin: String,
    /// Fiscal operation code
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cfop: String,
    /// Tax substitution code
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cest: String,
    /// Tax breakdown, when the portal shows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxes: Option<Taxes>,
}

/// Unit of measure for an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    /// `KG`
    Kilogram,
    /// `G`
    Gram,
    /// `L`
    Liter,
    /// `UN`
    Unit,
    /// `M`
    Meter,
    /// Anything else, upper-cased
    Other(String),
}

impl Unit {
    /// Map a raw unit label to its canonical form.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "KG" => Self::Kilogram,
            "G" => Self::Gram,
            "L" => Self::Liter,
            "UN" | "UND" | "UNID" => Self::Unit,
            "M" => Self::Meter,
            _ => Self::Other(upper),
        }
    }

    /// Canonical token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Kilogram => "KG",
            Self::Gram => "G",
            Self::Liter => "L",
            Self::Unit => "UN",
            Self::Meter => "M",
            Self::Other(s) => s,
        }
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        Self::normalize(&value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_str().to_string()
    }
}

/// Tax families itemized by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxKind {
    /// State VAT
    Icms,
    /// Social integration contribution
    Pis,
    /// Social security financing contribution
    Cofins,
}

impl TaxKind {
    /// Title used by the portal for the tax sub-block.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Icms => "ICMS",
            Self::Pis => "PIS",
            Self::Cofins => "COFINS",
        }
    }
}

/// Rate and amount for one tax family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Rate in percent
    pub percent: f64,
    /// Amount charged
    pub amount: Brl,
}

impl TaxLine {
    /// True when neither rate nor amount is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.percent == 0.0 && self.amount.is_zero()
    }
}

/// Per-item tax breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxes {
    /// ICMS
    pub icms: TaxLine,
    /// PIS
    pub pis: TaxLine,
    /// COFINS
    pub cofins: TaxLine,
    /// "Valor Aproximado dos Tributos" as printed
    pub approximate_total: Brl,
    /// Approximate total plus the ICMS, PIS and COFINS amounts
    pub amount: Brl,
}

impl Taxes {
    /// Build from the three lines and the approximate total, computing the
    /// summed amount.
    #[must_use]
    pub fn new(icms: TaxLine, pis: TaxLine, cofins: TaxLine, approximate_total: Brl) -> Self {
        Self {
            icms,
            pis,
            cofins,
            approximate_total,
            amount: approximate_total + icms.amount + pis.amount + cofins.amount,
        }
    }

    /// Line for a given family.
    #[must_use]
    pub fn line(&self, kind: TaxKind) -> TaxLine {
        match kind {
            TaxKind::Icms => self.icms,
            TaxKind::Pis => self.pis,
            TaxKind::Cofins => self.cofins,
        }
    }

    /// True when every rate and the summed amount are zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.icms.percent == 0.0
            && self.pis.percent == 0.0
            && self.cofins.percent == 0.0
            && self.amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_normalize() {
        let cases = [
            ("kg", Unit::Kilogram),
            (" KG ", Unit::Kilogram),
            ("g", Unit::Gram),
            ("L", Unit::Liter),
            ("UN", Unit::Unit),
            ("und", Unit::Unit),
            ("Unid", Unit::Unit),
            ("m", Unit::Meter),
            ("cx", Unit::Other("CX".to_string())),
            ("PCT ", Unit::Other("PCT".to_string())),
        ];

        for (raw, expected) in cases {
            assert_eq!(Unit::normalize(raw), expected, "raw: {raw:?}");
        }
    }

    #[test]
    fn test_unit_serde() {
        let json = serde_json::to_string(&Unit::Kilogram).expect("serialize");
        assert_eq!(json, "\"KG\"");
        let unit: Unit = serde_json::from_str("\"unid\"").expect("deserialize");
        assert_eq!(unit, Unit::Unit);
    }

    #[test]
    fn test_taxes_amount_and_empty() {
        let icms = TaxLine {
            percent: 18.0,
            amount: Brl::from_cents(180),
        };
        let pis = TaxLine {
            percent: 1.65,
            amount: Brl::from_cents(16),
        };
        let taxes = Taxes::new(icms, pis, TaxLine::default(), Brl::from_cents(300));
        assert_eq!(taxes.amount, Brl::from_cents(496));
        assert_eq!(taxes.line(TaxKind::Pis), pis);
        assert!(taxes.line(TaxKind::Cofins).is_empty());
        assert!(!taxes.is_empty());

        let approximate_only = Taxes::new(
            TaxLine::default(),
            TaxLine::default(),
            TaxLine::default(),
            Brl::from_cents(1250),
        );
        assert_eq!(approximate_only.amount, Brl::from_cents(1250));
        assert!(!approximate_only.is_empty());

        assert!(Taxes::default().is_empty());
    }

    #[test]
    fn test_receipt_totals() {
        let item = |total: i64, tax: Option<i64>| Item {
            total: Brl::from_cents(total),
            taxes: tax.map(|cents| Taxes {
                amount: Brl::from_cents(cents),
                ..Taxes::default()
            }),
            ..Item::default()
        };

        let receipt = Receipt {
            items: vec![item(1000, Some(120)), item(250, None), item(99, Some(5))],
            ..Receipt::default()
        };
        assert_eq!(receipt.items_total(), Brl::from_cents(1349));
        assert_eq!(receipt.tax_total(), Brl::from_cents(125));
    }

    #[test]
    fn test_address_display() {
        let address = Address {
            street: "AV SETE DE SETEMBRO".to_string(),
            number: "1200".to_string(),
            district: "CENTRO".to_string(),
            city: "SALVADOR".to_string(),
            state: "BA".to_string(),
            ..Address::default()
        };
        assert_eq!(
            address.to_string(),
            "AV SETE DE SETEMBRO, 1200 - CENTRO - SALVADOR/BA"
        );
        assert_eq!(Address::default().to_string(), "");
    }

    #[test]
    fn test_receipt_json_shape() {
        let receipt = Receipt {
            key: "29250306057223031484650140003829591141073162".to_string(),
            total: Brl::from_cents(1990),
            ..Receipt::default()
        };
        let value = serde_json::to_value(&receipt).expect("serialize");
        assert_eq!(value["portal"], "BA");
        assert_eq!(value["total"], 1990);
        assert!(value.get("receipt_number").is_none());
        assert!(value["issue_date"].is_null());
    }
}
