//! Items from the "Produtos e Serviços" tab.
//!
//! Each product is a `td.table_produtos` cell holding a summary table
//! (`table.toggle`) and an optional detail table (`table.toggable`). The
//! detail nests one sub-table per tax family, introduced by an inner title.

use crate::error::{ParseError, Result};
use crate::section::{collect_label_values, Labels};
use crate::text::{
    digits, element_text, first_non_empty, money_or_zero, parse_int, parse_percent, parse_quantity,
};
use nfce_core::{Brl, Item, TaxKind, TaxLine, Taxes, Unit};
use scraper::{ElementRef, Html};

/// Parse the products tab into receipt items.
pub fn parse_products_tab(html: &str) -> Result<Vec<Item>> {
    parse_products_document(&Html::parse_document(html))
}

pub(crate) fn parse_products_document(document: &Html) -> Result<Vec<Item>> {
    let prod = document
        .select(selector!("#Prod"))
        .next()
        .ok_or(ParseError::StructureNotFound { anchor: "#Prod" })?;

    let items: Vec<Item> = prod
        .select(selector!("td.table_produtos"))
        .filter_map(parse_item)
        .collect();

    tracing::debug!("Parsed products tab: {} items", items.len());
    Ok(items)
}

fn parse_item(cell: ElementRef<'_>) -> Option<Item> {
    let summary = cell.select(selector!("table.toggle")).next()?;
    let summary_vals = collect_label_values(summary);

    let detail = cell.select(selector!("table.toggable")).next();
    let detail_vals = detail.map(collect_label_values).unwrap_or_default();

    let s = |label: &str| summary_vals.get(label).map(String::as_str);
    let d = |label: &str| detail_vals.get(label).map(String::as_str);

    let quantity = parse_quantity(first_non_empty(&[
        s("Qtd."),
        d("Quantidade Comercial"),
        d("Quantidade Tributável"),
    ]));
    let total = money_or_zero(first_non_empty(&[
        s("Valor (R$)"),
        s("Valor(R$)"),
        d("Valor Total"),
    ]));

    let gtin = first_non_empty(&[d("Código EAN Comercial"), d("Código EAN Tributável")]);
    let gtin = if gtin.trim().eq_ignore_ascii_case("SEM GTIN") {
        String::new()
    } else {
        digits(gtin)
    };

    let mut unit_price = money_or_zero(first_non_empty(&[
        d("Valor unitário de comercialização"),
        d("Valor unitário de tributação"),
    ]));
    if unit_price.is_zero() && quantity > 0.0 && !total.is_zero() {
        unit_price = total.div_f64(quantity).unwrap_or(Brl::ZERO);
    }

    Some(Item {
        line_number: parse_int(first_non_empty(&[s("Número"), s("Num.")])),
        code: first_non_empty(&[d("Código do Produto")]).to_string(),
        description: first_non_empty(&[s("Descrição"), d("Descrição")]).to_string(),
        quantity,
        unit: Unit::normalize(first_non_empty(&[
            s("Unidade Comercial"),
            d("Unidade Comercial"),
            d("Unidade Tributável"),
        ])),
        unit_price,
        total,
        ncm: first_non_empty(&[d("Código NCM")]).to_string(),
        gtin,
        cfop: first_non_empty(&[d("CFOP")]).to_string(),
        cest: first_non_empty(&[d("Código CEST")]).to_string(),
        taxes: detail.and_then(|detail| parse_taxes(detail, &detail_vals)),
    })
}

fn parse_taxes(detail: ElementRef<'_>, detail_vals: &Labels) -> Option<Taxes> {
    let d = |label: &str| detail_vals.get(label).map(String::as_str);

    let mut icms = TaxLine {
        percent: parse_percent(first_non_empty(&[
            d("Alíquota do ICMS Normal"),
            d("Alíquota do ICMS"),
            d("Alíquota do ICMS ST"),
        ])),
        amount: money_or_zero(first_non_empty(&[
            d("Valor do ICMS Normal"),
            d("Valor do ICMS ST retido"),
            d("Valor do ICMS ST"),
        ])),
    };
    if icms.is_empty() {
        icms = find_tax_line(detail, TaxKind::Icms);
    }

    let taxes = Taxes::new(
        icms,
        find_tax_line(detail, TaxKind::Pis),
        find_tax_line(detail, TaxKind::Cofins),
        money_or_zero(first_non_empty(&[d("Valor Aproximado dos Tributos")])),
    );

    (!taxes.is_empty()).then_some(taxes)
}

/// Locate the sub-table for one tax family and read its rate and value.
///
/// The inner title sits in its own table; the values live in the next
/// sibling table, or in the first table of the next sibling `div`.
/// Anything missing along the way yields an empty line.
fn find_tax_line(detail: ElementRef<'_>, kind: TaxKind) -> TaxLine {
    let Some(values) = tax_values(detail, kind) else {
        return TaxLine::default();
    };
    let v = |label: &str| values.get(label).map(String::as_str);

    TaxLine {
        percent: parse_percent(first_non_empty(&[v("Alíquota"), v("Alíquota do ICMS Normal")])),
        amount: money_or_zero(first_non_empty(&[v("Valor")])),
    }
}

fn tax_values(detail: ElementRef<'_>, kind: TaxKind) -> Option<Labels> {
    let title = detail
        .select(selector!("td.table-titulo-aba-interna"))
        .find(|td| element_text(*td).to_uppercase().contains(kind.title()))?;

    let title_table = title
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")?;

    let next = title_table
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "table" | "div"))?;

    let target = if next.value().name() == "div" {
        next.select(selector!("table")).next()?
    } else {
        next
    };

    Some(collect_label_values(target))
}
