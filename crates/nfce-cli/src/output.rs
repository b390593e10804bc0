//! Receipt rendering and page export.

use nfce_core::{AccessKey, Receipt};
use nfce_scraper::ScrapedPages;
use std::fmt;
use std::path::Path;

/// File names used by `scrape --output`.
pub const PAGE_FILES: [&str; 3] = ["danfe.html", "nfe_tab.html", "products.html"];

/// Plain-text receipt layout.
pub struct ReceiptText<'a>(pub &'a Receipt);

impl fmt::Display for ReceiptText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let receipt = self.0;
        let key = AccessKey::parse(&receipt.key)
            .map_or_else(|_| receipt.key.clone(), |k| k.formatted());

        writeln!(f, "NFC-e {key} ({})", receipt.portal)?;
        if !receipt.receipt_number.is_empty() {
            writeln!(f, "Number:   {}  Series: {}", receipt.receipt_number, receipt.series)?;
        }
        if let Some(issued) = receipt.issue_date {
            writeln!(f, "Issued:   {}", issued.format("%d/%m/%Y %H:%M:%S %:z"))?;
        }

        let issuer = &receipt.issuer;
        if issuer.trade_name.is_empty() {
            writeln!(f, "Issuer:   {}", issuer.name)?;
        } else {
            writeln!(f, "Issuer:   {} ({})", issuer.name, issuer.trade_name)?;
        }
        if !issuer.cnpj.is_empty() {
            writeln!(f, "CNPJ:     {}", issuer.cnpj)?;
        }
        let address = issuer.address.to_string();
        if !address.is_empty() {
            writeln!(f, "Address:  {address}")?;
        }
        if !receipt.consumer.document.is_empty() {
            writeln!(
                f,
                "Consumer: {} {}",
                receipt.consumer.document, receipt.consumer.name
            )?;
        }

        if !receipt.items.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "{:>3}  {:<36} {:>10} {:<5} {:>12} {:>12}",
                "#", "Description", "Qty", "Unit", "Price", "Total"
            )?;
            for item in &receipt.items {
                writeln!(
                    f,
                    "{:>3}  {:<36} {:>10.3} {:<5} {:>12} {:>12}",
                    item.line_number,
                    truncate(&item.description, 36),
                    item.quantity,
                    item.unit.as_str(),
                    item.unit_price.to_string(),
                    item.total.to_string()
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Subtotal: {}", receipt.subtotal)?;
        if !receipt.discount.is_zero() {
            writeln!(f, "Discount: {}", receipt.discount)?;
        }
        writeln!(f, "Total:    {}", receipt.total)?;
        let taxes = receipt.tax_total();
        if !taxes.is_zero() {
            writeln!(f, "Taxes:    {taxes}")?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max - 1).collect();
        cut.push('…');
        cut
    }
}

/// Write the raw pages of a run into `dir`, creating it if needed.
pub async fn save_pages(dir: &Path, pages: &ScrapedPages) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    for (name, body) in PAGE_FILES
        .iter()
        .zip([&pages.danfe, &pages.nfe_tab, &pages.products_tab])
    {
        tokio::fs::write(dir.join(name), body).await?;
    }
    Ok(())
}
