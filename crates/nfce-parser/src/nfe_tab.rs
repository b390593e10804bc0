//! Header fields from the "NFe" tab of the tabbed receipt view.

use crate::error::{ParseError, Result};
use crate::section::SectionIndex;
use crate::text::{digits, element_text, first_non_empty, money_or_zero, parse_br_date, strip_code_prefix};
use nfce_core::{Address, Brl, Consumer, Issuer, Portal, Receipt};
use scraper::Html;

const SECTION_DADOS: &str = "Dados da NFC-e";
const SECTION_EMITENTE: &str = "Emitente";
const SECTION_DESTINATARIO: &str = "Destinatário";

/// Parse the NFe tab into a receipt without items.
pub fn parse_nfe_tab(html: &str) -> Result<Receipt> {
    parse_nfe_document(&Html::parse_document(html))
}

pub(crate) fn parse_nfe_document(document: &Html) -> Result<Receipt> {
    let nfe = document
        .select(selector!("#NFe"))
        .next()
        .ok_or(ParseError::StructureNotFound { anchor: "#NFe" })?;

    let sections = SectionIndex::build(nfe);
    let dados = |label| sections.get(SECTION_DADOS, label);
    let emitente = |label| sections.get(SECTION_EMITENTE, label);
    let destinatario = |label| sections.get(SECTION_DESTINATARIO, label);

    let total = money_or_zero(first_non_empty(&[
        sections.first_value("Valor Total da Nota Fiscal"),
        sections.first_value("Valor Total"),
    ]));
    let subtotal = sections
        .first_value("Valor dos Produtos")
        .map_or(total, money_or_zero);
    let discount = sections
        .first_value("Valor do Desconto")
        .map_or(Brl::ZERO, money_or_zero);

    let key = document
        .select(selector!("#lbl_chave_acesso"))
        .next()
        .map(|el| digits(&element_text(el)))
        .unwrap_or_default();

    let issue_date = match dados("Data de Emissão") {
        "" => None,
        raw => {
            let parsed = parse_br_date(raw);
            if parsed.is_none() {
                tracing::warn!("Unrecognized issue date format: {}", raw);
            }
            parsed
        }
    };

    let receipt = Receipt {
        key,
        portal: Portal::Ba,
        issue_date,
        receipt_number: dados("Número").to_string(),
        series: dados("Série").to_string(),
        issuer: Issuer {
            name: emitente("Nome / Razão Social").to_string(),
            cnpj: digits(emitente("CNPJ")),
            trade_name: emitente("Nome Fantasia").to_string(),
            state_reg_id: digits(emitente("Inscrição Estadual")),
            address: Address {
                street: emitente("Endereço").to_string(),
                district: emitente("Bairro / Distrito").to_string(),
                city: strip_code_prefix(emitente("Município")).to_string(),
                state: emitente("UF").to_string(),
                zip_code: digits(emitente("CEP")),
                ..Address::default()
            },
        },
        consumer: Consumer {
            document: digits(first_non_empty(&[
                Some(destinatario("CPF")),
                Some(destinatario("CNPJ")),
            ])),
            name: first_non_empty(&[
                Some(destinatario("Nome / Razão Social")),
                Some(destinatario("Nome")),
            ])
            .to_string(),
        },
        items: Vec::new(),
        subtotal,
        discount,
        total,
    };

    tracing::debug!(
        "Parsed NFe tab: {} sections, key {}, total {}",
        sections.len(),
        receipt.key,
        receipt.total
    );

    Ok(receipt)
}
