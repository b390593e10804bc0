//! Paths and field names of the SEFAZ-BA consultation pages.

use std::fmt;

/// Access-key consultation page.
pub const ACCESS_KEY_PAGE: &str = "/servicos/nfce/Modulos/Geral/NFCEC_consulta_chave_acesso.aspx";
/// Captcha image.
pub const CAPTCHA_IMAGE: &str = "/servicos/nfce/Modulos/AntiRobo/NFCEC_anti_robo.aspx";
/// DANFE summary page.
pub const DANFE_PAGE: &str = "/servicos/nfce/Modulos/Geral/NFCEC_consulta_danfe.aspx";
/// Tabbed view page.
pub const TABS_PAGE: &str = "/servicos/nfce/Modulos/Geral/NFCEC_consulta_abas.aspx";

/// Access-key text box.
pub const FIELD_ACCESS_KEY: &str = "txt_chave_acesso";
/// Captcha answer text box.
pub const FIELD_CAPTCHA: &str = "txt_cod_antirobo";
/// Full consultation button.
pub const BUTTON_FULL_QUERY: &str = "btn_consulta_completa";
/// Label of [`BUTTON_FULL_QUERY`].
pub const BUTTON_FULL_QUERY_LABEL: &str = "Consultar";
/// Tabbed view button on the DANFE page.
pub const BUTTON_TABBED_VIEW: &str = "btn_visualizar_abas";
/// Label of [`BUTTON_TABBED_VIEW`].
pub const BUTTON_TABBED_VIEW_LABEL: &str = "Visualizar em Abas";
/// Hidden origin marker, always posted empty.
pub const FIELD_CALL_ORIGIN: &str = "hd_origem_chamada";
/// Query parameter carrying the captcha timestamp.
pub const CAPTCHA_TIMESTAMP_PARAM: &str = "t";

/// Click coordinates sent with tab image buttons.
pub const TAB_CLICK: (u32, u32) = (10, 10);

/// Tabs of the tabbed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    /// Invoice header
    Nfe,
    /// Issuer
    Issuer,
    /// Consumer
    Consumer,
    /// Line items
    Products,
    /// Totals
    Totals,
    /// Transport
    Transport,
    /// Billing
    Billing,
    /// Additional information
    AdditionalInfo,
}

impl Tab {
    /// Every tab, in portal order.
    pub const ALL: [Tab; 8] = [
        Tab::Nfe,
        Tab::Issuer,
        Tab::Consumer,
        Tab::Products,
        Tab::Totals,
        Tab::Transport,
        Tab::Billing,
        Tab::AdditionalInfo,
    ];

    /// Name of the image button that selects this tab.
    #[must_use]
    pub fn button_name(self) -> &'static str {
        match self {
            Tab::Nfe => "btn_aba_nfe",
            Tab::Issuer => "btn_aba_emitente",
            Tab::Consumer => "btn_aba_destinatario",
            Tab::Products => "btn_aba_produtos",
            Tab::Totals => "btn_aba_totais",
            Tab::Transport => "btn_aba_transporte",
            Tab::Billing => "btn_aba_cobranca",
            Tab::AdditionalInfo => "btn_aba_infadicionais",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.button_name())
    }
}
